use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{info, warn};

use crate::models::{BracketStat, Character};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRow {
    pub rating: u32,
    pub won: u32,
    pub lost: u32,
    pub played: u32,
    pub recorded_at: String,
}

impl SnapshotRow {
    fn from_stat(stat: &BracketStat, recorded_at: &str) -> Self {
        Self {
            rating: stat.rating,
            won: stat.won,
            lost: stat.lost,
            played: stat.played,
            recorded_at: recorded_at.to_string(),
        }
    }

    fn same_standing(&self, stat: &BracketStat) -> bool {
        self.rating == stat.rating && self.won == stat.won && self.lost == stat.lost
    }
}

/// Write/read contract of the external relational store.
pub trait SnapshotStore {
    /// Insert or update by (name, realm); returns the character's row id.
    fn upsert_character(&mut self, character: &Character, updated_at: &str) -> Result<i64>;

    fn latest_snapshot(&mut self, character_id: i64, bracket: &str) -> Result<Option<SnapshotRow>>;

    fn insert_snapshot(&mut self, character_id: i64, bracket: &str, row: &SnapshotRow)
    -> Result<()>;
}

/// Push `characters` to `store`, recording a snapshot only when a bracket's
/// (rating, won, lost) differs from the latest stored one. A failure for one
/// character is logged and skipped. Returns the number of snapshots written.
pub fn sync_characters(
    store: &mut dyn SnapshotStore,
    characters: &[Character],
    now: &str,
) -> usize {
    let mut synced = 0usize;
    for ch in characters {
        let character_id = match store.upsert_character(ch, now) {
            Ok(id) => id,
            Err(err) => {
                warn!(name = %ch.name, realm = %ch.realm, error = %format!("{err:#}"), "character upsert failed");
                continue;
            }
        };

        for (bracket, stat) in &ch.brackets {
            match sync_bracket(store, character_id, bracket, stat, now) {
                Ok(true) => synced += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(name = %ch.name, %bracket, error = %format!("{err:#}"), "snapshot sync failed");
                }
            }
        }
    }
    info!("synced {synced} new/changed snapshots");
    synced
}

fn sync_bracket(
    store: &mut dyn SnapshotStore,
    character_id: i64,
    bracket: &str,
    stat: &BracketStat,
    now: &str,
) -> Result<bool> {
    if let Some(prev) = store.latest_snapshot(character_id, bracket)?
        && prev.same_standing(stat)
    {
        return Ok(false);
    }
    store.insert_snapshot(character_id, bracket, &SnapshotRow::from_stat(stat, now))?;
    Ok(true)
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open sqlite db {}", path.display()))?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn snapshot_count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM rating_snapshots", [], |row| row.get(0))
            .context("count snapshots")?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    pub fn character_count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM characters", [], |row| row.get(0))
            .context("count characters")?;
        Ok(usize::try_from(n).unwrap_or_default())
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS characters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            name_key TEXT NOT NULL,
            realm TEXT NOT NULL,
            class TEXT NOT NULL,
            race TEXT NOT NULL,
            faction TEXT NOT NULL,
            guild TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(name_key, realm)
        );

        CREATE TABLE IF NOT EXISTS rating_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            character_id INTEGER NOT NULL REFERENCES characters(id),
            bracket TEXT NOT NULL,
            rating INTEGER NOT NULL,
            won INTEGER NOT NULL,
            lost INTEGER NOT NULL,
            played INTEGER NOT NULL,
            recorded_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_snapshots_lookup
            ON rating_snapshots(character_id, bracket, recorded_at);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

impl SnapshotStore for SqliteStore {
    fn upsert_character(&mut self, ch: &Character, updated_at: &str) -> Result<i64> {
        self.conn
            .query_row(
                r#"
                INSERT INTO characters (name, name_key, realm, class, race, faction, guild, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(name_key, realm) DO UPDATE SET
                    name = excluded.name,
                    class = excluded.class,
                    race = excluded.race,
                    faction = excluded.faction,
                    guild = excluded.guild,
                    updated_at = excluded.updated_at
                RETURNING id
                "#,
                params![
                    ch.name,
                    ch.name.to_lowercase(),
                    ch.realm,
                    ch.class,
                    ch.race,
                    ch.faction,
                    ch.guild,
                    updated_at,
                ],
                |row| row.get::<_, i64>(0),
            )
            .context("upsert character")
    }

    fn latest_snapshot(&mut self, character_id: i64, bracket: &str) -> Result<Option<SnapshotRow>> {
        self.conn
            .query_row(
                r#"
                SELECT rating, won, lost, played, recorded_at
                FROM rating_snapshots
                WHERE character_id = ?1 AND bracket = ?2
                ORDER BY recorded_at DESC, id DESC
                LIMIT 1
                "#,
                params![character_id, bracket],
                |row| {
                    Ok(SnapshotRow {
                        rating: row.get(0)?,
                        won: row.get(1)?,
                        lost: row.get(2)?,
                        played: row.get(3)?,
                        recorded_at: row.get(4)?,
                    })
                },
            )
            .optional()
            .context("query latest snapshot")
    }

    fn insert_snapshot(
        &mut self,
        character_id: i64,
        bracket: &str,
        row: &SnapshotRow,
    ) -> Result<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO rating_snapshots (character_id, bracket, rating, won, lost, played, recorded_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    character_id,
                    bracket,
                    row.rating,
                    row.won,
                    row.lost,
                    row.played,
                    row.recorded_at,
                ],
            )
            .context("insert snapshot")?;
        Ok(())
    }
}
