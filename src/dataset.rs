use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::merge::bracket_file;
use crate::models::{Character, EntryList, LeaderboardEntry, Meta};

const ALL_CHARACTERS_FILE: &str = "all_characters.json";
const META_FILE: &str = "meta.json";

/// The JSON files making up the published dataset. Only the orchestrating
/// run writes these, after all concurrent work has finished.
#[derive(Debug, Clone)]
pub struct DatasetFiles {
    data_dir: PathBuf,
}

impl DatasetFiles {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn characters_path(&self) -> PathBuf {
        self.data_dir.join(ALL_CHARACTERS_FILE)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.data_dir.join(META_FILE)
    }

    pub fn leaderboard_path(&self, bracket: &str) -> PathBuf {
        self.data_dir.join(bracket_file(bracket))
    }

    pub fn load_characters(&self) -> Result<Vec<Character>> {
        Ok(read_json(&self.characters_path())?.unwrap_or_default())
    }

    pub fn save_characters(&self, characters: &[Character]) -> Result<()> {
        write_json(&self.characters_path(), &characters)
    }

    pub fn load_leaderboard(&self, bracket: &str) -> Result<Vec<LeaderboardEntry>> {
        Ok(read_json(&self.leaderboard_path(bracket))?.unwrap_or_default())
    }

    pub fn save_leaderboard(&self, bracket: &str, entries: &[LeaderboardEntry]) -> Result<()> {
        write_json(&self.leaderboard_path(bracket), &entries)
    }

    pub fn load_meta(&self) -> Result<Option<Meta>> {
        read_json(&self.meta_path())
    }

    pub fn save_meta(&self, meta: &Meta) -> Result<()> {
        write_json(&self.meta_path(), meta)
    }
}

pub fn load_entry_list(path: &Path) -> Result<Option<EntryList>> {
    read_json(path)
}

/// Delete a consumed queue file. Already gone is fine.
pub fn remove_queue(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("remove {}", path.display())),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("read {}", path.display())),
    };
    let value = serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(value))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}
