use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::api_client::ApiClient;
use crate::auth::fetch_access_token;
use crate::character_fetch::fetch_characters;
use crate::config::{
    BRACKETS, Credentials, LOCALE, MIN_LEVEL, NS_PROFILE, OAUTH_URL, REGION, Settings,
};
use crate::dataset::{DatasetFiles, load_entry_list, remove_queue};
use crate::http_client::Transport;
use crate::icons::{IconCache, IconResolver, RemoteIconSource};
use crate::leaderboard::build_bracket_boards;
use crate::merge::{StubCollector, merge_characters, refresh_meta};
use crate::models::{Character, EntryList, LeaderboardEntry, Meta, RosterMember};
use crate::roster::fetch_guild_members;
use crate::sync::{SqliteStore, sync_characters};

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub scanned: usize,
    pub with_pvp: usize,
    pub added: usize,
    pub total: usize,
    pub snapshots: Option<usize>,
    pub boards: Vec<(String, usize)>,
}

/// Rebuild the whole dataset from `sources.json`.
pub fn run_full(
    settings: &Settings,
    credentials: &Credentials,
    transport: &dyn Transport,
) -> Result<RunSummary> {
    let sources = load_entry_list(&settings.sources_file())?.with_context(|| {
        format!("sources file {} not found", settings.sources_file().display())
    })?;

    info!("authenticating");
    let token = fetch_access_token(transport, OAUTH_URL, credentials)?;
    info!("authenticated");
    let api = ApiClient::new(transport);

    let stubs = collect_stubs(&api, &token, settings, &sources, StubCollector::new());
    let scanned = stubs.len();
    info!("total unique characters to query: {scanned}");

    let mut characters =
        fetch_characters(&api, &token, &settings.api_base, stubs, settings.fetch_workers);
    characters.retain(Character::has_pvp);
    info!("characters with pvp data: {}", characters.len());

    resolve_icons(settings, &api, &token, &mut characters)?;

    let files = DatasetFiles::new(&settings.data_dir);
    let boards = build_bracket_boards(&characters, BRACKETS);
    let mut meta = Meta {
        region: REGION.to_string(),
        namespace: NS_PROFILE.to_string(),
        locale: LOCALE.to_string(),
        total_characters_scanned: Some(scanned),
        guilds_scanned: sources.guilds.iter().map(|g| g.name.clone()).collect(),
        ..Meta::default()
    };
    refresh_meta(&mut meta, &characters, &boards, &Utc::now().to_rfc3339());
    write_boards(&files, &boards)?;
    files.save_characters(&characters)?;
    files.save_meta(&meta)?;
    info!("data saved to {}", settings.data_dir.display());

    let snapshots = sync_if_configured(settings, &characters)?;

    Ok(RunSummary {
        scanned,
        with_pvp: characters.len(),
        added: characters.len(),
        total: characters.len(),
        snapshots,
        boards: board_counts(&boards),
    })
}

/// The added-entries queue, if there is anything in it.
pub fn load_pending(settings: &Settings) -> Result<Option<EntryList>> {
    let queue = load_entry_list(&settings.added_file())?;
    Ok(queue.filter(|q| !q.is_empty()))
}

/// Fetch only identities from the queue that the dataset does not hold yet,
/// merge them in and rebuild everything derived. The queue is removed once
/// the merged dataset is on disk.
pub fn run_incremental(
    settings: &Settings,
    queue: &EntryList,
    credentials: &Credentials,
    transport: &dyn Transport,
) -> Result<RunSummary> {
    info!("authenticating");
    let token = fetch_access_token(transport, OAUTH_URL, credentials)?;
    let api = ApiClient::new(transport);

    let files = DatasetFiles::new(&settings.data_dir);
    let mut merged = files.load_characters()?;

    let stubs = collect_stubs(&api, &token, settings, queue, StubCollector::excluding(&merged));
    let scanned = stubs.len();
    if scanned == 0 {
        info!("all new entries already exist in data, nothing to fetch");
        remove_queue(&settings.added_file())?;
        return Ok(RunSummary {
            total: merged.len(),
            ..RunSummary::default()
        });
    }
    info!("new characters to fetch: {scanned}");

    let mut fetched =
        fetch_characters(&api, &token, &settings.api_base, stubs, settings.fetch_workers);
    fetched.retain(Character::has_pvp);
    info!("new characters with data: {}", fetched.len());

    resolve_icons(settings, &api, &token, &mut fetched)?;

    let added = merge_characters(&mut merged, fetched.clone());
    info!("merged {added} new characters (total: {})", merged.len());

    let boards = build_bracket_boards(&merged, BRACKETS);
    let mut meta = files.load_meta()?.unwrap_or_else(|| Meta {
        region: REGION.to_string(),
        namespace: NS_PROFILE.to_string(),
        locale: LOCALE.to_string(),
        ..Meta::default()
    });
    refresh_meta(&mut meta, &merged, &boards, &Utc::now().to_rfc3339());
    files.save_characters(&merged)?;
    write_boards(&files, &boards)?;
    files.save_meta(&meta)?;

    let snapshots = sync_if_configured(settings, &fetched)?;

    remove_queue(&settings.added_file())?;
    info!("done (incremental)");

    Ok(RunSummary {
        scanned,
        with_pvp: fetched.len(),
        added,
        total: merged.len(),
        snapshots,
        boards: board_counts(&boards),
    })
}

fn collect_stubs(
    api: &ApiClient<'_>,
    token: &str,
    settings: &Settings,
    entries: &EntryList,
    mut collector: StubCollector,
) -> Vec<RosterMember> {
    for guild in &entries.guilds {
        info!("fetching guild roster: {} ({})", guild.name, guild.realm);
        let members = fetch_guild_members(
            api,
            token,
            &settings.api_base,
            &guild.name,
            &guild.realm,
            MIN_LEVEL,
        );
        info!("  {} eligible members (lvl >= {MIN_LEVEL})", members.len());
        for member in members {
            collector.push(member);
        }
    }
    for ch in &entries.characters {
        collector.push_direct(ch);
    }
    collector.into_stubs()
}

fn resolve_icons(
    settings: &Settings,
    api: &ApiClient<'_>,
    token: &str,
    characters: &mut [Character],
) -> Result<()> {
    let mut cache = IconCache::load(&settings.icon_cache_file())?;
    let source = RemoteIconSource::new(api, token, &settings.api_base);
    let summary = IconResolver::new(
        &mut cache,
        &settings.icons_dir,
        settings.fetch_workers,
        settings.icon_lookup_workers,
    )
    .resolve(&source, characters)?;
    info!(
        item_lookups = summary.item_lookups,
        spell_lookups = summary.spell_lookups,
        lookup_failures = summary.lookup_failures,
        downloads = summary.downloads,
        "icons resolved"
    );
    Ok(())
}

fn write_boards(files: &DatasetFiles, boards: &[(String, Vec<LeaderboardEntry>)]) -> Result<()> {
    for (bracket, board) in boards {
        info!("{bracket}: {} ranked players", board.len());
        files.save_leaderboard(bracket, board)?;
    }
    Ok(())
}

fn board_counts(boards: &[(String, Vec<LeaderboardEntry>)]) -> Vec<(String, usize)> {
    boards
        .iter()
        .map(|(bracket, board)| (bracket.clone(), board.len()))
        .collect()
}

fn sync_if_configured(settings: &Settings, characters: &[Character]) -> Result<Option<usize>> {
    let Some(path) = settings.store_path.as_ref() else {
        info!("skipping store sync (LADDER_STORE_PATH not set)");
        return Ok(None);
    };
    if characters.is_empty() {
        return Ok(Some(0));
    }
    info!("syncing {} characters to {}", characters.len(), path.display());
    let mut store = match SqliteStore::open(path) {
        Ok(store) => store,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "store unavailable, skipping sync");
            return Ok(None);
        }
    };
    Ok(Some(sync_characters(&mut store, characters, &Utc::now().to_rfc3339())))
}
