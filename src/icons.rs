use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::api_client::{ApiClient, Fetched};
use crate::config::{ICON_CDN_URL, NS_STATIC, SPELL_TOOLTIP_URL};
use crate::models::Character;
use crate::roster::api_url;
use crate::worker_pool::run_pool;

const ICON_EXT: &str = "jpg";

/// Persistent id -> icon name map. An empty name means "looked up, no
/// icon" and is kept so the id is never queried again. Entries are only
/// ever added.
#[derive(Debug, Default)]
pub struct IconCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, String>,
}

impl IconCache {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let entries = match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("parse icon cache {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("read icon cache {}", path.display()));
            }
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            entries,
        })
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).ok();
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string(&self.entries).context("serialize icon cache")?;
        fs::write(&tmp, json).context("write icon cache")?;
        fs::rename(&tmp, path).context("swap icon cache")?;
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Resolved, non-empty icon name for `key`.
    pub fn icon(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn insert(&mut self, key: String, name: String) {
        self.entries.entry(key).or_insert(name);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn icon_names(&self) -> BTreeSet<&str> {
        self.entries
            .values()
            .map(String::as_str)
            .filter(|name| !name.is_empty())
            .collect()
    }
}

pub fn item_key(item_id: u64) -> String {
    item_id.to_string()
}

pub fn spell_key(spell_id: u64) -> String {
    format!("spell_{spell_id}")
}

/// Upstream lookups the resolver needs. `Missing` from a name lookup is
/// cached as "no icon"; `Failed` is not cached so the next run asks again.
/// `None` from `image_bytes` leaves the file missing for the same reason.
pub trait IconSource: Sync {
    fn item_icon_name(&self, item_id: u64) -> Fetched<String>;
    fn spell_icon_name(&self, spell_id: u64) -> Fetched<String>;
    fn image_bytes(&self, icon_name: &str) -> Option<Vec<u8>>;
}

pub struct RemoteIconSource<'a> {
    api: &'a ApiClient<'a>,
    token: &'a str,
    api_base: &'a str,
}

impl<'a> RemoteIconSource<'a> {
    pub fn new(api: &'a ApiClient<'a>, token: &'a str, api_base: &'a str) -> Self {
        Self {
            api,
            token,
            api_base,
        }
    }
}

impl IconSource for RemoteIconSource<'_> {
    fn item_icon_name(&self, item_id: u64) -> Fetched<String> {
        let id = item_id.to_string();
        let Some(url) = api_url(self.api_base, &["data", "wow", "media", "item", &id]) else {
            return Fetched::Failed;
        };
        self.api.lookup(self.token, &url, NS_STATIC).and_then(|data| {
            data.get("assets")
                .and_then(|a| a.as_array())
                .and_then(|assets| {
                    assets
                        .iter()
                        .find(|a| a.get("key").and_then(|k| k.as_str()) == Some("icon"))
                })
                .and_then(|a| a.get("value"))
                .and_then(|v| v.as_str())
                .and_then(extract_icon_name)
                .map_or(Fetched::Missing, Fetched::Found)
        })
    }

    fn spell_icon_name(&self, spell_id: u64) -> Fetched<String> {
        self.api
            .lookup_public(&format!("{SPELL_TOOLTIP_URL}/{spell_id}"))
            .and_then(|data| {
                data.get("icon")
                    .and_then(|v| v.as_str())
                    .and_then(|icon| sanitize_icon_name(&icon.to_lowercase()))
                    .map_or(Fetched::Missing, Fetched::Found)
            })
    }

    fn image_bytes(&self, icon_name: &str) -> Option<Vec<u8>> {
        self.api
            .get_bytes(&format!("{ICON_CDN_URL}/{icon_name}.{ICON_EXT}"))
    }
}

/// Bare asset name from a render URL: last path segment, no extension.
pub fn extract_icon_name(raw: &str) -> Option<String> {
    let last = raw.rsplit('/').next()?;
    let name = last.strip_suffix(".jpg").unwrap_or(last);
    sanitize_icon_name(name)
}

fn sanitize_icon_name(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return None;
    }
    Some(name.to_string())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IconSummary {
    pub item_lookups: usize,
    pub spell_lookups: usize,
    /// Lookups that got no answer and were left out of the cache.
    pub lookup_failures: usize,
    pub downloads: usize,
}

pub struct IconResolver<'c> {
    cache: &'c mut IconCache,
    icons_dir: PathBuf,
    item_workers: usize,
    spell_workers: usize,
}

impl<'c> IconResolver<'c> {
    pub fn new(
        cache: &'c mut IconCache,
        icons_dir: impl Into<PathBuf>,
        item_workers: usize,
        spell_workers: usize,
    ) -> Self {
        Self {
            cache,
            icons_dir: icons_dir.into(),
            item_workers,
            spell_workers,
        }
    }

    /// Resolve, download and annotate icons for `characters`. The cache is
    /// saved after each lookup stage so partial work survives a crash.
    pub fn resolve(
        &mut self,
        source: &dyn IconSource,
        characters: &mut [Character],
    ) -> Result<IconSummary> {
        fs::create_dir_all(&self.icons_dir)
            .with_context(|| format!("create icons dir {}", self.icons_dir.display()))?;

        let (item_lookups, item_failures) = self.resolve_item_names(source, characters);
        if item_lookups > 0 {
            self.cache.save()?;
        }
        let (spell_lookups, spell_failures) = self.resolve_spell_names(source, characters);
        if spell_lookups > 0 {
            self.cache.save()?;
        }
        let downloads = self.download_missing(source)?;
        self.annotate(characters);

        Ok(IconSummary {
            item_lookups,
            spell_lookups,
            lookup_failures: item_failures + spell_failures,
            downloads,
        })
    }

    fn resolve_item_names(
        &mut self,
        source: &dyn IconSource,
        characters: &[Character],
    ) -> (usize, usize) {
        let needed: BTreeSet<u64> = characters
            .iter()
            .flat_map(Character::item_ids)
            .filter(|id| !self.cache.contains(&item_key(*id)))
            .collect();
        if needed.is_empty() {
            return (0, 0);
        }

        info!("fetching {} new item icon names", needed.len());
        let total = needed.len();
        let results = run_pool(
            "icon names",
            self.item_workers,
            needed.into_iter().collect(),
            50,
            |id| (id, source.item_icon_name(id)),
        );
        (total, self.record(results, item_key))
    }

    fn resolve_spell_names(
        &mut self,
        source: &dyn IconSource,
        characters: &[Character],
    ) -> (usize, usize) {
        let needed: BTreeSet<u64> = characters
            .iter()
            .flat_map(Character::spell_ids)
            .filter(|id| !self.cache.contains(&spell_key(*id)))
            .collect();
        if needed.is_empty() {
            return (0, 0);
        }

        info!("fetching {} talent spell icons", needed.len());
        let total = needed.len();
        let results = run_pool(
            "talent icons",
            self.spell_workers,
            needed.into_iter().collect(),
            50,
            |id| (id, source.spell_icon_name(id)),
        );
        (total, self.record(results, spell_key))
    }

    // Returns how many lookups failed and were not cached.
    fn record(&mut self, results: Vec<(u64, Fetched<String>)>, key: fn(u64) -> String) -> usize {
        let mut failed = 0;
        for (id, outcome) in results {
            match outcome {
                Fetched::Found(name) => self.cache.insert(key(id), name),
                Fetched::Missing => self.cache.insert(key(id), String::new()),
                Fetched::Failed => failed += 1,
            }
        }
        if failed > 0 {
            warn!(failed, "icon lookups failed, will retry next run");
        }
        failed
    }

    fn download_missing(&self, source: &dyn IconSource) -> Result<usize> {
        let existing = existing_icon_names(&self.icons_dir)?;
        let missing: Vec<String> = self
            .cache
            .icon_names()
            .into_iter()
            .filter(|name| !existing.contains(*name))
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            info!("all icon images already downloaded");
            return Ok(0);
        }

        info!("downloading {} icon images from CDN", missing.len());
        let dir = self.icons_dir.as_path();
        let saved = run_pool("downloads", self.item_workers, missing, 100, |name| {
            download_icon(source, dir, &name)
        });
        Ok(saved.into_iter().filter(|ok| *ok).count())
    }

    fn annotate(&self, characters: &mut [Character]) {
        for ch in characters.iter_mut() {
            for item in ch.equipment.iter_mut().flatten() {
                if let Some(name) = self.cache.icon(&item_key(item.item_id)) {
                    item.icon = Some(format!("icons/{name}.{ICON_EXT}"));
                }
            }
            for talent in ch.talents_mut() {
                if let Some(name) = self.cache.icon(&spell_key(talent.spell_id)) {
                    talent.icon = Some(name.to_string());
                }
            }
        }
    }
}

fn existing_icon_names(dir: &Path) -> Result<HashSet<String>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("list icons dir {}", dir.display()))?;
    Ok(entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == ICON_EXT))
        .filter_map(|path| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
        .collect())
}

// Idempotent by filename: an existing file is never fetched again.
fn download_icon(source: &dyn IconSource, dir: &Path, name: &str) -> bool {
    let dest = dir.join(format!("{name}.{ICON_EXT}"));
    if dest.exists() {
        return true;
    }
    let Some(bytes) = source.image_bytes(name) else {
        return false;
    };
    let tmp = dest.with_extension("part");
    if fs::write(&tmp, &bytes).is_err() {
        return false;
    }
    fs::rename(&tmp, &dest).is_ok()
}
