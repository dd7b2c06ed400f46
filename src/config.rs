use std::env;
use std::path::PathBuf;

use crate::error::PipelineError;

pub const REGION: &str = "kr";
pub const LOCALE: &str = "ko_KR";
pub const OAUTH_URL: &str = "https://oauth.battle.net/token";
pub const NS_PROFILE: &str = "profile-classicann-kr";
pub const NS_STATIC: &str = "static-2.5.5_65000-classicann-kr";

pub const BRACKETS: &[&str] = &["2v2", "3v3", "5v5"];
pub const MIN_LEVEL: u32 = 70;

/// Level recorded for characters registered directly rather than through a roster.
pub const DIRECT_CHARACTER_LEVEL: u32 = 70;

pub const ICON_CDN_URL: &str = "https://wow.zamimg.com/images/wow/icons/medium";
pub const SPELL_TOOLTIP_URL: &str = "https://nether.wowhead.com/tbc/tooltip/spell";

pub fn api_base() -> String {
    format!("https://{REGION}.api.blizzard.com")
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, PipelineError> {
        let client_id = env::var("BLIZZARD_CLIENT_ID").unwrap_or_default();
        let client_secret = env::var("BLIZZARD_CLIENT_SECRET").unwrap_or_default();
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(PipelineError::MissingCredentials);
        }
        Ok(Self {
            client_id,
            client_secret,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base: String,
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
    pub icons_dir: PathBuf,
    pub store_path: Option<PathBuf>,
    pub fetch_workers: usize,
    pub icon_lookup_workers: usize,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            api_base: api_base(),
            data_dir: path_env("LADDER_DATA_DIR", "data"),
            config_dir: path_env("LADDER_CONFIG_DIR", "config"),
            icons_dir: path_env("LADDER_ICONS_DIR", "icons"),
            store_path: env::var("LADDER_STORE_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            fetch_workers: fetch_parallelism(),
            icon_lookup_workers: icon_lookup_parallelism(),
        }
    }

    pub fn added_file(&self) -> PathBuf {
        self.config_dir.join("_added.json")
    }

    pub fn sources_file(&self) -> PathBuf {
        self.config_dir.join("sources.json")
    }

    pub fn icon_cache_file(&self) -> PathBuf {
        self.data_dir.join("_icon_cache.json")
    }
}

fn path_env(key: &str, default: &str) -> PathBuf {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn fetch_parallelism() -> usize {
    env::var("FETCH_PARALLELISM")
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(10)
        .clamp(2, 32)
}

// The tooltip service throttles hard; keep this pool small.
fn icon_lookup_parallelism() -> usize {
    env::var("ICON_LOOKUP_PARALLELISM")
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(5)
        .clamp(1, 16)
}
