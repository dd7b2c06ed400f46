use reqwest::Url;
use serde_json::Value;
use tracing::warn;

use crate::api_client::ApiClient;
use crate::config::NS_PROFILE;
use crate::models::RosterMember;

/// Build `<base>/<segments...>` with every segment percent-encoded.
pub fn api_url(base: &str, segments: &[&str]) -> Option<String> {
    let mut url = Url::parse(base).ok()?;
    url.path_segments_mut().ok()?.pop_if_empty().extend(segments);
    Some(url.to_string())
}

pub fn guild_roster_url(api_base: &str, guild_name: &str, realm_slug: &str) -> Option<String> {
    let guild_slug = guild_name.to_lowercase();
    api_url(
        api_base,
        &["data", "wow", "guild", realm_slug, &guild_slug, "roster"],
    )
}

/// Members of a guild at or above `min_level`. A missing guild is a
/// warning, never an error: the run carries on with other sources.
pub fn fetch_guild_members(
    api: &ApiClient<'_>,
    token: &str,
    api_base: &str,
    guild_name: &str,
    realm_slug: &str,
    min_level: u32,
) -> Vec<RosterMember> {
    let Some(url) = guild_roster_url(api_base, guild_name, realm_slug) else {
        warn!(guild = guild_name, realm = realm_slug, "could not build roster url");
        return Vec::new();
    };
    let Some(data) = api.get(token, &url, NS_PROFILE) else {
        warn!(guild = guild_name, realm = realm_slug, "guild not found or error");
        return Vec::new();
    };
    eligible_members(&data, realm_slug, min_level)
}

pub fn eligible_members(data: &Value, realm_fallback: &str, min_level: u32) -> Vec<RosterMember> {
    let Some(members) = data.get("members").and_then(|m| m.as_array()) else {
        return Vec::new();
    };

    members
        .iter()
        .filter_map(|m| {
            let ch = m.get("character")?;
            let level = ch.get("level").and_then(as_u32).unwrap_or(0);
            if level < min_level {
                return None;
            }
            let name = ch.get("name").and_then(|v| v.as_str()).unwrap_or_default();
            if name.is_empty() {
                return None;
            }
            let realm = ch
                .get("realm")
                .and_then(|r| r.get("slug"))
                .and_then(|v| v.as_str())
                .unwrap_or(realm_fallback);
            Some(RosterMember {
                name: name.to_string(),
                realm: realm.to_string(),
                level,
                id: ch.get("id").and_then(|v| v.as_u64()).unwrap_or(0),
            })
        })
        .collect()
}

fn as_u32(v: &Value) -> Option<u32> {
    v.as_u64().and_then(|n| u32::try_from(n).ok())
}
