use std::collections::BTreeMap;

use serde_json::Value;
use tracing::info;

use crate::api_client::ApiClient;
use crate::config::{BRACKETS, LOCALE, NS_PROFILE};
use crate::models::{
    BracketStat, Character, Enchant, EnchantKind, EquippedItem, RosterMember, SpecGroup,
    SpecTree, Talent,
};
use crate::roster::api_url;
use crate::worker_pool::run_pool;

const PROGRESS_EVERY: usize = 50;
const SKIPPED_SLOTS: &[&str] = &["SHIRT", "TABARD"];

/// Fetch full records for every stub on a bounded pool. Stubs whose
/// profile does not exist yield nothing; order of the result is the
/// completion order, not the input order.
pub fn fetch_characters(
    api: &ApiClient<'_>,
    token: &str,
    api_base: &str,
    stubs: Vec<RosterMember>,
    workers: usize,
) -> Vec<Character> {
    info!(
        "fetching {} characters with {} workers",
        stubs.len(),
        workers
    );
    run_pool("progress", workers, stubs, PROGRESS_EVERY, |stub| {
        fetch_character(api, token, api_base, &stub.name, &stub.realm)
    })
    .into_iter()
    .flatten()
    .collect()
}

pub fn fetch_character(
    api: &ApiClient<'_>,
    token: &str,
    api_base: &str,
    name: &str,
    realm_slug: &str,
) -> Option<Character> {
    let encoded_name = name.to_lowercase();
    let base_url = api_url(
        api_base,
        &["profile", "wow", "character", realm_slug, &encoded_name],
    )?;

    let profile = api.get(token, &base_url, NS_PROFILE)?;
    let mut character = parse_profile(&profile, name, realm_slug);

    for bracket in BRACKETS {
        let url = format!("{base_url}/pvp-bracket/{bracket}");
        if let Some(data) = api.get(token, &url, NS_PROFILE) {
            character
                .brackets
                .insert((*bracket).to_string(), parse_bracket(&data));
        }
    }

    if let Some(data) = api.get(token, &format!("{base_url}/specializations"), NS_PROFILE) {
        character.spec_groups = Some(parse_specializations(&data));
    }
    if let Some(data) = api.get(token, &format!("{base_url}/equipment"), NS_PROFILE) {
        character.equipment = Some(parse_equipment(&data));
    }
    if let Some(data) = api.get(token, &format!("{base_url}/character-media"), NS_PROFILE) {
        character.avatar = parse_avatar(&data);
    }

    Some(character)
}

pub fn parse_profile(profile: &Value, fallback_name: &str, realm_slug: &str) -> Character {
    Character {
        name: str_at(profile, &["name"])
            .unwrap_or(fallback_name)
            .to_string(),
        realm: realm_slug.to_string(),
        realm_name: profile
            .get("realm")
            .and_then(|r| r.get("name"))
            .map(localized)
            .unwrap_or_default(),
        level: profile
            .get("level")
            .and_then(|v| v.as_u64())
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0),
        class: str_at(profile, &["character_class", "name"])
            .unwrap_or_default()
            .to_string(),
        race: str_at(profile, &["race", "name"]).unwrap_or_default().to_string(),
        faction: str_at(profile, &["faction", "type"])
            .unwrap_or_default()
            .to_string(),
        guild: str_at(profile, &["guild", "name"]).unwrap_or_default().to_string(),
        brackets: BTreeMap::new(),
        spec_groups: None,
        equipment: None,
        avatar: None,
    }
}

pub fn parse_bracket(data: &Value) -> BracketStat {
    let stats = data.get("season_match_statistics");
    let stat = |key: &str| {
        stats
            .and_then(|s| s.get(key))
            .and_then(|v| v.as_u64())
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    };
    BracketStat {
        rating: data
            .get("rating")
            .and_then(|v| v.as_u64())
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0),
        won: stat("won"),
        lost: stat("lost"),
        played: stat("played"),
        season_id: data
            .get("season")
            .and_then(|s| s.get("id"))
            .and_then(|v| v.as_u64()),
    }
}

pub fn parse_specializations(data: &Value) -> Vec<SpecGroup> {
    array_at(data, "specialization_groups")
        .map(|group| SpecGroup {
            active: group
                .get("is_active")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            trees: array_at(group, "specializations")
                .map(|spec| SpecTree {
                    name: str_at(spec, &["specialization_name"])
                        .unwrap_or_default()
                        .to_string(),
                    points: u32_at(spec, "spent_points"),
                    talents: array_at(spec, "talents")
                        .map(|t| {
                            let spell = t.get("spell_tooltip").and_then(|s| s.get("spell"));
                            Talent {
                                name: spell
                                    .and_then(|s| s.get("name"))
                                    .and_then(|v| v.as_str())
                                    .unwrap_or_default()
                                    .to_string(),
                                rank: u32_at(t, "talent_rank"),
                                spell_id: spell
                                    .and_then(|s| s.get("id"))
                                    .and_then(|v| v.as_u64())
                                    .unwrap_or(0),
                                icon: None,
                            }
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect()
}

pub fn parse_equipment(data: &Value) -> Vec<EquippedItem> {
    array_at(data, "equipped_items")
        .filter_map(|item| {
            let slot_type = str_at(item, &["slot", "type"]).unwrap_or_default();
            if SKIPPED_SLOTS.contains(&slot_type) {
                return None;
            }
            let enchants = array_at(item, "enchantments")
                .map(|ench| {
                    let text = str_at(ench, &["display_string"])
                        .unwrap_or_default()
                        .to_string();
                    if str_at(ench, &["enchantment_slot", "type"]) == Some("PERMANENT") {
                        Enchant {
                            text,
                            kind: EnchantKind::Permanent,
                            source: None,
                        }
                    } else {
                        Enchant {
                            text,
                            kind: EnchantKind::Gem,
                            source: str_at(ench, &["source_item", "name"])
                                .filter(|s| !s.is_empty())
                                .map(|s| s.to_string()),
                        }
                    }
                })
                .collect();
            Some(EquippedItem {
                slot: str_at(item, &["slot", "name"]).unwrap_or_default().to_string(),
                slot_type: slot_type.to_string(),
                name: str_at(item, &["name"]).unwrap_or_default().to_string(),
                quality: str_at(item, &["quality", "name"])
                    .unwrap_or_default()
                    .to_string(),
                quality_type: str_at(item, &["quality", "type"])
                    .unwrap_or_default()
                    .to_string(),
                item_id: item
                    .get("item")
                    .and_then(|i| i.get("id"))
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0),
                enchants,
                icon: None,
            })
        })
        .collect()
}

pub fn parse_avatar(data: &Value) -> Option<String> {
    array_at(data, "assets")
        .find(|asset| str_at(asset, &["key"]) == Some("avatar"))
        .map(|asset| str_at(asset, &["value"]).unwrap_or_default().to_string())
}

// Realm names arrive either as a plain string or as a per-locale object.
fn localized(v: &Value) -> String {
    if let Some(s) = v.as_str() {
        return s.to_string();
    }
    v.get(LOCALE)
        .or_else(|| v.get("en_US"))
        .and_then(|s| s.as_str())
        .unwrap_or_default()
        .to_string()
}

fn str_at<'v>(v: &'v Value, path: &[&str]) -> Option<&'v str> {
    let mut cur = v;
    for key in path {
        cur = cur.get(*key)?;
    }
    cur.as_str()
}

fn u32_at(v: &Value, key: &str) -> u32 {
    v.get(key)
        .and_then(|v| v.as_u64())
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

fn array_at<'v>(v: &'v Value, key: &str) -> impl Iterator<Item = &'v Value> + 'v {
    v.get(key)
        .and_then(|a| a.as_array())
        .into_iter()
        .flatten()
}
