use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unique identity of a character across the whole dataset: the name is
/// compared case-insensitively, the realm slug exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    name: String,
    realm: String,
}

impl IdentityKey {
    pub fn new(name: &str, realm: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            realm: realm.to_string(),
        }
    }
}

/// One character's standing in one bracket at fetch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BracketStat {
    pub rating: u32,
    pub won: u32,
    pub lost: u32,
    pub played: u32,
    #[serde(default)]
    pub season_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnchantKind {
    Permanent,
    Gem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enchant {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: EnchantKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquippedItem {
    pub slot: String,
    pub slot_type: String,
    pub name: String,
    pub quality: String,
    pub quality_type: String,
    pub item_id: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enchants: Vec<Enchant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Talent {
    pub name: String,
    pub rank: u32,
    pub spell_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecTree {
    pub name: String,
    pub points: u32,
    #[serde(default)]
    pub talents: Vec<Talent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecGroup {
    pub active: bool,
    #[serde(default)]
    pub trees: Vec<SpecTree>,
}

/// Full record for one character, replaced wholesale on every re-fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub realm: String,
    #[serde(default)]
    pub realm_name: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub race: String,
    #[serde(default)]
    pub faction: String,
    #[serde(default)]
    pub guild: String,
    #[serde(default)]
    pub brackets: BTreeMap<String, BracketStat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_groups: Option<Vec<SpecGroup>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment: Option<Vec<EquippedItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Character {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(&self.name, &self.realm)
    }

    pub fn has_pvp(&self) -> bool {
        !self.brackets.is_empty()
    }

    pub fn item_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.equipment
            .iter()
            .flatten()
            .map(|item| item.item_id)
            .filter(|id| *id != 0)
    }

    pub fn spell_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.talents().map(|t| t.spell_id).filter(|id| *id != 0)
    }

    pub fn talents(&self) -> impl Iterator<Item = &Talent> + '_ {
        self.spec_groups
            .iter()
            .flatten()
            .flat_map(|g| g.trees.iter())
            .flat_map(|t| t.talents.iter())
    }

    pub fn talents_mut(&mut self) -> impl Iterator<Item = &mut Talent> + '_ {
        self.spec_groups
            .iter_mut()
            .flatten()
            .flat_map(|g| g.trees.iter_mut())
            .flat_map(|t| t.talents.iter_mut())
    }
}

/// Minimal roster stub handed to the record fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterMember {
    pub name: String,
    pub realm: String,
    pub level: u32,
    pub id: u64,
}

impl RosterMember {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(&self.name, &self.realm)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub realm: String,
    pub realm_name: String,
    pub class: String,
    pub race: String,
    pub faction: String,
    pub guild: String,
    pub rating: u32,
    pub won: u32,
    pub lost: u32,
    pub played: u32,
    pub winrate: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRealm {
    pub name: String,
    pub realm: String,
}

/// Shape shared by `sources.json` and the `_added.json` queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryList {
    #[serde(default)]
    pub guilds: Vec<NamedRealm>,
    #[serde(default)]
    pub characters: Vec<NamedRealm>,
}

impl EntryList {
    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty() && self.characters.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketMeta {
    pub count: usize,
    pub file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_characters_scanned: Option<usize>,
    #[serde(default)]
    pub total_with_pvp: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guilds_scanned: Vec<String>,
    #[serde(default)]
    pub brackets: BTreeMap<String, BracketMeta>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
