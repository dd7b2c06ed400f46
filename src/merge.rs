use std::collections::HashSet;

use crate::config::DIRECT_CHARACTER_LEVEL;
use crate::models::{
    BracketMeta, Character, IdentityKey, LeaderboardEntry, Meta, NamedRealm, RosterMember,
};

/// Ordered, duplicate-free list of stubs to fetch. Seeding it with an
/// existing dataset makes it skip identities that are already stored.
#[derive(Debug, Default)]
pub struct StubCollector {
    seen: HashSet<IdentityKey>,
    stubs: Vec<RosterMember>,
}

impl StubCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn excluding(existing: &[Character]) -> Self {
        Self {
            seen: existing.iter().map(Character::identity_key).collect(),
            stubs: Vec::new(),
        }
    }

    pub fn push(&mut self, member: RosterMember) -> bool {
        if !self.seen.insert(member.identity_key()) {
            return false;
        }
        self.stubs.push(member);
        true
    }

    pub fn push_direct(&mut self, entry: &NamedRealm) -> bool {
        self.push(RosterMember {
            name: entry.name.clone(),
            realm: entry.realm.clone(),
            level: DIRECT_CHARACTER_LEVEL,
            id: 0,
        })
    }

    pub fn into_stubs(self) -> Vec<RosterMember> {
        self.stubs
    }
}

/// Append every incoming record whose identity is not stored yet. Stored
/// records are never replaced here; a full run is what refreshes them.
/// Returns the number of records added.
pub fn merge_characters(existing: &mut Vec<Character>, incoming: Vec<Character>) -> usize {
    let mut keys: HashSet<IdentityKey> = existing.iter().map(Character::identity_key).collect();
    let mut added = 0;
    for ch in incoming {
        if keys.insert(ch.identity_key()) {
            existing.push(ch);
            added += 1;
        }
    }
    added
}

pub fn bracket_file(bracket: &str) -> String {
    format!("{bracket}.json")
}

/// Recompute the dataset-wide fields of `meta` from the full dataset and
/// its freshly built leaderboards. Fields not derived here are kept.
pub fn refresh_meta(
    meta: &mut Meta,
    characters: &[Character],
    boards: &[(String, Vec<LeaderboardEntry>)],
    updated_at: &str,
) {
    meta.updated_at = updated_at.to_string();
    meta.total_with_pvp = characters.iter().filter(|c| c.has_pvp()).count();
    for (bracket, board) in boards {
        meta.brackets.insert(
            bracket.clone(),
            BracketMeta {
                count: board.len(),
                file: bracket_file(bracket),
            },
        );
    }
}
