mod common;

use std::collections::HashSet;

use arena_ladder::merge::{merge_characters, refresh_meta};
use arena_ladder::leaderboard::build_bracket_boards;
use arena_ladder::models::{Meta, IdentityKey};

use common::character;

#[test]
fn merge_never_produces_duplicate_identities() {
    let mut existing = vec![
        character("Anduin", "azshara", &[("2v2", 1700, 5, 5)]),
        character("Varian", "azshara", &[("2v2", 1800, 5, 5)]),
    ];
    let incoming = vec![
        character("ANDUIN", "azshara", &[("2v2", 2500, 50, 0)]),
        character("Anduin", "hyjal", &[("2v2", 1600, 5, 5)]),
        character("anduin", "hyjal", &[("2v2", 1650, 6, 5)]),
    ];
    let added = merge_characters(&mut existing, incoming);
    assert_eq!(added, 1);

    let keys: HashSet<IdentityKey> = existing.iter().map(|c| c.identity_key()).collect();
    assert_eq!(keys.len(), existing.len());
    // First seen wins: the stored Anduin keeps its old rating.
    assert_eq!(existing[0].brackets["2v2"].rating, 1700);
}

#[test]
fn merging_the_same_batch_twice_adds_nothing() {
    let mut existing = vec![character("Jaina", "azshara", &[("3v3", 2000, 10, 2)])];
    let batch = vec![
        character("Thrall", "azshara", &[("2v2", 1900, 8, 2)]),
        character("Sylvanas", "hyjal", &[("5v5", 1750, 4, 4)]),
    ];
    assert_eq!(merge_characters(&mut existing, batch.clone()), 2);
    assert_eq!(merge_characters(&mut existing, batch), 0);
    assert_eq!(existing.len(), 3);
}

#[test]
fn merge_keeps_first_record_within_batch() {
    let mut existing = Vec::new();
    let added = merge_characters(
        &mut existing,
        vec![
            character("Illidan", "azshara", &[("2v2", 2200, 1, 0)]),
            character("illidan", "azshara", &[("2v2", 1000, 0, 1)]),
        ],
    );
    assert_eq!(added, 1);
    assert_eq!(existing[0].brackets["2v2"].rating, 2200);
}

#[test]
fn meta_counts_follow_merged_dataset() {
    let chars = vec![
        character("A", "azshara", &[("2v2", 1500, 1, 1)]),
        character("B", "azshara", &[("2v2", 0, 0, 0), ("3v3", 1600, 2, 2)]),
        character("C", "azshara", &[]),
    ];
    let boards = build_bracket_boards(&chars, &["2v2", "3v3", "5v5"]);
    let mut meta = Meta {
        region: "kr".to_string(),
        total_characters_scanned: Some(10),
        ..Meta::default()
    };
    refresh_meta(&mut meta, &chars, &boards, "2026-10-19T00:00:00+00:00");
    assert_eq!(meta.total_with_pvp, 2);
    assert_eq!(meta.brackets["2v2"].count, 1);
    assert_eq!(meta.brackets["3v3"].count, 1);
    assert_eq!(meta.brackets["5v5"].count, 0);
    assert_eq!(meta.brackets["5v5"].file, "5v5.json");
    assert_eq!(meta.updated_at, "2026-10-19T00:00:00+00:00");
    assert_eq!(meta.total_characters_scanned, Some(10));
    assert_eq!(meta.region, "kr");
}
