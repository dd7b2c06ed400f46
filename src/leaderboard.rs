use crate::models::{Character, LeaderboardEntry};

/// Win percentage rounded to one decimal; 0 when no games were decided.
pub fn win_rate(won: u32, lost: u32) -> f64 {
    let total = u64::from(won) + u64::from(lost);
    if total == 0 {
        return 0.0;
    }
    let pct = won as f64 / total as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

/// Ranked view of one bracket. Unrated characters (rating 0 or no entry)
/// are left out; ties keep dataset order.
pub fn build_leaderboard(characters: &[Character], bracket: &str) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = characters
        .iter()
        .filter_map(|ch| {
            let stat = ch.brackets.get(bracket)?;
            if stat.rating == 0 {
                return None;
            }
            Some(LeaderboardEntry {
                name: ch.name.clone(),
                realm: ch.realm.clone(),
                realm_name: ch.realm_name.clone(),
                class: ch.class.clone(),
                race: ch.race.clone(),
                faction: ch.faction.clone(),
                guild: ch.guild.clone(),
                rating: stat.rating,
                won: stat.won,
                lost: stat.lost,
                played: stat.played,
                winrate: win_rate(stat.won, stat.lost),
                rank: 0,
            })
        })
        .collect();

    entries.sort_by(|a, b| b.rating.cmp(&a.rating));
    for (idx, entry) in entries.iter_mut().enumerate() {
        entry.rank = idx + 1;
    }
    entries
}

/// Leaderboards for every bracket, in bracket order.
pub fn build_bracket_boards(
    characters: &[Character],
    brackets: &[&str],
) -> Vec<(String, Vec<LeaderboardEntry>)> {
    brackets
        .iter()
        .map(|bracket| (bracket.to_string(), build_leaderboard(characters, bracket)))
        .collect()
}
