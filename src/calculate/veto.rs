//! Map veto breakdown.

use std::collections::{HashMap, HashSet};

use crate::faceit::shape::extract_teams_basic;
use crate::models::{MatchRecord, VetoRow};

/// Comparable map name: lowercase without the `de_` prefix.
fn map_key(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    lower.strip_prefix("de_").unwrap_or(&lower).to_string()
}

/// Veto row for a match.
///
/// Bans alternate between competitors starting with the first, so the first
/// team owns bans 1 and 3 and the second team bans 2 and 4. Each team owns one
/// pick in order. The leftover map is the single map-pool entry that was
/// neither picked nor banned; with zero or several candidates it is empty.
pub fn veto_row(m: &MatchRecord, names: &HashMap<String, String>, map_pool: &[String]) -> VetoRow {
    let teams = extract_teams_basic(&m.teams);
    let team_name = |i: usize| teams.get(i).map(|t| t.name_or(names)).unwrap_or_default();

    let picks = m.map_picks();
    let bans = m.map_bans();
    let owned = |idx: &[usize]| {
        idx.iter()
            .filter_map(|i| bans.get(*i))
            .filter(|b| !b.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(",")
    };

    let used: HashSet<String> = picks.iter().chain(bans.iter()).map(|s| map_key(s)).collect();
    let leftover: Vec<&String> = map_pool
        .iter()
        .filter(|name| !used.contains(&map_key(name)))
        .collect();
    let leftover_map = match leftover.as_slice() {
        [only] => only.to_string(),
        _ => String::new(),
    };

    VetoRow {
        match_id: m.match_id.clone(),
        team1_name: team_name(0),
        team2_name: team_name(1),
        team1_bans: owned(&[0, 2]),
        team2_bans: owned(&[1, 3]),
        team1_pick: picks.first().cloned().unwrap_or_default(),
        team2_pick: picks.get(1).cloned().unwrap_or_default(),
        leftover_map,
        picks: picks.join(","),
        bans: bans.join(","),
        map_voting_json: m.map_voting().to_string(),
    }
}
