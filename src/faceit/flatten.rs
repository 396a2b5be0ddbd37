//! Reshape nested API payloads into flat records.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::shape::{extract_team_ids, extract_teams_basic};
use crate::models::{
    value_to_string, MatchRecord, MatchResultRow, MatchRow, MatchWithStats, PlayerRow,
    PlayerStatLine, StandingsRow, TeamDetail, TeamRow,
};

fn str_at<'a>(v: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(v, |cur, key| cur.get(*key))
}

fn text_at(v: &Value, path: &[&str]) -> Option<String> {
    str_at(v, path).and_then(value_to_string)
}

fn u32_at(v: &Value, path: &[&str]) -> Option<u32> {
    str_at(v, path).and_then(|x| match x {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn f64_at(v: &Value, path: &[&str]) -> Option<f64> {
    str_at(v, path).and_then(|x| match x {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Team id of a standings row: `team.team_id`, else `entity_id`.
fn standings_team_id(row: &Value) -> Option<String> {
    text_at(row, &["team", "team_id"])
        .or_else(|| text_at(row, &["entity_id"]))
        .filter(|s| !s.is_empty())
}

/// Convert raw standings entries, keeping their order.
pub fn standings_rows(raw: &[Value]) -> Vec<StandingsRow> {
    raw.iter()
        .map(|row| StandingsRow {
            position: u32_at(row, &["position"]).or_else(|| u32_at(row, &["rank"])),
            team_id: standings_team_id(row).unwrap_or_default(),
            team_name: text_at(row, &["team", "name"])
                .or_else(|| text_at(row, &["entity_name"]))
                .unwrap_or_default(),
            points: f64_at(row, &["points"]).or_else(|| f64_at(row, &["score"])),
            wins: u32_at(row, &["wins"]),
            losses: u32_at(row, &["losses"]),
        })
        .collect()
}

/// Distinct team ids of the standings, in rank order.
pub fn standings_team_ids(raw: &[Value]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(standings_team_id)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Distinct team ids of every match, in first-seen order.
pub fn match_team_ids(matches: &[MatchRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    matches
        .iter()
        .flat_map(|m| extract_team_ids(&m.teams))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Matches in which at least two competitors belong to `team_ids`.
pub fn division_matches(matches: Vec<MatchRecord>, team_ids: &[String]) -> Vec<MatchRecord> {
    let set: HashSet<&str> = team_ids.iter().map(String::as_str).collect();
    matches
        .into_iter()
        .filter(|m| {
            let ids: HashSet<String> = extract_team_ids(&m.teams).into_iter().collect();
            ids.iter().filter(|id| set.contains(id.as_str())).count() >= 2
        })
        .collect()
}

/// `team_id → name` from every match that carries both; later matches win.
pub fn team_names_by_id<'a>(matches: impl IntoIterator<Item = &'a MatchRecord>) -> HashMap<String, String> {
    let mut names = HashMap::new();
    for m in matches {
        for t in extract_teams_basic(&m.teams) {
            if let (Some(id), Some(name)) = (t.team_id, t.name) {
                names.insert(id, name);
            }
        }
    }
    names
}

pub fn team_rows(teams: &[TeamDetail]) -> Vec<TeamRow> {
    teams
        .iter()
        .map(|t| TeamRow {
            team_id: t.team_id.clone(),
            team_name: t.name.clone().unwrap_or_default(),
            created_at: t.creation_date.clone().unwrap_or_default(),
        })
        .collect()
}

/// Roster rows for every fetched team.
pub fn player_rows(teams: &[TeamDetail]) -> Vec<PlayerRow> {
    teams
        .iter()
        .flat_map(|t| {
            t.members.iter().map(move |m| PlayerRow {
                team_id: t.team_id.clone(),
                team_name: t.name.clone().unwrap_or_default(),
                player_id: m.player_id.clone().unwrap_or_default(),
                nickname: m.nickname.clone().unwrap_or_default(),
                role: m.role.clone().unwrap_or_default(),
            })
        })
        .collect()
}

/// Match row; missing names are backfilled from `names`.
pub fn match_row(m: &MatchRecord, names: &HashMap<String, String>) -> MatchRow {
    let teams = extract_teams_basic(&m.teams);
    let team = |i: usize| teams.get(i).cloned().unwrap_or_default();
    let (t1, t2) = (team(0), team(1));

    MatchRow {
        match_id: m.match_id.clone(),
        scheduled_at: m.scheduled_at.clone().unwrap_or_default(),
        finished_at: m.finished_at.clone().unwrap_or_default(),
        map: m.map_picks().into_iter().next().unwrap_or_default(),
        team1_id: t1.id_or_empty(),
        team1_name: t1.name_or(names),
        team2_id: t2.id_or_empty(),
        team2_name: t2.name_or(names),
        result_winner: m.winner().unwrap_or_default().to_string(),
    }
}

/// Result row for a finished match with the outcome for one team.
pub fn match_result_row(
    m: &MatchRecord,
    names: &HashMap<String, String>,
    outcome: &str,
) -> MatchResultRow {
    let row = match_row(m, names);
    MatchResultRow {
        match_id: row.match_id,
        scheduled_at: row.scheduled_at,
        finished_at: row.finished_at,
        team1_id: row.team1_id,
        team1_name: row.team1_name,
        team2_id: row.team2_id,
        team2_name: row.team2_name,
        result_winner: row.result_winner,
        my_team_result: outcome.to_string(),
    }
}

/// Flatten per-map player statistics of every match into stat lines.
///
/// Lines are emitted in match, round, team, player order. A stats team's id is
/// its `team_id`/`faction_id`, else the id of the match team with the same
/// name (case-insensitive).
pub fn player_stat_lines(
    matches: &[MatchWithStats],
    names: &HashMap<String, String>,
) -> Vec<PlayerStatLine> {
    let mut lines = Vec::new();

    for m in matches {
        let Some(stats) = &m.stats else { continue };

        let id_by_name: HashMap<String, String> = extract_teams_basic(&m.record.teams)
            .into_iter()
            .filter_map(|t| Some((t.name?.to_lowercase(), t.team_id?)))
            .collect();

        for round in &stats.rounds {
            let map = text_at(round, &["round_stats", "Map"]).unwrap_or_default();
            let teams = round
                .get("teams")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for team in teams {
                let team_name = text_at(team, &["team"])
                    .or_else(|| text_at(team, &["name"]))
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                let stat_team_id = text_at(team, &["team_id"])
                    .or_else(|| text_at(team, &["faction_id"]))
                    .filter(|s| !s.is_empty());
                let mapped_id = if team_name.is_empty() {
                    None
                } else {
                    id_by_name.get(&team_name.to_lowercase()).cloned()
                };
                let team_id = stat_team_id.or(mapped_id).unwrap_or_default();
                let final_name = if !team_name.is_empty() {
                    team_name
                } else {
                    names.get(&team_id).cloned().unwrap_or_default()
                };

                let players = team
                    .get("players")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();

                for p in players {
                    let stat = |keys: &[&str]| {
                        keys.iter()
                            .filter_map(|k| text_at(p, &["player_stats", k]))
                            .find(|v| !v.is_empty())
                            .unwrap_or_default()
                    };
                    lines.push(PlayerStatLine {
                        match_id: m.record.match_id.clone(),
                        map: map.clone(),
                        team_id: team_id.clone(),
                        team_name: final_name.clone(),
                        nickname: text_at(p, &["nickname"]).unwrap_or_default(),
                        kills: stat(&["Kills"]),
                        deaths: stat(&["Deaths"]),
                        assists: stat(&["Assists"]),
                        kd: stat(&["K/D Ratio", "KDRatio"]),
                        kr: stat(&["K/R Ratio", "KRRatio"]),
                        hs_pct: stat(&["Headshots %", "Headshots"]),
                        mvps: stat(&["MVPs"]),
                    });
                }
            }
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchStats;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(v: Value) -> MatchRecord {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_standings_rows_field_fallbacks() {
        let raw = vec![
            json!({"position": 1, "team": {"team_id": "A", "name": "Alpha"}, "points": 9, "wins": 3, "losses": 0}),
            json!({"rank": "2", "entity_id": "B", "entity_name": "Bravo", "score": 6.5}),
        ];
        let rows = standings_rows(&raw);

        assert_eq!(
            rows[0],
            StandingsRow {
                position: Some(1),
                team_id: "A".to_string(),
                team_name: "Alpha".to_string(),
                points: Some(9.0),
                wins: Some(3),
                losses: Some(0),
            }
        );
        assert_eq!(rows[1].position, Some(2));
        assert_eq!(rows[1].team_id, "B");
        assert_eq!(rows[1].team_name, "Bravo");
        assert_eq!(rows[1].points, Some(6.5));
        assert_eq!(rows[1].wins, None);
    }

    #[test]
    fn test_standings_out_of_range_counts_are_dropped() {
        let raw = vec![json!({"position": 4294967296u64, "entity_id": "A", "wins": 5})];
        let rows = standings_rows(&raw);

        assert_eq!(rows[0].position, None);
        assert_eq!(rows[0].wins, Some(5));
    }

    #[test]
    fn test_standings_team_ids_distinct_in_order() {
        let raw = vec![
            json!({"team": {"team_id": "B"}}),
            json!({"entity_id": "A"}),
            json!({"team": {"team_id": "B"}}),
            json!({"points": 1}),
        ];
        assert_eq!(standings_team_ids(&raw), vec!["B", "A"]);
    }

    #[test]
    fn test_division_matches_needs_two_known_teams() {
        let matches = vec![
            record(json!({"match_id": "M1", "teams": [{"team_id": "A"}, {"team_id": "B"}]})),
            record(json!({"match_id": "M2", "teams": [{"team_id": "A"}, {"team_id": "X"}]})),
            record(json!({"match_id": "M3", "teams": {"faction1": {"faction_id": "B"}, "faction2": {"faction_id": "C"}}})),
        ];
        let ids = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let kept: Vec<String> = division_matches(matches, &ids)
            .into_iter()
            .map(|m| m.match_id)
            .collect();
        assert_eq!(kept, vec!["M1", "M3"]);
    }

    #[test]
    fn test_match_team_ids_inferred() {
        let matches = vec![
            record(json!({"teams": [{"team_id": "A"}, {"team_id": "B"}]})),
            record(json!({"teams": [{"team_id": "B"}, {"team_id": "C"}]})),
        ];
        assert_eq!(match_team_ids(&matches), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_match_row_backfills_names() {
        let m = record(json!({
            "match_id": "M1",
            "scheduled_at": 100,
            "teams": [{"team_id": "A"}, {"team_id": "B", "name": "Bravo"}],
            "results": {"winner": "faction2"},
            "voting": {"map": {"pick": ["de_ancient"]}}
        }));
        let names: HashMap<String, String> =
            [("A".to_string(), "Alpha".to_string())].into_iter().collect();
        let row = match_row(&m, &names);

        assert_eq!(row.team1_name, "Alpha");
        assert_eq!(row.team2_name, "Bravo");
        assert_eq!(row.map, "de_ancient");
        assert_eq!(row.scheduled_at, "100");
        assert_eq!(row.result_winner, "faction2");
    }

    #[test]
    fn test_player_rows_from_rosters() {
        let teams: Vec<TeamDetail> = serde_json::from_value(json!([
            {"team_id": "A", "name": "Alpha", "members": [
                {"player_id": "P1", "nickname": "ace", "role": "captain"},
                {"player_id": "P2", "nickname": "bee"}
            ]}
        ]))
        .unwrap();
        let rows = player_rows(&teams);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].role, "captain");
        assert_eq!(rows[1].team_name, "Alpha");
        assert_eq!(rows[1].role, "");
    }

    #[test]
    fn test_player_stat_lines() {
        let m = MatchWithStats {
            record: record(json!({
                "match_id": "M1",
                "teams": {"faction1": {"faction_id": "A", "name": "Alpha"}, "faction2": {"faction_id": "B"}}
            })),
            stats: Some(MatchStats {
                rounds: vec![json!({
                    "round_stats": {"Map": "de_mirage"},
                    "teams": [
                        {"team": "alpha", "players": [
                            {"nickname": "ace", "player_stats": {"Kills": "20", "Deaths": "10", "K/R Ratio": "0.9", "Headshots %": "50"}}
                        ]},
                        {"team_id": "B", "players": [
                            {"nickname": "bee", "player_stats": {"Kills": "10"}}
                        ]}
                    ]
                })],
            }),
        };
        let names: HashMap<String, String> =
            [("B".to_string(), "Bravo".to_string())].into_iter().collect();
        let lines = player_stat_lines(&[m], &names);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].team_id, "A");
        assert_eq!(lines[0].team_name, "alpha");
        assert_eq!(lines[0].map, "de_mirage");
        assert_eq!(lines[0].kr, "0.9");
        assert_eq!(lines[0].hs_pct, "50");
        assert_eq!(lines[1].team_id, "B");
        assert_eq!(lines[1].team_name, "Bravo");
        assert_eq!(lines[1].deaths, "");
    }

    #[test]
    fn test_matches_without_stats_yield_no_lines() {
        let m = MatchWithStats {
            record: record(json!({"match_id": "M1"})),
            stats: None,
        };
        assert!(player_stat_lines(&[m], &HashMap::new()).is_empty());
    }
}
