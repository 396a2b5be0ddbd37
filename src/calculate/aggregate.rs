//! Folds over flattened player stat lines.
//!
//! Every aggregate is a single pass over the lines in input order. Output rows
//! come out in first-seen key order, and where a name is taken from the lines
//! the first non-empty one wins.

use std::collections::{HashMap, HashSet};

use super::outcome::{classify, MatchOutcome, WinnerMarkers};
use super::{calculate_kd, parse_count, parse_stat, round2};
use crate::faceit::shape::extract_teams_basic;
use crate::models::{
    MatchRecord, OpponentAggregate, PlayerAggregate, PlayerRow, PlayerStatLine, TeamMapAggregate,
    TeamOverall,
};

/// Running mean over values that parsed.
#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    sum: f64,
    n: u32,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.n += 1;
        }
    }

    fn value(&self) -> f64 {
        if self.n > 0 {
            round2(self.sum / self.n as f64)
        } else {
            0.0
        }
    }
}

/// Sums and ratio inputs accumulated from stat lines.
#[derive(Debug, Clone, Default)]
pub struct StatAccumulator {
    pub maps: u32,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub mvps: u32,
    kr: Mean,
    hs: Mean,
}

impl StatAccumulator {
    pub fn add(&mut self, line: &PlayerStatLine) {
        self.maps = self.maps.saturating_add(1);
        self.kills = self.kills.saturating_add(parse_count(&line.kills));
        self.deaths = self.deaths.saturating_add(parse_count(&line.deaths));
        self.assists = self.assists.saturating_add(parse_count(&line.assists));
        self.mvps = self.mvps.saturating_add(parse_count(&line.mvps));
        self.kr.push(parse_stat(&line.kr));
        self.hs.push(parse_stat(&line.hs_pct));
    }

    pub fn kd(&self) -> f64 {
        calculate_kd(self.kills, self.deaths)
    }

    pub fn kr_avg(&self) -> f64 {
        self.kr.value()
    }

    pub fn hs_pct_avg(&self) -> f64 {
        self.hs.value()
    }
}

/// Insertion-ordered map used by the folds.
struct OrderedFold<V> {
    entries: Vec<V>,
    index: HashMap<String, usize>,
}

impl<V> OrderedFold<V> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn entry(&mut self, key: String, init: impl FnOnce() -> V) -> &mut V {
        let idx = match self.index.get(&key).copied() {
            Some(idx) => idx,
            None => {
                self.entries.push(init());
                self.index.insert(key, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx]
    }

    fn into_values(self) -> Vec<V> {
        self.entries
    }
}

struct PlayerFold {
    row: PlayerAggregate,
    stats: StatAccumulator,
}

impl PlayerFold {
    fn finish(self) -> PlayerAggregate {
        PlayerAggregate {
            maps_played: self.stats.maps,
            kills: self.stats.kills,
            deaths: self.stats.deaths,
            assists: self.stats.assists,
            kd: self.stats.kd(),
            kr_avg: self.stats.kr_avg(),
            hs_pct_avg: self.stats.hs_pct_avg(),
            mvps: self.stats.mvps,
            ..self.row
        }
    }
}

fn fill_if_empty(slot: &mut String, value: &str) {
    if slot.is_empty() && !value.is_empty() {
        *slot = value.to_string();
    }
}

/// Per-player totals keyed by `team_id::nickname`.
///
/// `player_id` is filled from the roster entry with the same team and nickname;
/// a team name missing from every line is taken from `names`.
pub fn aggregate_players(
    lines: &[PlayerStatLine],
    roster: &[PlayerRow],
    names: &HashMap<String, String>,
) -> Vec<PlayerAggregate> {
    let ids: HashMap<(&str, &str), &str> = roster
        .iter()
        .map(|p| ((p.team_id.as_str(), p.nickname.as_str()), p.player_id.as_str()))
        .collect();

    let mut fold = OrderedFold::new();
    for line in lines {
        let key = format!("{}::{}", line.team_id, line.nickname);
        let entry = fold.entry(key, || PlayerFold {
            row: PlayerAggregate {
                team_id: line.team_id.clone(),
                team_name: line.team_name.clone(),
                player_id: ids
                    .get(&(line.team_id.as_str(), line.nickname.as_str()))
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                nickname: line.nickname.clone(),
                ..Default::default()
            },
            stats: StatAccumulator::default(),
        });
        entry.stats.add(line);
        fill_if_empty(&mut entry.row.team_name, &line.team_name);
    }

    fold.into_values()
        .into_iter()
        .map(|mut p| {
            if let Some(name) = names.get(&p.row.team_id) {
                fill_if_empty(&mut p.row.team_name, name);
            }
            p.finish()
        })
        .collect()
}

/// Per-player totals for one team keyed by nickname alone.
///
/// Lines are expected to be pre-filtered with [`team_lines`], so a player who
/// appears under another team id (a stand-in, say) is still merged.
pub fn aggregate_team_players(
    lines: &[PlayerStatLine],
    team_id: &str,
    fallback_name: &str,
    roster: &[PlayerRow],
) -> Vec<PlayerAggregate> {
    let ids: HashMap<&str, &str> = roster
        .iter()
        .filter(|p| p.team_id == team_id)
        .map(|p| (p.nickname.as_str(), p.player_id.as_str()))
        .collect();

    let mut fold = OrderedFold::new();
    for line in lines {
        let entry = fold.entry(line.nickname.clone(), || PlayerFold {
            row: PlayerAggregate {
                team_id: team_id.to_string(),
                team_name: line.team_name.clone(),
                player_id: ids
                    .get(line.nickname.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                nickname: line.nickname.clone(),
                ..Default::default()
            },
            stats: StatAccumulator::default(),
        });
        entry.stats.add(line);
        fill_if_empty(&mut entry.row.team_name, &line.team_name);
    }

    fold.into_values()
        .into_iter()
        .map(|mut p| {
            fill_if_empty(&mut p.row.team_name, fallback_name);
            p.finish()
        })
        .collect()
}

/// Per-map totals keyed by `match_id::map`.
pub fn aggregate_maps(lines: &[PlayerStatLine], fallback_name: &str) -> Vec<TeamMapAggregate> {
    let mut fold = OrderedFold::new();
    for line in lines {
        let key = format!("{}::{}", line.match_id, line.map);
        let (row, stats) = fold.entry(key, || {
            (
                TeamMapAggregate {
                    match_id: line.match_id.clone(),
                    map: line.map.clone(),
                    team_name: line.team_name.clone(),
                    ..Default::default()
                },
                StatAccumulator::default(),
            )
        });
        stats.add(line);
        fill_if_empty(&mut row.team_name, &line.team_name);
    }

    fold.into_values()
        .into_iter()
        .map(|(mut row, stats)| {
            fill_if_empty(&mut row.team_name, fallback_name);
            TeamMapAggregate {
                kills: stats.kills,
                deaths: stats.deaths,
                assists: stats.assists,
                kd: stats.kd(),
                kr_avg: stats.kr_avg(),
                mvps: stats.mvps,
                ..row
            }
        })
        .collect()
}

/// Head-to-head record per opponent of `team_id`.
///
/// The opponent key is its id, else its name, else `"unknown"`. Every match
/// counts as played; wins, losses and draws come from [`classify`].
pub fn aggregate_opponents<'a, I>(
    matches: I,
    team_id: &str,
    markers: &WinnerMarkers,
) -> Vec<OpponentAggregate>
where
    I: IntoIterator<Item = &'a MatchRecord>,
{
    let mut fold = OrderedFold::new();
    for m in matches {
        let opponent = extract_teams_basic(&m.teams)
            .into_iter()
            .find(|t| t.team_id.as_deref() != Some(team_id))
            .unwrap_or_default();
        let opponent_id = opponent.id_or_empty();
        let opponent_name = opponent.name.unwrap_or_default();
        let key = [opponent_id.as_str(), opponent_name.as_str()]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or("unknown")
            .to_string();

        let entry = fold.entry(key, || OpponentAggregate {
            opponent_id: opponent_id.clone(),
            opponent_name: opponent_name.clone(),
            ..Default::default()
        });
        entry.played += 1;
        match classify(m, team_id, markers) {
            MatchOutcome::Win => entry.wins += 1,
            MatchOutcome::Loss => entry.losses += 1,
            MatchOutcome::Draw => entry.draws += 1,
            MatchOutcome::Unknown => {}
        }
    }
    fold.into_values()
}

/// Whole-export totals for one team.
pub struct OverallInput<'a> {
    pub team_id: &'a str,
    pub fallback_name: &'a str,
    pub matches_total: usize,
    pub finished: &'a [&'a MatchRecord],
    pub map_rows: &'a [TeamMapAggregate],
    pub lines: &'a [PlayerStatLine],
    pub markers: &'a WinnerMarkers,
}

/// Map-level sums, results over finished matches, kd from the summed kills and
/// deaths, and kr averaged over the team's stat lines.
pub fn team_overall(input: OverallInput<'_>) -> TeamOverall {
    let mut row = TeamOverall {
        team_id: input.team_id.to_string(),
        matches_total: u32::try_from(input.matches_total).unwrap_or(u32::MAX),
        matches_finished: u32::try_from(input.finished.len()).unwrap_or(u32::MAX),
        ..Default::default()
    };

    for map in input.map_rows {
        row.maps_played = row.maps_played.saturating_add(1);
        row.kills = row.kills.saturating_add(map.kills);
        row.deaths = row.deaths.saturating_add(map.deaths);
        row.assists = row.assists.saturating_add(map.assists);
        row.mvps = row.mvps.saturating_add(map.mvps);
        fill_if_empty(&mut row.team_name, &map.team_name);
    }
    fill_if_empty(&mut row.team_name, input.fallback_name);

    for m in input.finished {
        match classify(m, input.team_id, input.markers) {
            MatchOutcome::Win => row.wins += 1,
            MatchOutcome::Loss => row.losses += 1,
            MatchOutcome::Draw => row.draws += 1,
            MatchOutcome::Unknown => {}
        }
    }

    let mut kr = Mean::default();
    for line in input.lines {
        kr.push(parse_stat(&line.kr));
    }
    row.kd = calculate_kd(row.kills, row.deaths);
    row.kr_avg = kr.value();
    row
}

/// The team's roster, or one row per distinct nickname seen under its id in
/// the stat lines when no roster was fetched.
pub fn roster_or_seen(
    players: &[PlayerRow],
    lines: &[PlayerStatLine],
    team_id: &str,
    known_name: Option<&str>,
) -> Vec<PlayerRow> {
    let roster: Vec<PlayerRow> = players
        .iter()
        .filter(|p| p.team_id == team_id)
        .cloned()
        .collect();
    if !roster.is_empty() {
        return roster;
    }

    let team_lines: Vec<&PlayerStatLine> =
        lines.iter().filter(|l| l.team_id == team_id).collect();
    let team_name = known_name
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            team_lines
                .iter()
                .find(|l| !l.team_name.is_empty())
                .map(|l| l.team_name.clone())
        })
        .unwrap_or_default();

    let mut seen = HashSet::new();
    team_lines
        .into_iter()
        .filter(|l| seen.insert(l.nickname.clone()))
        .map(|l| PlayerRow {
            team_id: team_id.to_string(),
            team_name: team_name.clone(),
            player_id: String::new(),
            nickname: l.nickname.clone(),
            role: String::new(),
        })
        .collect()
}

/// Lines played under `team_id` or by a nickname on the roster.
pub fn team_lines(
    lines: &[PlayerStatLine],
    team_id: &str,
    roster: &[PlayerRow],
) -> Vec<PlayerStatLine> {
    let nicknames: HashSet<&str> = roster.iter().map(|p| p.nickname.as_str()).collect();
    lines
        .iter()
        .filter(|l| l.team_id == team_id || nicknames.contains(l.nickname.as_str()))
        .cloned()
        .collect()
}
