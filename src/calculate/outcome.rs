//! Match outcome classification.

use std::fmt;

use crate::faceit::shape::{extract_team_ids, extract_teams_basic};
use crate::models::MatchRecord;

/// Result of a match from one team's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchOutcome {
    Win,
    Loss,
    Draw,
    Unknown,
}

impl MatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOutcome::Win => "win",
            MatchOutcome::Loss => "loss",
            MatchOutcome::Draw => "draw",
            MatchOutcome::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Positional winner markers naming the first and second competitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinnerMarkers {
    pub first: String,
    pub second: String,
}

impl Default for WinnerMarkers {
    fn default() -> Self {
        Self {
            first: "faction1".to_string(),
            second: "faction2".to_string(),
        }
    }
}

/// A match is finished once it has a finish time or a terminal status.
pub fn is_finished(m: &MatchRecord) -> bool {
    let has_finish_time = m
        .finished_at
        .as_deref()
        .map(|s| !s.trim().is_empty() && s != "0")
        .unwrap_or(false);
    let terminal_status = m
        .status
        .as_deref()
        .map(|s| s.eq_ignore_ascii_case("finished") || s.eq_ignore_ascii_case("closed"))
        .unwrap_or(false);
    has_finish_time || terminal_status
}

/// True when `team_id` is one of the match's competitors.
pub fn involves_team(m: &MatchRecord, team_id: &str) -> bool {
    extract_team_ids(&m.teams).iter().any(|id| id == team_id)
}

/// One team's matches split into upcoming and finished, in input order.
#[derive(Debug, Default)]
pub struct TeamMatches<'a> {
    pub upcoming: Vec<&'a MatchRecord>,
    pub finished: Vec<&'a MatchRecord>,
}

impl TeamMatches<'_> {
    pub fn total(&self) -> usize {
        self.upcoming.len() + self.finished.len()
    }
}

pub fn split_team_matches<'a, I>(matches: I, team_id: &str) -> TeamMatches<'a>
where
    I: IntoIterator<Item = &'a MatchRecord>,
{
    let mut split = TeamMatches::default();
    for m in matches.into_iter().filter(|m| involves_team(m, team_id)) {
        if is_finished(m) {
            split.finished.push(m);
        } else {
            split.upcoming.push(m);
        }
    }
    split
}

/// Classify a match for `team_id`.
///
/// The declared winner is authoritative: a positional marker is first mapped to
/// the competitor at that position, and a winner naming one of the competitors
/// decides the outcome even when scores disagree. Only when no competitor can
/// be resolved from it are the per-team scores compared.
pub fn classify(m: &MatchRecord, team_id: &str, markers: &WinnerMarkers) -> MatchOutcome {
    let ids = extract_team_ids(&m.teams);
    let teams = extract_teams_basic(&m.teams);
    let positional = |idx: usize| teams.get(idx).and_then(|t| t.team_id.clone());

    let winner_id = m.winner().and_then(|w| {
        if w == markers.first {
            positional(0)
        } else if w == markers.second {
            positional(1)
        } else {
            Some(w.to_string())
        }
    });

    if let Some(winner_id) = winner_id.filter(|w| ids.contains(w)) {
        return if winner_id == team_id {
            MatchOutcome::Win
        } else {
            MatchOutcome::Loss
        };
    }

    let (Some(first), Some(second)) = (positional(0), positional(1)) else {
        return MatchOutcome::Unknown;
    };
    let (Some(s1), Some(s2)) = (m.score_for(&first), m.score_for(&second)) else {
        return MatchOutcome::Unknown;
    };
    let (mine, theirs) = if first == team_id {
        (s1, s2)
    } else if second == team_id {
        (s2, s1)
    } else {
        return MatchOutcome::Unknown;
    };

    if mine > theirs {
        MatchOutcome::Win
    } else if mine < theirs {
        MatchOutcome::Loss
    } else {
        MatchOutcome::Draw
    }
}
