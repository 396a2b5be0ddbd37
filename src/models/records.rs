//! Flat output records handed to the record sink.
//!
//! Field order is column order.

use serde::Serialize;

/// One row of a division leaderboard; API order is rank order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StandingsRow {
    pub position: Option<u32>,
    pub team_id: String,
    pub team_name: String,
    pub points: Option<f64>,
    pub wins: Option<u32>,
    pub losses: Option<u32>,
}

/// A team with details fetched from `/teams/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamRow {
    pub team_id: String,
    pub team_name: String,
    pub created_at: String,
}

/// A roster entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerRow {
    pub team_id: String,
    pub team_name: String,
    pub player_id: String,
    pub nickname: String,
    pub role: String,
}

/// A match with both competitors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchRow {
    pub match_id: String,
    pub scheduled_at: String,
    pub finished_at: String,
    pub map: String,
    pub team1_id: String,
    pub team1_name: String,
    pub team2_id: String,
    pub team2_name: String,
    pub result_winner: String,
}

/// A finished match seen from one team.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchResultRow {
    pub match_id: String,
    pub scheduled_at: String,
    pub finished_at: String,
    pub team1_id: String,
    pub team1_name: String,
    pub team2_id: String,
    pub team2_name: String,
    pub result_winner: String,
    pub my_team_result: String,
}

/// One player's statistics on one map of one match.
///
/// Stat values are kept as the API reported them; parsing happens during
/// aggregation so a malformed value only drops out of the ratio it feeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerStatLine {
    pub match_id: String,
    pub map: String,
    pub team_id: String,
    pub team_name: String,
    pub nickname: String,
    pub kills: String,
    pub deaths: String,
    pub assists: String,
    pub kd: String,
    pub kr: String,
    pub hs_pct: String,
    pub mvps: String,
}

/// Player totals over every map they appear on.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerAggregate {
    pub team_id: String,
    pub team_name: String,
    pub player_id: String,
    pub nickname: String,
    pub maps_played: u32,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub kd: f64,
    pub kr_avg: f64,
    pub hs_pct_avg: f64,
    pub mvps: u32,
}

/// One team's totals on one map of one match.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamMapAggregate {
    pub match_id: String,
    pub map: String,
    pub team_name: String,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub kd: f64,
    pub kr_avg: f64,
    pub mvps: u32,
}

/// Head-to-head record against one opponent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OpponentAggregate {
    pub opponent_id: String,
    pub opponent_name: String,
    pub played: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

/// One team's totals across the whole export.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamOverall {
    pub team_id: String,
    pub team_name: String,
    pub matches_total: u32,
    pub matches_finished: u32,
    pub maps_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub kd: f64,
    pub kr_avg: f64,
    pub mvps: u32,
}

/// Map veto for one match.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VetoRow {
    pub match_id: String,
    pub team1_name: String,
    pub team2_name: String,
    pub team1_bans: String,
    pub team2_bans: String,
    pub team1_pick: String,
    pub team2_pick: String,
    pub leftover_map: String,
    pub picks: String,
    pub bans: String,
    pub map_voting_json: String,
}
