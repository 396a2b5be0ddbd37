//! Export pipeline.
//!
//! Runs one export end to end:
//! 1. Resolve organizer, championship and leaderboard
//! 2. Fetch standings, matches, team details and match statistics
//! 3. Flatten and aggregate
//! 4. Hand every table to the record sink
//!
//! Resolution failures abort the run. A team or match whose details cannot be
//! fetched is logged and left out; the export continues with what it has.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::calculate::{
    aggregate_maps, aggregate_opponents, aggregate_players, aggregate_team_players, classify,
    involves_team, roster_or_seen, split_team_matches, team_lines, team_overall, veto_row,
    OverallInput,
};
use crate::config::{ExportConfig, IdOrName};
use crate::faceit::flatten::{
    division_matches, match_result_row, match_row, match_team_ids, player_rows,
    player_stat_lines, standings_rows, standings_team_ids, team_names_by_id, team_rows,
};
use crate::faceit::paginate::collect_all;
use crate::faceit::resolve::{
    championship_id_by_name, organizer_id_by_name, select_leaderboard, ResolveError,
    LEADERBOARD_PAGE_SIZE,
};
use crate::faceit::FaceitClient;
use crate::fetch::{FetchError, JsonSource};
use crate::models::{
    LeaderboardDescriptor, MatchRecord, MatchWithStats, Page, PlayerRow, PlayerStatLine,
    TeamDetail,
};
use crate::storage::{RecordSink, StorageError};

/// Page size for championship matches.
pub const MATCH_PAGE_SIZE: u32 = 100;
/// Page size for standings addressed by leaderboard id.
pub const STANDINGS_BY_ID_PAGE_SIZE: u32 = 20;
/// Page size for standings addressed by group.
pub const STANDINGS_BY_GROUP_PAGE_SIZE: u32 = 100;

/// Errors that abort an export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// What an export produced.
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    pub championship_id: String,
    pub championship_name: String,
    pub leaderboard: LeaderboardDescriptor,
    pub standings: usize,
    pub teams: usize,
    pub teams_skipped: usize,
    pub matches: usize,
    pub stats_missing: usize,
    pub stat_lines: usize,
    /// `(table, rows)` in write order
    pub tables: Vec<(String, usize)>,
}

/// Everything fetched and flattened for one division.
#[derive(Debug, Default)]
pub struct DivisionData {
    pub standings: Vec<Value>,
    pub teams: Vec<TeamDetail>,
    pub players: Vec<PlayerRow>,
    pub matches: Vec<MatchWithStats>,
    pub names: HashMap<String, String>,
    pub lines: Vec<PlayerStatLine>,
}

impl DivisionData {
    fn records(&self) -> impl Iterator<Item = &MatchRecord> {
        self.matches.iter().map(|m| &m.record)
    }
}

async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Championship id, resolving the organizer and championship names where needed.
pub async fn resolve_championship_id<S: JsonSource>(
    client: &FaceitClient<S>,
    organizer: Option<&IdOrName>,
    championship: &IdOrName,
    game_id: &str,
) -> Result<String, ResolveError> {
    let name = match championship {
        IdOrName::Id(id) => return Ok(id.clone()),
        IdOrName::Name(name) => name,
    };

    let organizer_id = match organizer {
        Some(IdOrName::Id(id)) => id.clone(),
        Some(IdOrName::Name(org_name)) => organizer_id_by_name(client, org_name).await?,
        None => {
            return Err(ResolveError::NotFound {
                what: "Organizer",
                name: "(none given)".to_string(),
                within: None,
            })
        }
    };
    info!("Organizer: {}", organizer_id);

    championship_id_by_name(client, &organizer_id, name, game_id).await
}

/// Championship id from an export configuration.
pub async fn resolve_championship<S: JsonSource>(
    client: &FaceitClient<S>,
    config: &ExportConfig,
) -> Result<String, ResolveError> {
    resolve_championship_id(
        client,
        Some(&config.organizer),
        &config.championship,
        &config.game_id,
    )
    .await
}

/// Every leaderboard listed under a championship.
///
/// Some deployments reject `offset > 0` on this endpoint, so an HTTP error on
/// a continuation page ends the listing instead of failing it.
pub async fn list_leaderboards<S: JsonSource>(
    client: &FaceitClient<S>,
    championship_id: &str,
) -> Result<Vec<LeaderboardDescriptor>, FetchError> {
    collect_all(LEADERBOARD_PAGE_SIZE, move |offset, limit| async move {
        match client.leaderboards_page(championship_id, offset, limit).await {
            Err(e) if offset > 0 && e.status().is_some() => {
                warn!(
                    "Leaderboard listing stopped at offset {}: {}",
                    offset, e
                );
                Ok(Page::default())
            }
            other => other,
        }
    })
    .await
}

/// Raw standings for a leaderboard, by id when known, else by group.
pub async fn fetch_standings<S: JsonSource>(
    client: &FaceitClient<S>,
    championship_id: &str,
    leaderboard: &LeaderboardDescriptor,
) -> Result<Vec<Value>, FetchError> {
    if let Some(id) = leaderboard.leaderboard_id.as_deref() {
        return collect_all(STANDINGS_BY_ID_PAGE_SIZE, move |offset, limit| {
            client.leaderboard_standings_page(id, offset, limit)
        })
        .await;
    }

    if let Some(group) = leaderboard.group {
        return collect_all(STANDINGS_BY_GROUP_PAGE_SIZE, move |offset, limit| {
            client.group_standings_page(championship_id, group, offset, limit)
        })
        .await;
    }

    warn!("No leaderboard id or group available for standings");
    Ok(Vec::new())
}

/// Team details for every id, paced. Failed lookups are skipped.
pub async fn fetch_teams<S: JsonSource>(
    client: &FaceitClient<S>,
    team_ids: &[String],
    delay_ms: u64,
) -> Vec<TeamDetail> {
    let mut teams = Vec::with_capacity(team_ids.len());
    for id in team_ids {
        match client.team(id).await {
            Ok(team) => teams.push(team),
            Err(e) => warn!("Skipping team {}: {}", id, e),
        }
        pause(delay_ms).await;
    }
    teams
}

/// Statistics for every match, paced. A failed lookup leaves `stats` empty.
pub async fn fetch_match_stats<S: JsonSource>(
    client: &FaceitClient<S>,
    matches: Vec<MatchRecord>,
    delay_ms: u64,
) -> Vec<MatchWithStats> {
    let mut out = Vec::with_capacity(matches.len());
    for record in matches {
        let stats = match client.match_stats(&record.match_id).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("No statistics for match {}: {}", record.match_id, e);
                None
            }
        };
        out.push(MatchWithStats { record, stats });
        pause(delay_ms).await;
    }
    out
}

/// Resolve, fetch and flatten one division.
pub async fn collect_division<S: JsonSource>(
    client: &FaceitClient<S>,
    config: &ExportConfig,
    summary: &mut ExportSummary,
) -> Result<DivisionData, ExportError> {
    let championship_id = resolve_championship(client, config).await?;
    let championship = client.championship(&championship_id).await?;
    summary.championship_name = championship.name.unwrap_or_default();
    info!(
        "Championship: {} ({})",
        summary.championship_name, championship_id
    );

    let leaderboards = list_leaderboards(client, &championship_id).await?;
    if config.debug {
        for lb in &leaderboards {
            info!(
                "Leaderboard {:?}: group {:?}, id {:?}",
                lb.display_name(),
                lb.group,
                lb.leaderboard_id
            );
        }
    }
    let leaderboard =
        select_leaderboard(client, &championship_id, &leaderboards, &config.leaderboard).await?;
    info!(
        "Leaderboard: {} (group {:?}, id {:?})",
        leaderboard.display_name(),
        leaderboard.group,
        leaderboard.leaderboard_id
    );

    let standings = if config.skip_standings {
        info!("Skipping standings");
        Vec::new()
    } else {
        match fetch_standings(client, &championship_id, &leaderboard).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Fetching standings failed, continuing without standings: {}", e);
                Vec::new()
            }
        }
    };

    let champ = championship_id.as_str();
    let all_matches = collect_all(MATCH_PAGE_SIZE, move |offset, limit| {
        client.matches_page(champ, offset, limit)
    })
    .await?;

    let mut team_ids = standings_team_ids(&standings);
    if team_ids.is_empty() {
        team_ids = match_team_ids(&all_matches);
        info!("Inferred {} team ids from matches", team_ids.len());
    }

    let total_matches = all_matches.len();
    let matches = division_matches(all_matches, &team_ids);
    info!(
        "{} of {} matches are within the division",
        matches.len(),
        total_matches
    );

    let teams = fetch_teams(client, &team_ids, config.team_delay_ms).await;
    let matches = fetch_match_stats(client, matches, config.match_delay_ms).await;

    let names = team_names_by_id(matches.iter().map(|m| &m.record));
    let lines = player_stat_lines(&matches, &names);
    let players = player_rows(&teams);

    summary.championship_id = championship_id;
    summary.leaderboard = leaderboard;
    summary.standings = standings.len();
    summary.teams = teams.len();
    summary.teams_skipped = team_ids.len() - teams.len();
    summary.matches = matches.len();
    summary.stats_missing = matches.iter().filter(|m| m.stats.is_none()).count();
    summary.stat_lines = lines.len();

    Ok(DivisionData {
        standings,
        teams,
        players,
        matches,
        names,
        lines,
    })
}

fn write_table<K: RecordSink, T: Serialize>(
    sink: &mut K,
    summary: &mut ExportSummary,
    table: &str,
    rows: &[T],
) -> Result<(), StorageError> {
    let count = sink.write_records(table, rows)?;
    debug!("Table {} written", table);
    summary.tables.push((table.to_string(), count));
    Ok(())
}

/// Division-wide tables.
pub fn write_division_tables<K: RecordSink>(
    sink: &mut K,
    data: &DivisionData,
    summary: &mut ExportSummary,
) -> Result<(), StorageError> {
    let match_rows: Vec<_> = data.records().map(|m| match_row(m, &data.names)).collect();

    write_table(sink, summary, "standings", &standings_rows(&data.standings))?;
    write_table(sink, summary, "teams", &team_rows(&data.teams))?;
    write_table(sink, summary, "players", &data.players)?;
    write_table(sink, summary, "matches", &match_rows)?;
    write_table(sink, summary, "match_players", &data.lines)?;
    write_table(
        sink,
        summary,
        "team_players_agg",
        &aggregate_players(&data.lines, &data.players, &data.names),
    )?;
    Ok(())
}

/// Tables seen from one team.
pub fn write_my_team_tables<K: RecordSink>(
    sink: &mut K,
    config: &ExportConfig,
    team_id: &str,
    data: &DivisionData,
    summary: &mut ExportSummary,
) -> Result<(), StorageError> {
    let markers = &config.winner_markers;
    let known_name = data.names.get(team_id).map(String::as_str);
    let fallback_name = known_name.unwrap_or("");

    let roster = roster_or_seen(&data.players, &data.lines, team_id, known_name);
    let split = split_team_matches(data.records(), team_id);
    let involved: Vec<&MatchRecord> = data
        .records()
        .filter(|m| involves_team(m, team_id))
        .collect();

    let upcoming: Vec<_> = split
        .upcoming
        .iter()
        .map(|m| match_row(m, &data.names))
        .collect();
    let results: Vec<_> = split
        .finished
        .iter()
        .map(|m| match_result_row(m, &data.names, classify(m, team_id, markers).as_str()))
        .collect();

    let lines = team_lines(&data.lines, team_id, &roster);
    let map_stats = aggregate_maps(&lines, fallback_name);
    let veto: Vec<_> = involved
        .iter()
        .map(|m| veto_row(m, &data.names, &config.map_pool))
        .collect();
    let overall = team_overall(OverallInput {
        team_id,
        fallback_name,
        matches_total: split.total(),
        finished: &split.finished,
        map_rows: &map_stats,
        lines: &lines,
        markers,
    });

    write_table(sink, summary, "my_team_players", &roster)?;
    write_table(sink, summary, "my_team_upcoming", &upcoming)?;
    write_table(sink, summary, "my_team_results", &results)?;
    write_table(sink, summary, "my_team_match_players", &lines)?;
    write_table(sink, summary, "my_team_map_stats", &map_stats)?;
    write_table(sink, summary, "my_team_veto", &veto)?;
    write_table(sink, summary, "my_team_stats_overall", &[overall])?;
    write_table(
        sink,
        summary,
        "my_team_players_agg",
        &aggregate_team_players(&lines, team_id, fallback_name, &data.players),
    )?;
    write_table(
        sink,
        summary,
        "my_team_vs_opponents",
        &aggregate_opponents(involved.iter().copied(), team_id, markers),
    )?;
    Ok(())
}

/// Run a full export into `sink`.
pub async fn run_export<S: JsonSource, K: RecordSink>(
    client: &FaceitClient<S>,
    config: &ExportConfig,
    sink: &mut K,
) -> Result<ExportSummary, ExportError> {
    let mut summary = ExportSummary::default();
    let data = collect_division(client, config, &mut summary).await?;

    write_division_tables(sink, &data, &mut summary)?;
    if let Some(team_id) = config.my_team_id.as_deref() {
        write_my_team_tables(sink, config, team_id, &data, &mut summary)?;
    }

    info!(
        "Export complete: {} standings, {} teams ({} skipped), {} matches ({} without stats), {} stat lines",
        summary.standings,
        summary.teams,
        summary.teams_skipped,
        summary.matches,
        summary.stats_missing,
        summary.stat_lines
    );
    Ok(summary)
}
