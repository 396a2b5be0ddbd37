//! Standings endpoint diagnostics.
//!
//! Probes the leaderboard listing and every plausible standings endpoint for
//! a championship and reports status, rate-limit headers and the start of the
//! body. Nothing is retried or decoded beyond picking the first listed
//! leaderboard.

use std::fmt;

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::config::{ConfigLayer, IdOrName};
use crate::export::resolve_championship_id;
use crate::faceit::resolve::ResolveError;
use crate::faceit::FaceitClient;
use crate::fetch::{FetchError, JsonSource, Probe, ProbeResponse};
use crate::models::{LeaderboardDescriptor, Page};

/// Characters of body shown per probe.
pub const BODY_SNIPPET_CHARS: usize = 600;

/// Errors that stop a diagnosis.
#[derive(Debug, Error)]
pub enum DiagnoseError {
    #[error("Missing championship: set champ-id, or org-id/org-name with champ-name")]
    MissingChampionship,

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
}

/// One probed endpoint.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub title: String,
    pub response: ProbeResponse,
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} ===", self.title)?;
        writeln!(f, "status: {}", self.response.status)?;
        writeln!(f, "url: {}", self.response.url)?;
        for (name, value) in &self.response.headers {
            writeln!(f, "{}: {}", name, value)?;
        }
        let snippet: String = self.response.body.chars().take(BODY_SNIPPET_CHARS).collect();
        write!(f, "{}", snippet)
    }
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, value: Option<T>) {
    if let Some(v) = value {
        if !list.contains(&v) {
            list.push(v);
        }
    }
}

/// Standings endpoints worth probing, each with and without paging parameters.
///
/// Groups tried: the configured one, the first listed, then 0 and 1. Ids
/// tried: the configured one, then the first listed.
pub fn standings_targets<S: JsonSource>(
    client: &FaceitClient<S>,
    championship_id: &str,
    configured_group: Option<u32>,
    configured_id: Option<&str>,
    first_listed: Option<&LeaderboardDescriptor>,
) -> Result<Vec<(String, Url)>, FetchError> {
    let paging = [("limit", "20".to_string()), ("offset", "0".to_string())];

    let mut groups = Vec::new();
    push_unique(&mut groups, configured_group);
    push_unique(&mut groups, first_listed.and_then(|lb| lb.group));
    push_unique(&mut groups, Some(0));
    push_unique(&mut groups, Some(1));

    let mut ids: Vec<String> = Vec::new();
    push_unique(&mut ids, configured_id.map(str::to_string));
    push_unique(
        &mut ids,
        first_listed.and_then(|lb| lb.leaderboard_id.clone()),
    );

    let mut targets = Vec::new();
    for group in groups {
        let path = format!(
            "/leaderboards/championships/{}/groups/{}",
            championship_id, group
        );
        targets.push((
            format!("groups/{} limit+offset", group),
            client.url(&path, &paging)?,
        ));
        targets.push((format!("groups/{} no params", group), client.url(&path, &[])?));
    }
    for id in ids {
        for path in [format!("/leaderboards/{}/standings", id), format!("/leaderboards/{}", id)] {
            let title = path.trim_start_matches('/').to_string();
            targets.push((format!("{} limit+offset", title), client.url(&path, &paging)?));
            targets.push((format!("{} no params", title), client.url(&path, &[])?));
        }
    }
    Ok(targets)
}

fn organizer_of(layer: &ConfigLayer) -> Option<IdOrName> {
    layer
        .org_id
        .clone()
        .map(IdOrName::Id)
        .or_else(|| layer.org_name.clone().map(IdOrName::Name))
}

/// Probe the leaderboard listing and the standings endpoints of the
/// configured championship.
pub async fn run_diagnose<S: JsonSource + Probe>(
    client: &FaceitClient<S>,
    layer: &ConfigLayer,
) -> Result<Vec<ProbeReport>, DiagnoseError> {
    let championship = match (&layer.champ_id, &layer.champ_name) {
        (Some(id), _) => IdOrName::Id(id.clone()),
        (None, Some(name)) => IdOrName::Name(name.clone()),
        (None, None) => return Err(DiagnoseError::MissingChampionship),
    };
    let organizer = organizer_of(layer);
    if matches!(championship, IdOrName::Name(_)) && organizer.is_none() {
        return Err(DiagnoseError::MissingChampionship);
    }

    let game_id = layer.game_id.as_deref().unwrap_or("cs2");
    let championship_id =
        resolve_championship_id(client, organizer.as_ref(), &championship, game_id).await?;
    info!("Diagnosing standings for championship {}", championship_id);

    let mut reports = Vec::new();

    let listing_url = client.url(
        &format!("/leaderboards/championships/{}", championship_id),
        &[("limit", "100".to_string()), ("offset", "0".to_string())],
    )?;
    let listing = client.source().probe(&listing_url).await?;
    let first_listed = serde_json::from_str::<Page<LeaderboardDescriptor>>(&listing.body)
        .ok()
        .and_then(|page| page.items.into_iter().next());
    reports.push(ProbeReport {
        title: format!("leaderboards/championships/{}", championship_id),
        response: listing,
    });

    let targets = standings_targets(
        client,
        &championship_id,
        layer.lb_group,
        layer.lb_id.as_deref(),
        first_listed.as_ref(),
    )?;
    for (title, url) in targets {
        let response = client.source().probe(&url).await?;
        reports.push(ProbeReport { title, response });
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{upstream, MockSource};
    use serde_json::json;

    fn client() -> FaceitClient<MockSource> {
        FaceitClient::new(
            MockSource::new(|url: &Url| match url.path() {
                "/v4/leaderboards/championships/CH1" => Ok(json!({"items": [
                    {"group": 2, "leaderboard_id": "LB2", "name": "Division 2"}
                ]})),
                "/v4/leaderboards/LB2" => Ok(json!({"items": []})),
                _ => Err(upstream(url, 404)),
            }),
            "https://api.test/v4",
        )
    }

    #[test]
    fn test_targets_dedupe_groups_and_ids() {
        let client = client();
        let first = LeaderboardDescriptor {
            group: Some(1),
            leaderboard_id: Some("LB1".to_string()),
            ..Default::default()
        };
        let targets =
            standings_targets(&client, "CH1", Some(1), Some("LB1"), Some(&first)).unwrap();

        // groups 1 and 0, one id
        assert_eq!(targets.len(), 8);
        assert_eq!(targets[0].0, "groups/1 limit+offset");
        assert_eq!(
            targets[0].1.as_str(),
            "https://api.test/v4/leaderboards/championships/CH1/groups/1?limit=20&offset=0"
        );
        assert_eq!(targets[2].0, "groups/0 limit+offset");
        assert_eq!(targets[4].0, "leaderboards/LB1/standings limit+offset");
        assert_eq!(targets[7].1.query(), None);
    }

    #[tokio::test]
    async fn test_run_diagnose_uses_first_listed() {
        let client = client();
        let layer = ConfigLayer {
            champ_id: Some("CH1".to_string()),
            ..Default::default()
        };

        let reports = run_diagnose(&client, &layer).await.unwrap();

        assert_eq!(reports[0].response.status, 200);
        assert!(reports[0].response.body.contains("LB2"));
        let titles: Vec<&str> = reports.iter().map(|r| r.title.as_str()).collect();
        assert!(titles.contains(&"groups/2 no params"));
        assert!(titles.contains(&"leaderboards/LB2 limit+offset"));

        let by_id = reports
            .iter()
            .find(|r| r.title == "leaderboards/LB2 no params")
            .unwrap();
        assert_eq!(by_id.response.status, 200);
        let missing = reports
            .iter()
            .find(|r| r.title == "groups/0 no params")
            .unwrap();
        assert_eq!(missing.response.status, 404);
    }

    #[tokio::test]
    async fn test_missing_championship() {
        let layer = ConfigLayer {
            champ_name: Some("Season".to_string()),
            ..Default::default()
        };
        let err = run_diagnose(&client(), &layer).await.unwrap_err();
        assert!(matches!(err, DiagnoseError::MissingChampionship));
    }

    #[test]
    fn test_report_truncates_body() {
        let report = ProbeReport {
            title: "t".to_string(),
            response: ProbeResponse {
                url: "u".to_string(),
                status: 200,
                headers: vec![("ratelimit-remaining".to_string(), "9".to_string())],
                body: "x".repeat(BODY_SNIPPET_CHARS + 50),
            },
        };
        let text = report.to_string();
        assert!(text.contains("ratelimit-remaining: 9"));
        assert_eq!(text.matches('x').count(), BODY_SNIPPET_CHARS);
    }
}
