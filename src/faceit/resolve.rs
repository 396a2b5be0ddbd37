//! Name → identifier resolution.
//!
//! Each resolver tries an exact name match first and only then a substring
//! match, so a name that is a prefix of several official names still picks
//! the entry called exactly that.

use regex::{Regex, RegexBuilder};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use super::paginate::search_pages;
use super::FaceitClient;
use crate::fetch::{FetchError, JsonSource};
use crate::models::{Championship, LeaderboardDescriptor, Organizer};

/// Query parameter names tried in turn against the organizer search.
pub const ORGANIZER_QUERY_PARAMS: &[&str] = &["name", "search", "query"];

const CHAMPIONSHIP_PAGE_SIZE: u32 = 100;
pub const LEADERBOARD_PAGE_SIZE: u32 = 200;

/// Errors raised while resolving identifiers.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{what} not found by name: {name}{}", scope_suffix(.within))]
    NotFound {
        what: &'static str,
        name: String,
        within: Option<String>,
    },

    #[error("Invalid leaderboard pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

fn scope_suffix(within: &Option<String>) -> String {
    within
        .as_deref()
        .map(|w| format!(" under {}", w))
        .unwrap_or_default()
}

impl ResolveError {
    fn not_found(what: &'static str, name: &str, within: Option<String>) -> Self {
        ResolveError::NotFound {
            what,
            name: name.to_string(),
            within,
        }
    }
}

/// Pick the first item whose name equals `name`, else the first containing it.
///
/// Items whose key yields `None` are skipped in both passes.
fn exact_then_partial<'a, T, K, N>(
    items: &'a [T],
    name: &str,
    key: K,
    name_of: N,
    case_insensitive: bool,
) -> Option<(&'a T, String)>
where
    K: Fn(&T) -> Option<String>,
    N: Fn(&T) -> String,
{
    let fold = |s: &str| {
        if case_insensitive {
            s.to_lowercase()
        } else {
            s.to_string()
        }
    };
    let wanted = fold(name);

    let exact = items.iter().find_map(|item| {
        let candidate = fold(name_of(item).trim());
        if candidate == wanted {
            key(item).map(|k| (item, k))
        } else {
            None
        }
    });

    exact.or_else(|| {
        items.iter().find_map(|item| {
            if fold(&name_of(item)).contains(&wanted) {
                key(item).map(|k| (item, k))
            } else {
                None
            }
        })
    })
}

/// Resolve an organizer id by name.
///
/// The organizer search's query parameter is not reliably documented, so
/// each of [`ORGANIZER_QUERY_PARAMS`] is tried; a failing request just moves
/// on to the next one. Matching is case-insensitive.
pub async fn organizer_id_by_name<S: JsonSource>(
    client: &FaceitClient<S>,
    name: &str,
) -> Result<String, ResolveError> {
    for param in ORGANIZER_QUERY_PARAMS {
        let page = match client.search_organizers(param, name).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Organizer search with '{}' failed: {}", param, e);
                continue;
            }
        };

        let found = exact_then_partial(
            &page.items,
            name,
            |o: &Organizer| o.id.clone(),
            |o: &Organizer| o.name.clone().unwrap_or_default(),
            true,
        );
        if let Some((_, id)) = found {
            info!("Resolved organizer '{}' → {}", name, id);
            return Ok(id);
        }
    }

    Err(ResolveError::not_found("Organizer", name, None))
}

/// Resolve a championship id by name under an organizer, restricted to `game_id`.
pub async fn championship_id_by_name<S: JsonSource>(
    client: &FaceitClient<S>,
    organizer_id: &str,
    name: &str,
    game_id: &str,
) -> Result<String, ResolveError> {
    let found = search_pages(
        CHAMPIONSHIP_PAGE_SIZE,
        move |offset, limit| client.championships_page(organizer_id, offset, limit),
        |items: &[Championship]| {
            let same_game: Vec<&Championship> = items
                .iter()
                .filter(|c| c.game_id.as_deref() == Some(game_id))
                .collect();
            exact_then_partial(
                same_game.as_slice(),
                name,
                |c: &&Championship| c.id.clone(),
                |c: &&Championship| c.name.clone().unwrap_or_default(),
                false,
            )
            .map(|(_, id)| id)
        },
    )
    .await?;

    match found {
        Some(id) => {
            info!("Resolved championship '{}' → {}", name, id);
            Ok(id)
        }
        None => Err(ResolveError::not_found(
            "Championship",
            name,
            Some(format!("organizer {}", organizer_id)),
        )),
    }
}

/// Resolve a leaderboard's group index by name under a championship.
pub async fn leaderboard_group_by_name<S: JsonSource>(
    client: &FaceitClient<S>,
    championship_id: &str,
    name: &str,
) -> Result<u32, ResolveError> {
    let found = search_pages(
        LEADERBOARD_PAGE_SIZE,
        move |offset, limit| client.leaderboards_page(championship_id, offset, limit),
        |items: &[LeaderboardDescriptor]| {
            exact_then_partial(
                items,
                name,
                |lb: &LeaderboardDescriptor| lb.group.map(|g| g.to_string()),
                |lb: &LeaderboardDescriptor| lb.display_name().to_string(),
                false,
            )
            .and_then(|(lb, _)| lb.group)
        },
    )
    .await?;

    found.ok_or_else(|| {
        ResolveError::not_found("Leaderboard", name, Some(championship_id.to_string()))
    })
}

/// Resolve a player id by exact nickname.
pub async fn player_id_by_nickname<S: JsonSource>(
    client: &FaceitClient<S>,
    nickname: &str,
) -> Result<String, ResolveError> {
    let data = client.player_by_nickname(nickname).await?;

    data.get("player_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
        .ok_or_else(|| ResolveError::not_found("Player", nickname, None))
}

/// How the user asked for a leaderboard.
#[derive(Debug, Clone, Default)]
pub struct LeaderboardCriteria {
    pub id: Option<String>,
    pub group: Option<u32>,
    pub name: Option<String>,
    pub pattern: Option<String>,
}

impl LeaderboardCriteria {
    /// Compile `pattern` as a case-insensitive regex.
    pub fn compiled_pattern(&self) -> Result<Option<Regex>, ResolveError> {
        self.pattern
            .as_deref()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ResolveError::InvalidPattern {
                        pattern: p.to_string(),
                        source,
                    })
            })
            .transpose()
    }
}

/// Choose the leaderboard to export from a championship's listing.
///
/// Order: explicit id, explicit group, name (paged resolver, then the
/// listing itself), pattern, sole listed entry. Fails only when neither a
/// group nor an explicit id could be determined.
pub async fn select_leaderboard<S: JsonSource>(
    client: &FaceitClient<S>,
    championship_id: &str,
    listed: &[LeaderboardDescriptor],
    criteria: &LeaderboardCriteria,
) -> Result<LeaderboardDescriptor, ResolveError> {
    let pattern = criteria.compiled_pattern()?;

    let mut chosen: Option<LeaderboardDescriptor> = None;

    if let Some(id) = &criteria.id {
        chosen = Some(
            listed
                .iter()
                .find(|lb| lb.leaderboard_id.as_deref() == Some(id))
                .cloned()
                .unwrap_or_else(|| LeaderboardDescriptor::from_id(id.clone())),
        );
    } else if let Some(group) = criteria.group {
        chosen = Some(find_group(listed, group));
    } else if let Some(name) = &criteria.name {
        match leaderboard_group_by_name(client, championship_id, name).await {
            Ok(group) => chosen = Some(find_group(listed, group)),
            Err(e) => {
                warn!("Leaderboard lookup by name failed ({}), scanning listing", e);
                chosen = exact_then_partial(
                    listed,
                    name,
                    |lb: &LeaderboardDescriptor| lb.group.map(|g| g.to_string()),
                    |lb: &LeaderboardDescriptor| lb.display_name().to_string(),
                    false,
                )
                .map(|(lb, _)| lb.clone());
            }
        }
    }

    let has_group = |c: &Option<LeaderboardDescriptor>| c.as_ref().and_then(|lb| lb.group).is_some();

    if !has_group(&chosen) {
        if let Some(re) = &pattern {
            if let Some(lb) = listed.iter().find(|lb| re.is_match(lb.display_name())) {
                chosen = Some(lb.clone());
            }
        }
    }
    if !has_group(&chosen) && listed.len() == 1 {
        chosen = Some(listed[0].clone());
    }

    match chosen {
        Some(mut lb) if lb.group.is_some() || criteria.id.is_some() => {
            if lb.leaderboard_id.is_none() {
                lb.leaderboard_id = criteria.id.clone();
            }
            Ok(lb)
        }
        _ => {
            let available: Vec<String> = listed
                .iter()
                .map(|lb| {
                    format!(
                        "{} (group {}, id {})",
                        lb.display_name(),
                        lb.group.map(|g| g.to_string()).unwrap_or_default(),
                        lb.leaderboard_id.as_deref().unwrap_or("")
                    )
                })
                .collect();
            warn!("Available leaderboards: {}", available.join("; "));
            Err(ResolveError::not_found(
                "Leaderboard",
                criteria
                    .name
                    .as_deref()
                    .or(criteria.pattern.as_deref())
                    .unwrap_or("(none given)"),
                Some(championship_id.to_string()),
            ))
        }
    }
}

fn find_group(listed: &[LeaderboardDescriptor], group: u32) -> LeaderboardDescriptor {
    listed
        .iter()
        .find(|lb| lb.group == Some(group))
        .cloned()
        .unwrap_or(LeaderboardDescriptor {
            group: Some(group),
            ..Default::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{query, upstream, MockSource};
    use serde_json::json;

    fn client(source: MockSource) -> FaceitClient<MockSource> {
        FaceitClient::new(source, "https://api.test/v4")
    }

    fn lb(group: u32, name: &str) -> LeaderboardDescriptor {
        LeaderboardDescriptor {
            group: Some(group),
            leaderboard_id: Some(format!("LB{}", group)),
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_organizer_exact_match() {
        let c = client(MockSource::new(|url| {
            assert!(url.path().ends_with("/organizers"));
            Ok(json!({"items": [{"organizer_id": "ORG1", "name": "Pappaliiga"}]}))
        }));
        let id = organizer_id_by_name(&c, "Pappaliiga").await.unwrap();
        assert_eq!(id, "ORG1");
        assert_eq!(c.source().call_count(), 1);
    }

    #[tokio::test]
    async fn test_organizer_exact_beats_earlier_partial() {
        let c = client(MockSource::new(|_| {
            Ok(json!({"items": [
                {"organizer_id": "ORG2", "name": "Pappaliiga CS2"},
                {"organizer_id": "ORG1", "name": "PAPPALIIGA"}
            ]}))
        }));
        assert_eq!(organizer_id_by_name(&c, "pappaliiga").await.unwrap(), "ORG1");
    }

    #[tokio::test]
    async fn test_organizer_partial_match() {
        let c = client(MockSource::new(|_| {
            Ok(json!({"items": [{"organizer_id": "ORG2", "name": "Pappaliiga CS2"}]}))
        }));
        assert_eq!(organizer_id_by_name(&c, "Pappaliiga").await.unwrap(), "ORG2");
    }

    #[tokio::test]
    async fn test_organizer_tries_next_param_on_error() {
        let c = client(MockSource::new(|url| {
            if query(url, "name").is_some() {
                return Err(upstream(url, 400));
            }
            if query(url, "search").is_some() {
                return Ok(json!({"items": []}));
            }
            Ok(json!({"items": [{"organizer_id": "ORG3", "name": "Liiga"}]}))
        }));
        assert_eq!(organizer_id_by_name(&c, "Liiga").await.unwrap(), "ORG3");
        assert_eq!(c.source().call_count(), 3);
    }

    #[tokio::test]
    async fn test_organizer_not_found() {
        let c = client(MockSource::new(|_| Ok(json!({"items": []}))));
        let err = organizer_id_by_name(&c, "Ghost").await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { what: "Organizer", .. }));
        assert_eq!(err.to_string(), "Organizer not found by name: Ghost");
    }

    #[tokio::test]
    async fn test_championship_found_on_later_page() {
        let c = client(MockSource::new(|url| {
            assert!(url.path().contains("/organizers/ORG1/championships"));
            match query(url, "offset").as_deref() {
                Some("0") => Ok(json!({"items": (0..100).map(|i| json!({
                    "name": format!("Other {}", i), "game_id": "cs2", "championship_id": format!("CHX{}", i)
                })).collect::<Vec<_>>()})),
                Some("100") => Ok(json!({"items": [
                    {"name": "24 Divisioona S11", "game_id": "cs2", "championship_id": "CH1"}
                ]})),
                _ => Ok(json!({"items": []})),
            }
        }));
        let id = championship_id_by_name(&c, "ORG1", "24 Divisioona S11", "cs2")
            .await
            .unwrap();
        assert_eq!(id, "CH1");
    }

    #[tokio::test]
    async fn test_championship_continues_after_short_page() {
        let c = client(MockSource::new(|url| match query(url, "offset").as_deref() {
            Some("0") => Ok(json!({"items": [{"name": "Other", "game_id": "cs2", "championship_id": "CHX"}]})),
            Some("1") => Ok(json!({"items": [{"name": "24 Divisioona S11", "game_id": "cs2", "championship_id": "CH1"}]})),
            _ => Ok(json!({"items": []})),
        }));
        let id = championship_id_by_name(&c, "ORG1", "24 Divisioona S11", "cs2")
            .await
            .unwrap();
        assert_eq!(id, "CH1");
    }

    #[tokio::test]
    async fn test_championship_requires_game_id() {
        let c = client(MockSource::new(|url| match query(url, "offset").as_deref() {
            Some("0") => Ok(json!({"items": [
                {"name": "Spring Cup", "game_id": "dota2", "championship_id": "D1"},
                {"name": "Spring Cup Qualifier", "game_id": "cs2", "championship_id": "C2"}
            ]})),
            _ => Ok(json!({"items": []})),
        }));
        let id = championship_id_by_name(&c, "ORG1", "Spring Cup", "cs2")
            .await
            .unwrap();
        assert_eq!(id, "C2");
    }

    #[tokio::test]
    async fn test_championship_not_found_names_scope() {
        let c = client(MockSource::new(|_| Ok(json!({"items": []}))));
        let err = championship_id_by_name(&c, "ORG1", "Nope", "cs2")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Championship not found by name: Nope under organizer ORG1"
        );
    }

    #[tokio::test]
    async fn test_leaderboard_group_across_pages() {
        let c = client(MockSource::new(|url| {
            assert!(url.path().contains("/leaderboards/championships/CH1"));
            match query(url, "offset").as_deref() {
                Some("0") => Ok(json!({"items": [{"name": "Wrong LB", "group": 1}]})),
                Some("1") => Ok(json!({"items": [{"name": "24 Divisioona", "group": 5}]})),
                _ => Ok(json!({"items": []})),
            }
        }));
        let group = leaderboard_group_by_name(&c, "CH1", "24 Divisioona")
            .await
            .unwrap();
        assert_eq!(group, 5);
    }

    #[tokio::test]
    async fn test_leaderboard_group_accepts_title() {
        let c = client(MockSource::new(|url| match query(url, "offset").as_deref() {
            Some("0") => Ok(json!({"items": [{"title": "Division 3 - Group B", "group": 7}]})),
            _ => Ok(json!({"items": []})),
        }));
        let group = leaderboard_group_by_name(&c, "CH1", "Division 3").await.unwrap();
        assert_eq!(group, 7);
    }

    #[tokio::test]
    async fn test_player_by_nickname() {
        let c = client(MockSource::new(|url| {
            assert!(url.path().ends_with("/players"));
            assert_eq!(query(url, "nickname").as_deref(), Some("nick"));
            Ok(json!({"player_id": "P1"}))
        }));
        assert_eq!(player_id_by_nickname(&c, "nick").await.unwrap(), "P1");
    }

    #[tokio::test]
    async fn test_player_missing_id_is_not_found() {
        let c = client(MockSource::new(|_| Ok(json!({}))));
        let err = player_id_by_nickname(&c, "missing").await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { what: "Player", .. }));
    }

    #[tokio::test]
    async fn test_select_by_id_synthesises_missing() {
        let c = client(MockSource::new(|_| panic!("no request expected")));
        let listed = vec![lb(1, "Div 1")];
        let criteria = LeaderboardCriteria {
            id: Some("LB9".to_string()),
            ..Default::default()
        };
        let chosen = select_leaderboard(&c, "CH1", &listed, &criteria).await.unwrap();
        assert_eq!(chosen, LeaderboardDescriptor::from_id("LB9"));

        let criteria = LeaderboardCriteria {
            id: Some("LB1".to_string()),
            ..Default::default()
        };
        let chosen = select_leaderboard(&c, "CH1", &listed, &criteria).await.unwrap();
        assert_eq!(chosen.group, Some(1));
    }

    #[tokio::test]
    async fn test_select_by_group() {
        let c = client(MockSource::new(|_| panic!("no request expected")));
        let listed = vec![lb(1, "Div 1"), lb(2, "Div 2")];
        let criteria = LeaderboardCriteria {
            group: Some(2),
            ..Default::default()
        };
        let chosen = select_leaderboard(&c, "CH1", &listed, &criteria).await.unwrap();
        assert_eq!(chosen.leaderboard_id.as_deref(), Some("LB2"));
    }

    #[tokio::test]
    async fn test_select_by_group_zero() {
        let c = client(MockSource::new(|_| panic!("no request expected")));
        let listed = vec![lb(0, "Playoffs"), lb(1, "Div 1")];
        let criteria = LeaderboardCriteria {
            group: Some(0),
            ..Default::default()
        };
        let chosen = select_leaderboard(&c, "CH1", &listed, &criteria).await.unwrap();
        assert_eq!(chosen.name.as_deref(), Some("Playoffs"));
    }

    #[tokio::test]
    async fn test_select_by_name_falls_back_to_listing() {
        let c = client(MockSource::new(|url| Err(upstream(url, 400))));
        let listed = vec![lb(1, "Div 1"), lb(2, "Div 2 East")];
        let criteria = LeaderboardCriteria {
            name: Some("Div 2".to_string()),
            ..Default::default()
        };
        let chosen = select_leaderboard(&c, "CH1", &listed, &criteria).await.unwrap();
        assert_eq!(chosen.group, Some(2));
    }

    #[tokio::test]
    async fn test_select_by_pattern_then_sole() {
        let c = client(MockSource::new(|_| panic!("no request expected")));
        let listed = vec![lb(1, "Division One"), lb(4, "Masters Division")];
        let criteria = LeaderboardCriteria {
            pattern: Some("^masters".to_string()),
            ..Default::default()
        };
        let chosen = select_leaderboard(&c, "CH1", &listed, &criteria).await.unwrap();
        assert_eq!(chosen.group, Some(4));

        let sole = vec![lb(3, "Only")];
        let chosen = select_leaderboard(&c, "CH1", &sole, &LeaderboardCriteria::default())
            .await
            .unwrap();
        assert_eq!(chosen.group, Some(3));
    }

    #[tokio::test]
    async fn test_select_keeps_configured_id_when_sole_entry_has_none() {
        let c = client(MockSource::new(|_| panic!("no request expected")));
        let sole = vec![LeaderboardDescriptor {
            group: Some(3),
            name: Some("Only".to_string()),
            ..Default::default()
        }];
        let criteria = LeaderboardCriteria {
            id: Some("LB9".to_string()),
            ..Default::default()
        };
        let chosen = select_leaderboard(&c, "CH1", &sole, &criteria).await.unwrap();
        assert_eq!(chosen.group, Some(3));
        assert_eq!(chosen.leaderboard_id.as_deref(), Some("LB9"));
    }

    #[tokio::test]
    async fn test_select_unresolved() {
        let c = client(MockSource::new(|_| panic!("no request expected")));
        let listed = vec![lb(1, "A"), lb(2, "B")];
        let err = select_leaderboard(&c, "CH1", &listed, &LeaderboardCriteria::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { what: "Leaderboard", .. }));
    }

    #[tokio::test]
    async fn test_select_invalid_pattern() {
        let c = client(MockSource::new(|_| panic!("no request expected")));
        let criteria = LeaderboardCriteria {
            pattern: Some("(".to_string()),
            ..Default::default()
        };
        let err = select_leaderboard(&c, "CH1", &[], &criteria).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidPattern { .. }));
    }
}
