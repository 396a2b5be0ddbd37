//! FACEIT Data API v4 client.
//!
//! All endpoint paths and query parameters live in this module so upstream
//! changes are easy to fix. Requests go through a [`JsonSource`], which
//! carries authentication and rate-limit handling.

pub mod flatten;
pub mod paginate;
pub mod resolve;
pub mod shape;

use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::fetch::{FetchError, JsonSource};
use crate::models::{
    Championship, LeaderboardDescriptor, MatchRecord, MatchStats, Organizer, Page, TeamDetail,
};

/// Public FACEIT Data API base.
pub const DEFAULT_API_BASE: &str = "https://open.faceit.com/data/v4";

/// FACEIT API client.
pub struct FaceitClient<S> {
    source: S,
    api_base: String,
}

impl<S: JsonSource> FaceitClient<S> {
    /// Create a new client against `api_base`.
    pub fn new(source: S, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self { source, api_base }
    }

    /// The underlying JSON source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Build an absolute URL for an API path.
    pub fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url, FetchError> {
        let mut url = Url::parse(&format!("{}{}", self.api_base, path))
            .map_err(|e| FetchError::InvalidUrl(format!("{}{}: {}", self.api_base, path, e)))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = self.url(path, params)?;
        let json = self.source.get_json(&url).await?;
        Ok(serde_json::from_value(json)?)
    }

    /// Search organizers, passing the name under query parameter `param`.
    pub async fn search_organizers(
        &self,
        param: &str,
        name: &str,
    ) -> Result<Page<Organizer>, FetchError> {
        self.get(
            "/organizers",
            &[
                (param, name.to_string()),
                ("limit", "100".to_string()),
                ("offset", "0".to_string()),
            ],
        )
        .await
    }

    /// One page of an organizer's championships.
    pub async fn championships_page(
        &self,
        organizer_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<Championship>, FetchError> {
        self.get(
            &format!("/organizers/{}/championships", organizer_id),
            &paging(offset, limit),
        )
        .await
    }

    /// A single championship.
    pub async fn championship(&self, championship_id: &str) -> Result<Championship, FetchError> {
        self.get(&format!("/championships/{}", championship_id), &[])
            .await
    }

    /// One page of a championship's leaderboards.
    pub async fn leaderboards_page(
        &self,
        championship_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<LeaderboardDescriptor>, FetchError> {
        self.get(
            &format!("/leaderboards/championships/{}", championship_id),
            &paging(offset, limit),
        )
        .await
    }

    /// One page of standings addressed by championship and group index.
    pub async fn group_standings_page(
        &self,
        championship_id: &str,
        group: u32,
        offset: u32,
        limit: u32,
    ) -> Result<Page<Value>, FetchError> {
        self.get(
            &format!(
                "/leaderboards/championships/{}/groups/{}",
                championship_id, group
            ),
            &paging(offset, limit),
        )
        .await
    }

    /// One page of standings addressed by leaderboard id.
    pub async fn leaderboard_standings_page(
        &self,
        leaderboard_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<Value>, FetchError> {
        self.get(
            &format!("/leaderboards/{}", leaderboard_id),
            &paging(offset, limit),
        )
        .await
    }

    /// One page of a championship's matches.
    pub async fn matches_page(
        &self,
        championship_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<MatchRecord>, FetchError> {
        self.get(
            &format!("/championships/{}/matches", championship_id),
            &paging(offset, limit),
        )
        .await
    }

    /// Per-map statistics for a match.
    pub async fn match_stats(&self, match_id: &str) -> Result<MatchStats, FetchError> {
        self.get(&format!("/matches/{}/stats", match_id), &[]).await
    }

    /// Team details including roster.
    pub async fn team(&self, team_id: &str) -> Result<TeamDetail, FetchError> {
        self.get(&format!("/teams/{}", team_id), &[]).await
    }

    /// Raw player lookup by exact nickname.
    pub async fn player_by_nickname(&self, nickname: &str) -> Result<Value, FetchError> {
        self.get("/players", &[("nickname", nickname.to_string())])
            .await
    }
}

fn paging(offset: u32, limit: u32) -> [(&'static str, String); 2] {
    [("limit", limit.to_string()), ("offset", offset.to_string())]
}
