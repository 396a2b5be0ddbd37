//! FACEIT Data API payloads.
//!
//! Every field is optional or defaulted: the upstream API omits fields freely
//! and the resolvers must keep scanning a page even when one entry is partial.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Deserialize a value that may be a string or a number into a string.
pub(crate) fn deserialize_string_or_number<'de, D>(
    deserializer: D,
) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Option<Value> = Option::deserialize(deserializer)?;
    Ok(val.and_then(|v| value_to_string(&v)))
}

/// Deserialize a non-negative integer given as a number or a numeric string.
/// Anything else is `None`.
fn deserialize_lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Option<Value> = Option::deserialize(deserializer)?;
    Ok(val.and_then(|v| match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// Deserialize a JSON object; any other shape is `None`.
fn deserialize_lenient_object<'de, D>(
    deserializer: D,
) -> Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match val {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    })
}

/// Deserialize `T`, treating a value of the wrong shape as absent.
fn deserialize_lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let val: Option<Value> = Option::deserialize(deserializer)?;
    Ok(val.and_then(|v| serde_json::from_value(v).ok()))
}

/// Render a scalar JSON value as text; objects, arrays and null yield `None`.
pub fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A collection response: `{ "items": [...] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

/// An organizer from `/organizers`.
#[derive(Debug, Clone, Deserialize)]
pub struct Organizer {
    #[serde(rename = "organizer_id", default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

/// A championship from `/organizers/{id}/championships` or `/championships/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Championship {
    #[serde(rename = "championship_id", default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub game_id: Option<String>,
}

/// A leaderboard (division) listed under a championship.
///
/// `group` and `leaderboard_id` are alternate keys into the same division;
/// either may be missing depending on how it was found.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LeaderboardDescriptor {
    #[serde(default, deserialize_with = "deserialize_lenient_u32")]
    pub group: Option<u32>,

    #[serde(default)]
    pub leaderboard_id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub leaderboard_name: Option<String>,
}

impl LeaderboardDescriptor {
    /// Descriptor known only by its id.
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            leaderboard_id: Some(id.into()),
            ..Default::default()
        }
    }

    /// Display name: `name`, else `title`, else `leaderboard_name`.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.title.as_deref())
            .or(self.leaderboard_name.as_deref())
            .unwrap_or("")
    }
}

/// Winner and per-team score as reported on a match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchResults {
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    pub winner: Option<String>,

    /// Score keyed by team id
    #[serde(default, deserialize_with = "deserialize_lenient_object")]
    pub score: Option<Map<String, Value>>,
}

/// A match from `/championships/{id}/matches`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchRecord {
    #[serde(default)]
    pub match_id: String,

    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    pub scheduled_at: Option<String>,

    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    pub finished_at: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    /// Either an array of teams or an object keyed by faction
    #[serde(default)]
    pub teams: Value,

    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub results: Option<MatchResults>,

    #[serde(default)]
    pub voting: Option<Value>,
}

impl MatchRecord {
    /// Declared winner, if any.
    pub fn winner(&self) -> Option<&str> {
        self.results.as_ref().and_then(|r| r.winner.as_deref())
    }

    /// Numeric score for a team id.
    pub fn score_for(&self, team_id: &str) -> Option<f64> {
        self.results
            .as_ref()
            .and_then(|r| r.score.as_ref())
            .and_then(|s| s.get(team_id))
            .and_then(Value::as_f64)
    }

    /// `voting.map`, or an empty object.
    pub fn map_voting(&self) -> Value {
        self.voting
            .as_ref()
            .and_then(|v| v.get("map"))
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Map picks from `voting.map.pick`.
    pub fn map_picks(&self) -> Vec<String> {
        self.voting_list("pick")
    }

    /// Map bans from `voting.map.ban`.
    pub fn map_bans(&self) -> Vec<String> {
        self.voting_list("ban")
    }

    fn voting_list(&self, key: &str) -> Vec<String> {
        self.voting
            .as_ref()
            .and_then(|v| v.get("map"))
            .and_then(|m| m.get(key))
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(value_to_string).collect())
            .unwrap_or_default()
    }
}

/// A team roster member from `/teams/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamMember {
    #[serde(default)]
    pub player_id: Option<String>,

    #[serde(default)]
    pub nickname: Option<String>,

    #[serde(default)]
    pub role: Option<String>,
}

/// A team from `/teams/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamDetail {
    #[serde(default)]
    pub team_id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    pub creation_date: Option<String>,

    #[serde(default)]
    pub members: Vec<TeamMember>,
}

/// Statistics for a finished match from `/matches/{id}/stats`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchStats {
    /// One entry per map played
    #[serde(default)]
    pub rounds: Vec<Value>,
}

/// A matched match with its (possibly unavailable) statistics.
#[derive(Debug, Clone)]
pub struct MatchWithStats {
    pub record: MatchRecord,
    pub stats: Option<MatchStats>,
}
