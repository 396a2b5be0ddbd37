//! Team shapes inside match payloads.
//!
//! A match lists its two competitors either as an array or as an object keyed
//! by faction (`faction1`, `faction2`). Every other module reads teams through
//! this normalizer and never touches the raw `teams` value directly.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// The raw `teams` value, classified.
#[derive(Debug, Clone, Copy)]
pub enum TeamsShape<'a> {
    Sequence(&'a [Value]),
    Keyed(&'a Map<String, Value>),
    Absent,
}

impl<'a> TeamsShape<'a> {
    pub fn of(teams: &'a Value) -> Self {
        match teams {
            Value::Array(items) => TeamsShape::Sequence(items),
            Value::Object(map) => TeamsShape::Keyed(map),
            _ => TeamsShape::Absent,
        }
    }

    /// Team entries in order; keyed shapes yield values in key order.
    pub fn entries(self) -> Vec<&'a Value> {
        match self {
            TeamsShape::Sequence(items) => items.iter().collect(),
            TeamsShape::Keyed(map) => map.values().collect(),
            TeamsShape::Absent => Vec::new(),
        }
    }
}

/// A competitor's id and name, where the payload carries them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamIdentity {
    pub team_id: Option<String>,
    pub name: Option<String>,
}

impl TeamIdentity {
    /// Name, falling back to the backfill map, else empty.
    pub fn name_or(&self, names: &HashMap<String, String>) -> String {
        self.name
            .clone()
            .or_else(|| {
                self.team_id
                    .as_ref()
                    .and_then(|id| names.get(id).cloned())
            })
            .unwrap_or_default()
    }

    pub fn id_or_empty(&self) -> String {
        self.team_id.clone().unwrap_or_default()
    }
}

/// Team entries in order.
pub fn extract_team_entries(teams: &Value) -> Vec<&Value> {
    TeamsShape::of(teams).entries()
}

/// Team id of an entry: `team_id`, then `faction_id`, then `team.team_id`.
fn entry_team_id(entry: &Value) -> Option<String> {
    non_empty_str(entry.get("team_id"))
        .or_else(|| non_empty_str(entry.get("faction_id")))
        .or_else(|| non_empty_str(entry.get("team").and_then(|t| t.get("team_id"))))
}

/// Team name of an entry: `name`, then `team.name`.
fn entry_team_name(entry: &Value) -> Option<String> {
    non_empty_str(entry.get("name"))
        .or_else(|| non_empty_str(entry.get("team").and_then(|t| t.get("name"))))
}

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Ids of every entry that has one, in order.
pub fn extract_team_ids(teams: &Value) -> Vec<String> {
    extract_team_entries(teams)
        .into_iter()
        .filter_map(entry_team_id)
        .collect()
}

/// Every entry projected to id and name, in order. Entries without an id are kept.
pub fn extract_teams_basic(teams: &Value) -> Vec<TeamIdentity> {
    extract_team_entries(teams)
        .into_iter()
        .map(|entry| TeamIdentity {
            team_id: entry_team_id(entry),
            name: entry_team_name(entry),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_keyed_and_sequence_shapes_agree() {
        let keyed = json!({
            "faction1": {"faction_id": "A", "name": "Alpha"},
            "faction2": {"faction_id": "B", "name": "Bravo"}
        });
        let sequence = json!([
            {"faction_id": "A", "name": "Alpha"},
            {"faction_id": "B", "name": "Bravo"}
        ]);

        assert_eq!(extract_team_ids(&keyed), extract_team_ids(&sequence));
        assert_eq!(extract_teams_basic(&keyed), extract_teams_basic(&sequence));
        assert_eq!(extract_team_ids(&keyed), vec!["A", "B"]);
    }

    #[test]
    fn test_keyed_shape_keeps_payload_order() {
        let keyed = json!({
            "faction2": {"team_id": "B"},
            "faction1": {"team_id": "A"}
        });
        assert_eq!(extract_team_ids(&keyed), vec!["B", "A"]);
    }

    #[test]
    fn test_id_field_priority() {
        let teams = json!([
            {"team_id": "T", "faction_id": "F", "team": {"team_id": "N"}},
            {"faction_id": "F", "team": {"team_id": "N"}},
            {"team": {"team_id": "N", "name": "Nested"}}
        ]);
        assert_eq!(extract_team_ids(&teams), vec!["T", "F", "N"]);
        assert_eq!(
            extract_teams_basic(&teams)[2],
            TeamIdentity {
                team_id: Some("N".to_string()),
                name: Some("Nested".to_string())
            }
        );
    }

    #[test]
    fn test_entries_without_id_dropped_from_ids_only() {
        let teams = json!([{"name": "Nameless"}, {"team_id": "B"}]);
        assert_eq!(extract_team_ids(&teams), vec!["B"]);

        let basic = extract_teams_basic(&teams);
        assert_eq!(basic.len(), 2);
        assert_eq!(basic[0].team_id, None);
        assert_eq!(basic[0].name.as_deref(), Some("Nameless"));
    }

    #[test]
    fn test_absent_shapes() {
        assert!(extract_team_entries(&Value::Null).is_empty());
        assert!(extract_team_ids(&json!("teams")).is_empty());
        assert!(extract_teams_basic(&json!(42)).is_empty());
    }

    #[test]
    fn test_name_backfill() {
        let names: HashMap<String, String> =
            [("A".to_string(), "Alpha".to_string())].into_iter().collect();
        let t = TeamIdentity {
            team_id: Some("A".to_string()),
            name: None,
        };
        assert_eq!(t.name_or(&names), "Alpha");

        let t = TeamIdentity::default();
        assert_eq!(t.name_or(&names), "");
    }
}
