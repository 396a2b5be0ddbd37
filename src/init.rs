//! Fill in resolved identifiers in the config file.
//!
//! Names are resolved to ids once so later exports skip the lookups. Only
//! keys that are still missing are looked up, and the file is written only
//! when something changed.

use tracing::{info, warn};

use crate::config::{ConfigError, ConfigFile, ConfigLayer};
use crate::export::list_leaderboards;
use crate::faceit::resolve::{
    championship_id_by_name, organizer_id_by_name, select_leaderboard, LeaderboardCriteria,
};
use crate::faceit::FaceitClient;
use crate::fetch::JsonSource;

/// Resolve missing ids and store them in `file`.
///
/// Settings are merged as `overrides`, then the file, then `fallback`.
/// Returns the keys that were written. Failed lookups only warn; reading or
/// saving the config file is the only error.
pub async fn run_init<S: JsonSource>(
    client: &FaceitClient<S>,
    file: &mut ConfigFile,
    overrides: ConfigLayer,
    fallback: ConfigLayer,
) -> Result<Vec<String>, ConfigError> {
    let layer = overrides.overlay(file.layer()?).overlay(fallback);
    let game_id = layer.game_id.clone().unwrap_or_else(|| "cs2".to_string());
    let mut changed = Vec::new();

    let mut org_id = layer.org_id.clone();
    if org_id.is_none() {
        if let Some(name) = &layer.org_name {
            match organizer_id_by_name(client, name).await {
                Ok(id) => {
                    if file.set_str("org-id", &id) {
                        changed.push("org-id".to_string());
                    }
                    org_id = Some(id);
                }
                Err(e) => warn!("Could not resolve organizer '{}': {}", name, e),
            }
        }
    }

    let mut champ_id = layer.champ_id.clone();
    if champ_id.is_none() {
        if let (Some(name), Some(org)) = (&layer.champ_name, &org_id) {
            match championship_id_by_name(client, org, name, &game_id).await {
                Ok(id) => {
                    if file.set_str("champ-id", &id) {
                        changed.push("champ-id".to_string());
                    }
                    champ_id = Some(id);
                }
                Err(e) => warn!("Could not resolve championship '{}': {}", name, e),
            }
        }
    }

    if let (None, Some(champ)) = (&layer.lb_id, &champ_id) {
        let criteria = LeaderboardCriteria {
            id: None,
            group: layer.lb_group,
            name: layer.lb_name.clone(),
            pattern: layer.lb_pattern.clone(),
        };
        match list_leaderboards(client, champ).await {
            Ok(listed) => match select_leaderboard(client, champ, &listed, &criteria).await {
                Ok(lb) => {
                    if let Some(id) = &lb.leaderboard_id {
                        if file.set_str("lb-id", id) {
                            changed.push("lb-id".to_string());
                        }
                    } else {
                        warn!(
                            "Leaderboard '{}' has no id; keep using lb-group",
                            lb.display_name()
                        );
                    }
                    if let (None, Some(group)) = (layer.lb_group, lb.group) {
                        if file.set_int("lb-group", i64::from(group)) {
                            changed.push("lb-group".to_string());
                        }
                    }
                }
                Err(e) => warn!("Could not choose a leaderboard: {}", e),
            },
            Err(e) => warn!("Could not list leaderboards for {}: {}", champ, e),
        }
    }

    if changed.is_empty() {
        info!("{} already up to date", file.path().display());
    } else {
        file.save()?;
        info!("Updated {}: {}", file.path().display(), changed.join(", "));
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{query, upstream, MockSource};
    use serde_json::json;
    use tempfile::TempDir;
    use url::Url;

    fn client() -> FaceitClient<MockSource> {
        FaceitClient::new(
            MockSource::new(|url: &Url| match url.path() {
                "/v4/organizers" if query(url, "name").as_deref() == Some("Pappaliiga") => {
                    Ok(json!({"items": [{"organizer_id": "ORG1", "name": "Pappaliiga"}]}))
                }
                "/v4/organizers/ORG1/championships" => Ok(json!({"items": [
                    {"championship_id": "CH1", "name": "Season 9", "game_id": "cs2"}
                ]})),
                "/v4/leaderboards/championships/CH1" => Ok(json!({"items": [
                    {"group": 1, "leaderboard_id": "LB1", "name": "Division 1"},
                    {"group": 2, "leaderboard_id": "LB2", "name": "Division 2"}
                ]})),
                _ => Err(upstream(url, 404)),
            }),
            "https://api.test/v4",
        )
    }

    fn write_config(dir: &TempDir, contents: &str) -> ConfigFile {
        let path = dir.path().join("faceit.toml");
        std::fs::write(&path, contents).unwrap();
        ConfigFile::open(&path).unwrap()
    }

    #[tokio::test]
    async fn test_init_resolves_names_to_ids() {
        let temp_dir = TempDir::new().unwrap();
        let mut file = write_config(
            &temp_dir,
            "org-name = \"Pappaliiga\"\nchamp-name = \"Season 9\"\nlb-pattern = \"division 2\"\n",
        );

        let changed = run_init(&client(), &mut file, ConfigLayer::default(), ConfigLayer::default())
            .await
            .unwrap();
        assert_eq!(changed, vec!["org-id", "champ-id", "lb-id", "lb-group"]);

        let layer = ConfigFile::open(file.path()).unwrap().layer().unwrap();
        assert_eq!(layer.org_id.as_deref(), Some("ORG1"));
        assert_eq!(layer.champ_id.as_deref(), Some("CH1"));
        assert_eq!(layer.lb_id.as_deref(), Some("LB2"));
        assert_eq!(layer.lb_group, Some(2));
        assert_eq!(layer.org_name.as_deref(), Some("Pappaliiga"));
    }

    #[tokio::test]
    async fn test_init_without_changes_leaves_file() {
        let temp_dir = TempDir::new().unwrap();
        let original = "org-id = \"ORG1\"\nchamp-id = \"CH1\"\nlb-id = \"LB1\"\n";
        let mut file = write_config(&temp_dir, original);

        let client = client();
        let changed = run_init(&client, &mut file, ConfigLayer::default(), ConfigLayer::default())
            .await
            .unwrap();

        assert!(changed.is_empty());
        assert_eq!(client.source().call_count(), 0);
        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), original);
    }

    #[tokio::test]
    async fn test_init_ambiguous_leaderboard_only_warns() {
        let temp_dir = TempDir::new().unwrap();
        let mut file = write_config(&temp_dir, "champ-id = \"CH1\"\n");

        let changed = run_init(&client(), &mut file, ConfigLayer::default(), ConfigLayer::default())
            .await
            .unwrap();
        assert!(changed.is_empty());
    }

    #[tokio::test]
    async fn test_init_uses_fallback_names() {
        let temp_dir = TempDir::new().unwrap();
        let mut file = write_config(&temp_dir, "");
        let fallback = ConfigLayer {
            org_name: Some("Pappaliiga".to_string()),
            ..Default::default()
        };

        let changed = run_init(&client(), &mut file, ConfigLayer::default(), fallback).await.unwrap();
        assert_eq!(changed, vec!["org-id"]);
    }

    #[tokio::test]
    async fn test_init_mistyped_key_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut file = write_config(&temp_dir, "champ-id = \"CH1\"\nlb-group = \"two\"\n");

        let client = client();
        let err = run_init(&client, &mut file, ConfigLayer::default(), ConfigLayer::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ConfigError::ParseError(_)));
        assert_eq!(client.source().call_count(), 0);
    }
}
