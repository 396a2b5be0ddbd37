//! Configuration loading and validation.
//!
//! Settings come from three layers merged per field: command line, then the
//! TOML config file, then `FACEIT_*` environment variables. Anything still
//! unset takes its default.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::calculate::WinnerMarkers;
use crate::faceit::resolve::LeaderboardCriteria;
use crate::faceit::DEFAULT_API_BASE;

/// Default config file name.
pub const DEFAULT_CONFIG_FILE: &str = "./faceit.toml";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "FACEIT_API_KEY";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to write config: {0}")]
    WriteError(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Accept either a comma-separated string or a list of map names.
fn deserialize_map_pool<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Pool {
        Joined(String),
        List(Vec<String>),
    }

    Ok(Option::<Pool>::deserialize(deserializer)?.map(|pool| match pool {
        Pool::Joined(s) => split_map_pool(&s),
        Pool::List(list) => list
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    }))
}

fn split_map_pool(s: &str) -> Vec<String> {
    s.split(',')
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect()
}

/// One layer of settings. Every field is optional so layers can be merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub champ_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub champ_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lb_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lb_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lb_group: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lb_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_standings: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_out: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_map_pool",
        skip_serializing_if = "Option::is_none"
    )]
    pub map_pool: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_first: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_second: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl ConfigLayer {
    /// Load a layer from a TOML file. A missing file is an empty layer.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Build a layer from `FACEIT_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&std::env::vars().collect())
    }

    /// Build a layer from a variable map. Empty values count as unset.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let lb_group = match get("FACEIT_LB_GROUP") {
            Some(raw) => Some(raw.parse::<u32>().map_err(|_| {
                ConfigError::ValidationError(format!("FACEIT_LB_GROUP is not a number: {}", raw))
            })?),
            None => None,
        };

        Ok(Self {
            org_id: get("FACEIT_ORGANIZER_ID"),
            org_name: get("FACEIT_ORG_NAME"),
            champ_id: get("FACEIT_CHAMPIONSHIP_ID"),
            champ_name: get("FACEIT_CHAMP_NAME"),
            lb_id: get("FACEIT_LB_ID"),
            lb_name: get("FACEIT_LB_NAME"),
            lb_group,
            lb_pattern: get("FACEIT_LB_PATTERN"),
            game_id: get("FACEIT_GAME_ID"),
            out_dir: get("FACEIT_OUT_DIR").map(PathBuf::from),
            skip_standings: get("FACEIT_SKIP_STANDINGS").map(|v| parse_flag(&v)),
            my_team_id: get("FACEIT_MY_TEAM_ID"),
            debug: get("FACEIT_DEBUG").map(|v| parse_flag(&v)),
            clean_out: get("FACEIT_CLEAN_OUT").map(|v| parse_flag(&v)),
            map_pool: get("FACEIT_MAP_POOL").map(|v| split_map_pool(&v)),
            ..Default::default()
        })
    }

    /// Fill every unset field from `lower`.
    pub fn overlay(self, lower: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            org_id: self.org_id.or(lower.org_id),
            org_name: self.org_name.or(lower.org_name),
            champ_id: self.champ_id.or(lower.champ_id),
            champ_name: self.champ_name.or(lower.champ_name),
            lb_id: self.lb_id.or(lower.lb_id),
            lb_name: self.lb_name.or(lower.lb_name),
            lb_group: self.lb_group.or(lower.lb_group),
            lb_pattern: self.lb_pattern.or(lower.lb_pattern),
            game_id: self.game_id.or(lower.game_id),
            out_dir: self.out_dir.or(lower.out_dir),
            skip_standings: self.skip_standings.or(lower.skip_standings),
            my_team_id: self.my_team_id.or(lower.my_team_id),
            debug: self.debug.or(lower.debug),
            clean_out: self.clean_out.or(lower.clean_out),
            map_pool: self.map_pool.or(lower.map_pool),
            winner_first: self.winner_first.or(lower.winner_first),
            winner_second: self.winner_second.or(lower.winner_second),
            team_delay_ms: self.team_delay_ms.or(lower.team_delay_ms),
            match_delay_ms: self.match_delay_ms.or(lower.match_delay_ms),
            api_base: self.api_base.or(lower.api_base),
        }
    }
}

/// Environment flags are true unless empty, `0`, `false` or `no`.
fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

fn default_game_id() -> String {
    "cs2".to_string()
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_map_pool() -> Vec<String> {
    split_map_pool("anubis,ancient,mirage,inferno,nuke,dust2,vertigo")
}

fn default_team_delay_ms() -> u64 {
    150
}

fn default_match_delay_ms() -> u64 {
    200
}

/// An identifier given directly or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdOrName {
    Id(String),
    Name(String),
}

/// Fully resolved export configuration.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub api_key: String,
    pub api_base: String,
    pub organizer: IdOrName,
    pub championship: IdOrName,
    pub leaderboard: LeaderboardCriteria,
    pub game_id: String,
    pub out_dir: PathBuf,
    pub skip_standings: bool,
    pub my_team_id: Option<String>,
    pub debug: bool,
    pub clean_out: bool,
    pub map_pool: Vec<String>,
    pub winner_markers: WinnerMarkers,
    pub team_delay_ms: u64,
    pub match_delay_ms: u64,
}

fn id_or_name(id: Option<String>, name: Option<String>, what: &str) -> Result<IdOrName, ConfigError> {
    match (id, name) {
        (Some(id), _) => Ok(IdOrName::Id(id)),
        (None, Some(name)) => Ok(IdOrName::Name(name)),
        (None, None) => Err(ConfigError::ValidationError(format!(
            "Provide {what}-id or {what}-name"
        ))),
    }
}

impl ExportConfig {
    /// Resolve merged settings and an API key into a validated configuration.
    pub fn from_layer(layer: ConfigLayer, api_key: Option<&str>) -> Result<Self, ConfigError> {
        let api_key = validate_api_key(api_key)?;
        let leaderboard = LeaderboardCriteria {
            id: layer.lb_id,
            group: layer.lb_group,
            name: layer.lb_name,
            pattern: layer.lb_pattern,
        };

        let defaults = WinnerMarkers::default();
        let config = Self {
            api_key,
            api_base: layer
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            organizer: id_or_name(layer.org_id, layer.org_name, "org")?,
            championship: id_or_name(layer.champ_id, layer.champ_name, "champ")?,
            leaderboard,
            game_id: layer.game_id.unwrap_or_else(default_game_id),
            out_dir: layer.out_dir.unwrap_or_else(default_out_dir),
            skip_standings: layer.skip_standings.unwrap_or(false),
            my_team_id: layer.my_team_id.filter(|s| !s.is_empty()),
            debug: layer.debug.unwrap_or(false),
            clean_out: layer.clean_out.unwrap_or(false),
            map_pool: layer
                .map_pool
                .filter(|p| !p.is_empty())
                .unwrap_or_else(default_map_pool),
            winner_markers: WinnerMarkers {
                first: layer.winner_first.unwrap_or(defaults.first),
                second: layer.winner_second.unwrap_or(defaults.second),
            },
            team_delay_ms: layer.team_delay_ms.unwrap_or_else(default_team_delay_ms),
            match_delay_ms: layer.match_delay_ms.unwrap_or_else(default_match_delay_ms),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(e) = self.leaderboard.compiled_pattern() {
            return Err(ConfigError::ValidationError(e.to_string()));
        }

        if self.winner_markers.first == self.winner_markers.second {
            return Err(ConfigError::ValidationError(
                "winner-first and winner-second must differ".to_string(),
            ));
        }

        if url::Url::parse(&self.api_base).is_err() {
            return Err(ConfigError::ValidationError(format!(
                "api-base is not a URL: {}",
                self.api_base
            )));
        }

        Ok(())
    }
}

/// The API key must be present and at least 10 characters once trimmed.
pub fn validate_api_key(raw: Option<&str>) -> Result<String, ConfigError> {
    let key = raw.map(str::trim).unwrap_or("");
    if key.len() < 10 {
        return Err(ConfigError::ValidationError(format!(
            "{} missing or invalid. Set it in .env or the environment.",
            API_KEY_ENV
        )));
    }
    Ok(key.to_string())
}

/// A config file edited in place, keeping keys this crate does not know.
#[derive(Debug)]
pub struct ConfigFile {
    path: PathBuf,
    table: toml::Table,
}

impl ConfigFile {
    /// Open `path`; a missing file starts empty.
    pub fn open(path: &Path) -> Result<Self, ConfigError> {
        let table = if path.exists() {
            toml::from_str(&std::fs::read_to_string(path)?)?
        } else {
            toml::Table::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            table,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The settings layer held by the file.
    pub fn layer(&self) -> Result<ConfigLayer, ConfigError> {
        Ok(toml::Value::Table(self.table.clone()).try_into()?)
    }

    /// Set a string key. Returns whether the value changed.
    pub fn set_str(&mut self, key: &str, value: &str) -> bool {
        self.set(key, toml::Value::String(value.to_string()))
    }

    /// Set an integer key. Returns whether the value changed.
    pub fn set_int(&mut self, key: &str, value: i64) -> bool {
        self.set(key, toml::Value::Integer(value))
    }

    fn set(&mut self, key: &str, value: toml::Value) -> bool {
        if self.table.get(key) == Some(&value) {
            return false;
        }
        self.table.insert(key.to_string(), value);
        true
    }

    /// Write the file back.
    pub fn save(&self) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(&self.table)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}
