use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use faceit_export::config::{
    validate_api_key, ConfigFile, ConfigLayer, ExportConfig, API_KEY_ENV, DEFAULT_CONFIG_FILE,
};
use faceit_export::diagnose::run_diagnose;
use faceit_export::export::run_export;
use faceit_export::faceit::{FaceitClient, DEFAULT_API_BASE};
use faceit_export::fetch::{Fetcher, FetcherConfig};
use faceit_export::init::run_init;
use faceit_export::storage::{CsvSink, StorageConfig};

#[derive(Parser)]
#[command(name = "faceit-export")]
#[command(about = "Export a FACEIT championship division to CSV tables")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export standings, teams, matches and stats to CSV
    Export(Settings),

    /// Resolve names to ids and store them in the config file
    Init(Settings),

    /// Probe the standings endpoints of a championship
    Diagnose(Settings),
}

impl Commands {
    fn split(self) -> (Settings, Mode) {
        match self {
            Commands::Export(s) => (s, Mode::Export),
            Commands::Init(s) => (s, Mode::Init),
            Commands::Diagnose(s) => (s, Mode::Diagnose),
        }
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Export,
    Init,
    Diagnose,
}

/// Settings shared by every subcommand. Anything unset falls back to the
/// config file, then to `FACEIT_*` environment variables.
#[derive(Args, Default)]
struct Settings {
    /// Organizer id
    #[arg(long)]
    org_id: Option<String>,

    /// Organizer name
    #[arg(long)]
    org_name: Option<String>,

    /// Championship id
    #[arg(long)]
    champ_id: Option<String>,

    /// Championship name
    #[arg(long)]
    champ_name: Option<String>,

    /// Leaderboard id
    #[arg(long)]
    lb_id: Option<String>,

    /// Leaderboard name
    #[arg(long)]
    lb_name: Option<String>,

    /// Leaderboard group number
    #[arg(long)]
    lb_group: Option<u32>,

    /// Case-insensitive regex matched against leaderboard names
    #[arg(long)]
    lb_pattern: Option<String>,

    /// Game id used to filter championships (default cs2)
    #[arg(long)]
    game_id: Option<String>,

    /// Output directory (default out)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Do not fetch standings; infer teams from matches
    #[arg(long)]
    skip_standings: bool,

    /// Team to build the my_team_* tables for
    #[arg(long)]
    my_team_id: Option<String>,

    /// Verbose logging
    #[arg(long)]
    debug: bool,

    /// Remove the output directory before writing
    #[arg(long)]
    clean_out: bool,

    /// Comma-separated map pool
    #[arg(long)]
    map_pool: Option<String>,

    /// Milliseconds to wait between team requests
    #[arg(long)]
    team_delay_ms: Option<u64>,

    /// Milliseconds to wait between match stats requests
    #[arg(long)]
    match_delay_ms: Option<u64>,

    /// API base URL
    #[arg(long)]
    api_base: Option<String>,
}

impl Settings {
    fn into_layer(self) -> ConfigLayer {
        ConfigLayer {
            org_id: self.org_id,
            org_name: self.org_name,
            champ_id: self.champ_id,
            champ_name: self.champ_name,
            lb_id: self.lb_id,
            lb_name: self.lb_name,
            lb_group: self.lb_group,
            lb_pattern: self.lb_pattern,
            game_id: self.game_id,
            out_dir: self.out_dir,
            skip_standings: self.skip_standings.then_some(true),
            my_team_id: self.my_team_id,
            debug: self.debug.then_some(true),
            clean_out: self.clean_out.then_some(true),
            map_pool: self.map_pool.map(|pool| {
                pool.split(',')
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .collect()
            }),
            team_delay_ms: self.team_delay_ms,
            match_delay_ms: self.match_delay_ms,
            api_base: self.api_base,
            ..Default::default()
        }
    }
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn api_key() -> Option<String> {
    std::env::var(API_KEY_ENV).ok()
}

fn client(api_key: &str, api_base: Option<&str>) -> Result<FaceitClient<Fetcher>> {
    let fetcher = Fetcher::new(FetcherConfig::new(api_key))?;
    Ok(FaceitClient::new(
        fetcher,
        api_base.unwrap_or(DEFAULT_API_BASE),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let (settings, mode) = cli.command.split();
    let cli_layer = settings.into_layer();
    let file_layer = ConfigLayer::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let env_layer = ConfigLayer::from_env()?;

    let debug = cli_layer.debug.or(file_layer.debug).or(env_layer.debug) == Some(true);
    init_tracing(if debug { "debug" } else { cli.log_level.as_str() }, cli.json_logs);

    tracing::info!("Starting faceit-export v{}", env!("CARGO_PKG_VERSION"));

    match mode {
        Mode::Export => {
            let layer = cli_layer.overlay(file_layer).overlay(env_layer);
            let config = ExportConfig::from_layer(layer, api_key().as_deref())?;
            let client = client(&config.api_key, Some(&config.api_base))?;

            let storage = StorageConfig::new(config.out_dir.clone());
            storage.prepare(config.clean_out)?;
            let mut sink = CsvSink::new(storage);

            let summary = run_export(&client, &config, &mut sink).await?;

            println!("\n=== Export Results ===");
            println!(
                "Championship:   {} ({})",
                summary.championship_name, summary.championship_id
            );
            println!(
                "Leaderboard:    {} (group {}, id {})",
                summary.leaderboard.display_name(),
                summary
                    .leaderboard
                    .group
                    .map(|g| g.to_string())
                    .unwrap_or_default(),
                summary.leaderboard.leaderboard_id.as_deref().unwrap_or("")
            );
            println!("Standings:      {}", summary.standings);
            println!(
                "Teams:          {} ({} skipped)",
                summary.teams, summary.teams_skipped
            );
            println!(
                "Matches:        {} ({} without stats)",
                summary.matches, summary.stats_missing
            );
            println!("Stat lines:     {}", summary.stat_lines);
            println!("\nTables written to {}:", config.out_dir.display());
            for (table, rows) in &summary.tables {
                println!("  {:<24} {}", table, rows);
            }
        }

        Mode::Init => {
            let key = validate_api_key(api_key().as_deref())?;
            let api_base = cli_layer
                .api_base
                .clone()
                .or(file_layer.api_base)
                .or(env_layer.api_base.clone());
            let client = client(&key, api_base.as_deref())?;

            let mut file = ConfigFile::open(&cli.config)?;
            let changed = run_init(&client, &mut file, cli_layer, env_layer).await?;

            if changed.is_empty() {
                println!("{} is up to date", cli.config.display());
            } else {
                println!("Updated {}:", cli.config.display());
                for key in &changed {
                    println!("  {}", key);
                }
            }
        }

        Mode::Diagnose => {
            let key = validate_api_key(api_key().as_deref())?;
            let layer = cli_layer.overlay(file_layer).overlay(env_layer);
            let client = client(&key, layer.api_base.as_deref())?;

            let reports = run_diagnose(&client, &layer).await?;
            for report in &reports {
                println!("\n{}", report);
            }
        }
    }

    Ok(())
}
