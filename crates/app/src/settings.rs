//! Handles settings for the application. Configuration is read from
//! `settings.toml` (or the file passed with `--config`) and from
//! `TRANSFERS__<SECTION>__<KEY>` environment variables.
use std::time::Duration;

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use engine::{RetryPolicy, StrategyKind};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "settings.toml";

#[derive(Debug, Parser)]
#[command(name = "transfers", disable_version_flag = true)]
pub struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    pub config: Option<String>,
    /// Override the log level.
    #[arg(long)]
    pub level: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: String,
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Database {
    pub url: String,
    pub max_connections: Option<u32>,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: "sqlite:./transfers.db?mode=rwc".to_string(),
            max_connections: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Engine {
    pub strategy: StrategyKind,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub jitter_ms: u64,
}

impl Default for Engine {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            strategy: StrategyKind::default(),
            max_attempts: retry.max_attempts,
            initial_backoff_ms: duration_ms(retry.initial_backoff),
            jitter_ms: duration_ms(retry.jitter),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Engine {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            jitter: Duration::from_millis(self.jitter_ms),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub server: Server,
    pub database: Database,
    pub engine: Engine,
}

impl Settings {
    pub fn new(args: &Args) -> Result<Self, ConfigError> {
        let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
        let settings = Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix("TRANSFERS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = settings.try_deserialize()?;
        if let Some(level) = &args.level {
            settings.app.level = level.clone();
        }
        Ok(settings)
    }
}
