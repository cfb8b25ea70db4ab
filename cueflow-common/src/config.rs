//! Configuration loading and resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default HTTP port for the schedule daemon
pub const DEFAULT_PORT: u16 = 5750;

/// Default scan period in milliseconds
pub const DEFAULT_POLL_RATE_MS: u64 = 60_000;

/// Default lookahead window lead time in seconds (5 minutes)
pub const DEFAULT_WINDOW_LEAD_SECS: i64 = 300;

/// Default lookahead window width in seconds (1 minute)
pub const DEFAULT_WINDOW_WIDTH_SECS: i64 = 60;

/// Default bound on concurrent claim/dispatch work per scan cycle
pub const DEFAULT_DISPATCH_CONCURRENCY: usize = 8;

/// Default notification topic (exchange) name
pub const DEFAULT_SINK_EXCHANGE: &str = "scheduler.events";

/// Default notification routing key
pub const DEFAULT_SINK_ROUTING_KEY: &str = "schedule.preplay";

/// Raw TOML config file contents; every field optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
    pub poll_rate_ms: Option<u64>,
    pub window_lead_secs: Option<i64>,
    pub window_width_secs: Option<i64>,
    pub dispatch_concurrency: Option<usize>,
    pub sink_endpoint: Option<String>,
    pub sink_exchange: Option<String>,
    pub sink_routing_key: Option<String>,
}

impl TomlConfig {
    /// Load TOML config: explicit path, then `CUEFLOW_CONFIG`, then the
    /// platform config directory. A missing file is not an error; an
    /// unparseable one is.
    pub fn load(explicit_path: Option<&Path>) -> Result<TomlConfig> {
        let candidate = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("CUEFLOW_CONFIG").ok().map(PathBuf::from))
            .or_else(default_config_path);

        let Some(path) = candidate else {
            return Ok(TomlConfig::default());
        };

        if !path.exists() {
            if explicit_path.is_some() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Ok(TomlConfig::default());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: TomlConfig = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        info!("Loaded config file: {}", path.display());
        Ok(config)
    }
}

/// Resolved daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port
    pub port: u16,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Scan period in milliseconds
    pub poll_rate_ms: u64,
    /// Lookahead window lead time in seconds
    pub window_lead_secs: i64,
    /// Lookahead window width in seconds
    pub window_width_secs: i64,
    /// Bound on concurrent claim/dispatch work per scan cycle
    pub dispatch_concurrency: usize,
    /// Notification sink endpoint URL; publishing is disabled when unset
    pub sink_endpoint: Option<String>,
    /// Notification topic (exchange) the sink should route through
    pub sink_exchange: String,
    /// Routing key for published pre-playback events
    pub sink_routing_key: String,
}

impl Config {
    /// Resolve the full configuration from CLI overrides, environment,
    /// and a TOML file.
    pub fn resolve(
        cli_port: Option<u16>,
        cli_database_path: Option<PathBuf>,
        cli_config_path: Option<PathBuf>,
    ) -> Result<Config> {
        let toml = TomlConfig::load(cli_config_path.as_deref())?;

        let port = cli_port
            .or_else(|| env_parsed("CUEFLOW_PORT"))
            .or(toml.port)
            .unwrap_or(DEFAULT_PORT);

        let database_path = cli_database_path
            .or_else(|| std::env::var("CUEFLOW_DB_PATH").ok().map(PathBuf::from))
            .or(toml.database_path)
            .unwrap_or_else(default_database_path);

        let poll_rate_ms = env_parsed("CUEFLOW_POLL_RATE_MS")
            .or(toml.poll_rate_ms)
            .unwrap_or(DEFAULT_POLL_RATE_MS);
        if poll_rate_ms == 0 {
            return Err(Error::Config("poll_rate_ms must be non-zero".to_string()));
        }

        let window_lead_secs = toml.window_lead_secs.unwrap_or(DEFAULT_WINDOW_LEAD_SECS);
        let window_width_secs = toml.window_width_secs.unwrap_or(DEFAULT_WINDOW_WIDTH_SECS);
        if window_width_secs <= 0 {
            return Err(Error::Config(
                "window_width_secs must be positive".to_string(),
            ));
        }
        if window_width_secs * 1000 != poll_rate_ms as i64 {
            // Each entry is visited in exactly one tick only when the
            // poll rate matches the window width; anything else either
            // skips or revisits windows.
            warn!(
                "poll_rate_ms ({}) does not match window_width_secs ({}); \
                 entries may be missed or scanned twice",
                poll_rate_ms, window_width_secs
            );
        }

        let dispatch_concurrency = toml
            .dispatch_concurrency
            .unwrap_or(DEFAULT_DISPATCH_CONCURRENCY)
            .max(1);

        let sink_endpoint = std::env::var("CUEFLOW_SINK_URL")
            .ok()
            .or(toml.sink_endpoint);
        let sink_exchange = toml
            .sink_exchange
            .unwrap_or_else(|| DEFAULT_SINK_EXCHANGE.to_string());
        let sink_routing_key = toml
            .sink_routing_key
            .unwrap_or_else(|| DEFAULT_SINK_ROUTING_KEY.to_string());

        Ok(Config {
            port,
            database_path,
            poll_rate_ms,
            window_lead_secs,
            window_width_secs,
            dispatch_concurrency,
            sink_endpoint,
            sink_exchange,
            sink_routing_key,
        })
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    match std::env::var(name) {
        Ok(value) => match value.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!("Ignoring unparseable {}={}", name, value);
                None
            }
        },
        Err(_) => None,
    }
}

/// Default configuration file path for the platform
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cueflow").join("cueflow.toml"))
}

/// Default database location for the platform
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cueflow"))
        .unwrap_or_else(|| PathBuf::from("./cueflow_data"))
        .join("cueflow.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults() {
        let config = Config::resolve(None, Some(PathBuf::from("/tmp/test.db")), None).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.poll_rate_ms, DEFAULT_POLL_RATE_MS);
        assert_eq!(config.window_lead_secs, 300);
        assert_eq!(config.window_width_secs, 60);
        assert_eq!(config.sink_exchange, "scheduler.events");
        assert_eq!(config.sink_routing_key, "schedule.preplay");
    }

    #[test]
    fn test_cli_port_wins() {
        let config =
            Config::resolve(Some(9999), Some(PathBuf::from("/tmp/test.db")), None).unwrap();
        assert_eq!(config.port, 9999);
    }

    #[test]
    fn test_explicit_missing_config_file_errors() {
        let result = Config::resolve(
            None,
            Some(PathBuf::from("/tmp/test.db")),
            Some(PathBuf::from("/nonexistent/cueflow.toml")),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_parse() {
        let toml: TomlConfig = toml::from_str(
            r#"
            port = 6000
            poll_rate_ms = 30000
            sink_endpoint = "http://localhost:9000/preplay"
            "#,
        )
        .unwrap();
        assert_eq!(toml.port, Some(6000));
        assert_eq!(toml.poll_rate_ms, Some(30_000));
        assert_eq!(
            toml.sink_endpoint.as_deref(),
            Some("http://localhost:9000/preplay")
        );
    }
}
