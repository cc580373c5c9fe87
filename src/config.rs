//! Application configuration loading and validation.
//!
//! Configuration is read from an optional TOML file, then overridden by environment
//! variables (a `.env` file is loaded into the environment first by `main`).

use crate::utils::RetryPolicy;
use crate::wallet::sync::SchedulerSettings;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt};

/// Configuration errors with structured variants.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Upstream chain-data service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the REST service.
    pub rest_url: String,
    /// Base URL of the Cosmos LCD service.
    pub cosmos_url: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// How long a single request keeps retrying connection failures before it is
    /// reported as timed out.
    pub request_retry_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rest_url: "http://127.0.0.1:5002".into(),
            cosmos_url: "http://127.0.0.1:1318".into(),
            connect_timeout_secs: 5,
            read_timeout_secs: 5,
            request_retry_secs: 10,
        }
    }
}

/// Pacing and thresholds of the sync loops.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Pause between two chain head fetches.
    pub poll_interval_secs: u64,
    /// Pause between two scheduler cycles.
    pub cycle_interval_secs: u64,
    pub max_wallet_stale_drift: u64,
    pub max_full_rescan_drift: u64,
    /// Directory holding one snapshot file per wallet.
    pub data_dir: PathBuf,
    pub staking_denom: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            cycle_interval_secs: 10,
            max_wallet_stale_drift: 2000,
            max_full_rescan_drift: 5000,
            data_dir: PathBuf::from("database/richlist/wallet"),
            staking_denom: "swth".into(),
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            cycle_interval: Duration::from_secs(self.cycle_interval_secs),
            max_wallet_stale_drift: self.max_wallet_stale_drift,
            max_full_rescan_drift: self.max_full_rescan_drift,
            staking_denom: self.staking_denom.clone(),
        }
    }
}

/// Waits after transient gateway failures.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub timeout_backoff_secs: u64,
    pub catching_up_backoff_secs: u64,
    /// Timeout wait of the height poller, which retries sooner than wallet refreshes.
    pub poller_timeout_backoff_secs: u64,
    /// Attempts per wallet refresh; unset retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout_backoff_secs: 30,
            catching_up_backoff_secs: 60,
            poller_timeout_backoff_secs: 10,
            max_attempts: None,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout_backoff: Duration::from_secs(self.timeout_backoff_secs),
            catching_up_backoff: Duration::from_secs(self.catching_up_backoff_secs),
            max_attempts: self.max_attempts,
        }
    }

    pub fn poller_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout_backoff: Duration::from_secs(self.poller_timeout_backoff_secs),
            ..self.policy()
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl LoggingConfig {
    /// Initialize the tracing subscriber on stderr. `RUST_LOG` takes precedence over `level`.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
            _ => {
                fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
    }
}

impl Config {
    /// Load `path` if it exists, apply environment overrides and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse `path`, falling back to defaults when the file does not exist.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::ReadFile(e)),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Override settings from variables found through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("BASE_URI_REST") {
            self.gateway.rest_url = url;
        }
        if let Some(url) = lookup("BASE_URI_COSMOS") {
            self.gateway.cosmos_url = url;
        }
        if let Some(value) = lookup("REQUEST_CONNECT_TIMEOUT_SEC") {
            self.gateway.connect_timeout_secs =
                parse_seconds("REQUEST_CONNECT_TIMEOUT_SEC", &value)?;
        }
        if let Some(value) = lookup("REQUEST_READ_TIMEOUT_SEC") {
            self.gateway.read_timeout_secs =
                parse_seconds("REQUEST_READ_TIMEOUT_SEC", &value)?;
        }
        if let Some(value) = lookup("SECONDS_BETWEEN_BLOCK_FETCH") {
            let secs = parse_seconds("SECONDS_BETWEEN_BLOCK_FETCH", &value)?;
            self.sync.poll_interval_secs = secs;
            self.sync.cycle_interval_secs = secs;
        }
        if let Some(value) = lookup("MAX_BLOCK_SPREAD_UPDATE_WALLET") {
            self.sync.max_wallet_stale_drift =
                parse_number("MAX_BLOCK_SPREAD_UPDATE_WALLET", &value)?;
        }
        if let Some(value) = lookup("MAX_BLOCK_SPREAD_FETCH_SOURCES") {
            self.sync.max_full_rescan_drift =
                parse_number("MAX_BLOCK_SPREAD_FETCH_SOURCES", &value)?;
        }
        if let Some(dir) = lookup("RICHLIST_DATA_DIR") {
            self.sync.data_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.rest_url.trim().is_empty() {
            return Err(invalid("rest_url", "must not be empty"));
        }
        if self.gateway.cosmos_url.trim().is_empty() {
            return Err(invalid("cosmos_url", "must not be empty"));
        }
        for (field, value) in [
            ("connect_timeout_secs", self.gateway.connect_timeout_secs),
            ("read_timeout_secs", self.gateway.read_timeout_secs),
            ("poll_interval_secs", self.sync.poll_interval_secs),
            ("cycle_interval_secs", self.sync.cycle_interval_secs),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }
        if self.sync.staking_denom.trim().is_empty() {
            return Err(invalid("staking_denom", "must not be empty"));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(invalid("max_attempts", "must be at least 1 when set"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

fn parse_number<T: FromStr>(field: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(field, &format!("'{}' is not a whole number", value)))
}

/// Seconds may be written with a fraction; they are rounded up to whole seconds.
fn parse_seconds(field: &'static str, value: &str) -> Result<u64, ConfigError> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|_| invalid(field, &format!("'{}' is not a number", value)))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(invalid(field, &format!("'{}' is not a duration", value)));
    }
    Ok(secs.ceil() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_file(dir.path().join("missing.toml")).unwrap();

        assert_eq!(config.sync.max_wallet_stale_drift, 2000);
        assert_eq!(config.sync.max_full_rescan_drift, 5000);
        assert_eq!(config.sync.staking_denom, "swth");
        assert_eq!(config.retry.policy(), RetryPolicy::default());
        assert_eq!(config.retry.poller_policy().timeout_backoff, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
[gateway]
rest_url = "http://node:5002"

[sync]
max_wallet_stale_drift = 100

[retry]
max_attempts = 5

[logging]
format = "json"
"#,
        )
        .unwrap();

        assert_eq!(config.gateway.rest_url, "http://node:5002");
        assert_eq!(config.gateway.cosmos_url, "http://127.0.0.1:1318");
        assert_eq!(config.sync.max_wallet_stale_drift, 100);
        assert_eq!(config.sync.cycle_interval_secs, 10);
        assert_eq!(config.retry.policy().max_attempts, Some(5));
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[
                ("BASE_URI_COSMOS", "http://lcd:1318"),
                ("REQUEST_READ_TIMEOUT_SEC", "2.5"),
                ("SECONDS_BETWEEN_BLOCK_FETCH", "3"),
                ("MAX_BLOCK_SPREAD_FETCH_SOURCES", "7000"),
                ("RICHLIST_DATA_DIR", "/tmp/wallets"),
            ]))
            .unwrap();

        assert_eq!(config.gateway.cosmos_url, "http://lcd:1318");
        assert_eq!(config.gateway.read_timeout_secs, 3);
        assert_eq!(config.sync.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.sync.scheduler_settings().cycle_interval, Duration::from_secs(3));
        assert_eq!(config.sync.scheduler_settings().max_full_rescan_drift, 7000);
        assert_eq!(config.sync.data_dir, PathBuf::from("/tmp/wallets"));
    }

    #[test]
    fn test_rejects_malformed_env_value() {
        let mut config = Config::default();
        let result =
            config.apply_env_overrides(env(&[("MAX_BLOCK_SPREAD_UPDATE_WALLET", "lots")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                field: "MAX_BLOCK_SPREAD_UPDATE_WALLET",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_empty_url_and_zero_interval() {
        let mut config = Config::default();
        config.gateway.rest_url = " ".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "rest_url", .. })
        ));

        let mut config = Config::default();
        config.sync.cycle_interval_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "cycle_interval_secs",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_unparseable_file() {
        assert!(matches!(
            Config::from_toml("[sync]\nmax_wallet_stale_drift = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
