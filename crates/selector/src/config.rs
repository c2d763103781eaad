//! Selector configuration

use anyhow::{Context, Result};
use selector_lib::{ConfigError, RoundConfig, ScoreWeights, ServerEndpoint};
use serde::Deserialize;
use std::time::Duration;

/// Environment variable naming an optional config file
pub const CONFIG_PATH_ENV: &str = "SELECTOR_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "selector.toml";

/// Daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// Name attached to structured log events
    #[serde(default = "default_instance")]
    pub instance: String,

    /// Port for health, metrics and report endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Servers to probe, as `[id=]host:port`
    #[serde(default)]
    pub servers: Vec<String>,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_round_interval_ms")]
    pub round_interval_ms: u64,

    #[serde(default)]
    pub max_rounds: Option<u64>,

    #[serde(default)]
    pub weights: ScoreWeights,

    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    #[serde(default = "default_anti_stick_penalty")]
    pub anti_stick_penalty: f64,

    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_threshold: f64,

    #[serde(default = "default_anomaly_surcharge")]
    pub anomaly_surcharge: f64,

    #[serde(default = "default_bandwidth_cap")]
    pub bandwidth_cap_mbps: f64,

    #[serde(default = "default_series_capacity")]
    pub series_capacity: usize,

    /// Fixed seed for exploration; drawn from OS entropy when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "server-selector".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_history_capacity() -> usize {
    RoundConfig::default().history_capacity
}

fn default_probe_timeout_ms() -> u64 {
    RoundConfig::default().probe_timeout.as_millis() as u64
}

fn default_round_interval_ms() -> u64 {
    RoundConfig::default().round_interval.as_millis() as u64
}

fn default_epsilon() -> f64 {
    RoundConfig::default().epsilon
}

fn default_anti_stick_penalty() -> f64 {
    RoundConfig::default().anti_stick_penalty
}

fn default_anomaly_threshold() -> f64 {
    RoundConfig::default().anomaly_threshold
}

fn default_anomaly_surcharge() -> f64 {
    RoundConfig::default().anomaly_surcharge
}

fn default_bandwidth_cap() -> f64 {
    RoundConfig::default().bandwidth_cap_mbps
}

fn default_series_capacity() -> usize {
    RoundConfig::default().series_capacity
}

impl SelectorConfig {
    /// Load configuration from an optional file overlaid with environment
    ///
    /// Environment keys use the `SELECTOR_` prefix; nested weights use a
    /// double underscore (`SELECTOR_WEIGHTS__RTT`). `SELECTOR_SERVERS` is a
    /// comma-separated list.
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("SELECTOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("servers"),
            )
            .build()
            .with_context(|| format!("Failed to read configuration (file: {})", path))?;

        Self::from_config(config)
    }

    fn from_config(config: config::Config) -> Result<Self> {
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Parse the configured server list, preserving order
    pub fn endpoints(&self) -> Result<Vec<ServerEndpoint>, ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::EmptyServerSet);
        }
        self.servers.iter().map(|s| s.parse::<ServerEndpoint>()).collect()
    }

    pub fn round_config(&self) -> RoundConfig {
        RoundConfig {
            history_capacity: self.history_capacity,
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            round_interval: Duration::from_millis(self.round_interval_ms),
            max_rounds: self.max_rounds,
            weights: self.weights,
            epsilon: self.epsilon,
            anti_stick_penalty: self.anti_stick_penalty,
            anomaly_threshold: self.anomaly_threshold,
            anomaly_surcharge: self.anomaly_surcharge,
            bandwidth_cap_mbps: self.bandwidth_cap_mbps,
            series_capacity: self.series_capacity,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn parse(toml: &str) -> SelectorConfig {
        let config = config::Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap();
        SelectorConfig::from_config(config).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse("");
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.history_capacity, 10);
        assert_eq!(config.probe_timeout_ms, 600);
        assert_eq!(config.round_interval_ms, 1000);
        assert_eq!(config.epsilon, 0.2);
        assert_eq!(config.anti_stick_penalty, 0.03);
        assert_eq!(config.weights, ScoreWeights::default());
        assert!(config.max_rounds.is_none());
        assert!(matches!(config.endpoints(), Err(ConfigError::EmptyServerSet)));
    }

    #[test]
    fn test_file_values() {
        let config = parse(
            r#"
            servers = ["edge=10.0.0.1:8001", "127.0.0.1:8002"]
            epsilon = 0.0
            max_rounds = 30
            round_interval_ms = 250

            [weights]
            rtt = 2.0
            "#,
        );

        let endpoints = config.endpoints().unwrap();
        assert_eq!(endpoints[0].id.as_str(), "edge");
        assert_eq!(endpoints[1].id.as_str(), "8002");

        let round = config.round_config();
        assert_eq!(round.epsilon, 0.0);
        assert_eq!(round.max_rounds, Some(30));
        assert_eq!(round.round_interval, Duration::from_millis(250));
        assert_eq!(round.weights.rtt, 2.0);
        assert_eq!(round.weights.load, 0.5);
        assert!(round.validate().is_ok());
    }

    #[test]
    fn test_invalid_endpoint() {
        let config = parse(r#"servers = ["localhost"]"#);
        assert!(matches!(
            config.endpoints(),
            Err(ConfigError::InvalidEndpoint(_))
        ));
    }
}
