//! Configuration file handling.
//!
//! This module handles loading, validating and merging configuration from
//! `.whatif.toml` files. Endpoint URLs named through `url_env` are resolved
//! here, once, so the aggregator itself never reads the environment.

use crate::aggregator::engine::validate_endpoints;
use crate::aggregator::AggregatorOptions;
use crate::cli::OutputFormat;
use crate::endpoint::{default_endpoints, EndpointDescriptor};
use crate::retry::RetryPolicy;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".whatif.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Retry settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// HTTP API settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Prediction endpoint table.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<EndpointDescriptor>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            retry: RetryConfig::default(),
            server: ServerConfig::default(),
            endpoints: default_endpoints(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Report format.
    #[serde(default)]
    pub format: ReportFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl GeneralConfig {
    /// Log level for these settings. `quiet` wins over `verbose`.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

/// Report format as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

impl From<ReportFormat> for OutputFormat {
    fn from(format: ReportFormat) -> Self {
        match format {
            ReportFormat::Markdown => OutputFormat::Markdown,
            ReportFormat::Json => OutputFormat::Json,
        }
    }
}

/// Retry and timeout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per endpoint, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between attempts in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Timeout for a single attempt in seconds.
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_seconds: u64,

    /// Overall time limit per endpoint in seconds, retries included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_deadline_seconds: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            attempt_timeout_seconds: default_attempt_timeout(),
            endpoint_deadline_seconds: None,
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_attempt_timeout() -> u64 {
    30
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.delay_ms))
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_seconds)
    }

    pub fn options(&self) -> AggregatorOptions {
        AggregatorOptions {
            attempt_timeout: Some(self.attempt_timeout()),
            endpoint_deadline: self.endpoint_deadline_seconds.map(Duration::from_secs),
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the API listens on.
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

impl ServerConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .with_context(|| format!("Invalid listen address: {}", self.listen))
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Fill `base_url` from `url_env` for endpoints that have no URL yet.
    pub fn resolve_env(&mut self) {
        self.resolve_with(|name| std::env::var(name).ok());
    }

    /// Same as [`Config::resolve_env`] with an injectable lookup.
    pub fn resolve_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for endpoint in &mut self.endpoints {
            if endpoint.base_url.is_some() {
                continue;
            }
            let Some(ref var) = endpoint.url_env else {
                continue;
            };
            match lookup(var).filter(|v| !v.trim().is_empty()) {
                Some(url) => {
                    debug!("Endpoint {} uses ${}", endpoint.key, var);
                    endpoint.base_url = Some(url);
                }
                None => debug!("Endpoint {}: ${} is not set", endpoint.key, var),
            }
        }
    }

    /// Check the endpoint table and retry settings.
    pub fn validate(&self) -> Result<()> {
        validate_endpoints(&self.endpoints)?;

        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if self.retry.attempt_timeout_seconds == 0 {
            bail!("retry.attempt_timeout_seconds must be at least 1");
        }

        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(format) = args.format {
            self.general.format = match format {
                OutputFormat::Markdown => ReportFormat::Markdown,
                OutputFormat::Json => ReportFormat::Json,
            };
        }

        if let Some(attempts) = args.max_attempts {
            self.retry.max_attempts = attempts;
        }
        if let Some(delay) = args.retry_delay_ms {
            self.retry.delay_ms = delay;
        }
        if let Some(timeout) = args.timeout {
            self.retry.attempt_timeout_seconds = timeout;
        }

        if let Some(ref listen) = args.listen {
            self.server.listen = listen.clone();
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay_ms, 1000);
        assert_eq!(config.endpoints.len(), 7);
        assert_eq!(config.server.listen, "127.0.0.1:8080");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
format = "json"

[retry]
max_attempts = 3
delay_ms = 250

[[endpoints]]
key = "economic"
base_url = "http://localhost:9000"
request = "scenario"

[endpoints.response]
kind = "prediction"
field = "predicted_economic_impact_million_usd"

[[endpoints]]
key = "electricity"
url_env = "ELECTRICITY_API"
request = "start_date"
path = ""

[endpoints.response]
kind = "graph"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.format, ReportFormat::Json);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.attempt_timeout_seconds, 30);
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(
            config.endpoints[0].url().as_deref(),
            Some("http://localhost:9000/economic")
        );
        assert_eq!(config.endpoints[1].response.field(), "");
        assert_eq!(
            config.retry.policy(),
            RetryPolicy::new(3, Duration::from_millis(250))
        );
    }

    #[test]
    fn test_verbose_setting_drives_log_level() {
        use clap::Parser;

        let config: Config = toml::from_str("[general]\nverbose = true\n").unwrap();
        assert_eq!(config.general.log_level(false), tracing::Level::DEBUG);
        assert_eq!(config.general.log_level(true), tracing::Level::ERROR);

        let mut config = Config::default();
        assert_eq!(config.general.log_level(false), tracing::Level::INFO);

        let args = crate::cli::Args::parse_from(["whatif", "-s", "heatwave", "-v"]);
        config.merge_with_args(&args);
        assert_eq!(config.general.log_level(args.quiet), tracing::Level::DEBUG);
    }

    #[test]
    fn test_resolve_env() {
        let mut config = Config::default();
        config.endpoints[0].base_url = Some("http://explicit".to_string());

        let vars: HashMap<&str, &str> = [
            ("ECONOMIC_API", "http://ignored"),
            ("CROP_API", "http://crop"),
            ("ELECTRICITY_API", "  "),
        ]
        .into_iter()
        .collect();
        config.resolve_with(|name| vars.get(name).map(|v| v.to_string()));

        let url = |key: &str| {
            config
                .endpoints
                .iter()
                .find(|e| e.key == key)
                .and_then(|e| e.base_url.clone())
        };
        assert_eq!(url("predict_economic_impact").as_deref(), Some("http://explicit"));
        assert_eq!(url("predict_croprate").as_deref(), Some("http://crop"));
        assert_eq!(url("predict_electricity"), None);
        assert_eq!(url("humidity_prediction"), None);
    }

    #[test]
    fn test_validate_rejects_bad_tables() {
        let mut config = Config::default();
        config.endpoints[1].key = config.endpoints[0].key.clone();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.endpoints.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[server]\nlisten = \"0.0.0.0:9090\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.server.listen_addr().unwrap(),
            "0.0.0.0:9090".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(config.endpoints.len(), 7);

        std::fs::write(&path, "[retry\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_default_toml_round_trip() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[retry]"));
        assert!(toml_str.contains("[[endpoints]]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.endpoints, Config::default().endpoints);
    }
}
