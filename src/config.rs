//! Service configuration: a TOML file plus environment overrides.
//!
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0:3000"
//!
//! [metrics]
//! url = "https://influx.example.net/api/v1/push/influx/write"
//! source = "jwt-pizza-service"
//! user_id = "123456"
//! api_key = "glc_..."
//! period_ms = 10000
//! ```

use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;
use crate::metrics::line_protocol::RESERVED;
use crate::metrics::scheduler::DEFAULT_PERIOD;

/// Env var naming the config file.
pub const CONFIG_PATH_VAR: &str = "PIZZA_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

/// Everything the publication pipeline needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Line-protocol push endpoint.
    pub url: String,
    /// Value of the `source=` tag on every record.
    pub source: String,
    /// Bearer identity; sent as `Bearer <user_id>:<api_key>`.
    pub user_id: String,
    pub api_key: String,
    /// Publication period in milliseconds.
    pub period_ms: u64,
    /// Per-push HTTP timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8086/api/v1/push/influx/write".into(),
            source: "jwt-pizza-service".into(),
            user_id: String::new(),
            api_key: String::new(),
            period_ms: DEFAULT_PERIOD.as_millis() as u64,
            timeout_ms: 5_000,
        }
    }
}

impl Config {
    /// File named by `PIZZA_CONFIG` (or `./config.toml` if present),
    /// then env overrides, then validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            Err(_) => Self::default(),
        };
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay values from `lookup` (the process environment in
    /// production, a map in tests).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("PIZZA_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = lookup("METRICS_URL") {
            self.metrics.url = v;
        }
        if let Some(v) = lookup("METRICS_SOURCE") {
            self.metrics.source = v;
        }
        if let Some(v) = lookup("METRICS_USER_ID") {
            self.metrics.user_id = v;
        }
        if let Some(v) = lookup("METRICS_API_KEY") {
            self.metrics.api_key = v;
        }
        if let Some(v) = lookup("METRICS_PERIOD_MS") {
            self.metrics.period_ms = parse_millis("METRICS_PERIOD_MS", v)?;
        }
        if let Some(v) = lookup("METRICS_TIMEOUT_MS") {
            self.metrics.timeout_ms = parse_millis("METRICS_TIMEOUT_MS", v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.metrics;
        reqwest::Url::parse(&m.url)
            .map_err(|e| ConfigError::Invalid(format!("metrics.url {:?}: {e}", m.url)))?;
        if m.source.is_empty() || m.source.contains(RESERVED) {
            return Err(ConfigError::Invalid(format!(
                "metrics.source {:?} must be non-empty and free of {:?}",
                m.source, RESERVED
            )));
        }
        if m.period_ms == 0 {
            return Err(ConfigError::Invalid("metrics.period_ms must be > 0".into()));
        }
        if m.timeout_ms == 0 {
            return Err(ConfigError::Invalid("metrics.timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

fn parse_millis(var: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}
