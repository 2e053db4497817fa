//! Configuration for the reader
//!
//! TOML-backed configuration with environment variable overrides and
//! sensible defaults. Only the throttling section influences the evaluation
//! core; the server section is plain data handed to the (external) HTTP
//! layer.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::throttling::ThrottlingConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Listen address for the external HTTP layer
    #[serde(default)]
    pub server: ServerConfig,

    /// Query evaluation tuning
    #[serde(default)]
    pub query: QueryConfig,

    /// Monitoring and observability
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Admission control rules
    #[serde(default)]
    pub throttling: ThrottlingConfig,
}

/// Server configuration (consumed by the external HTTP layer)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Query evaluation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Simultaneous outstanding storage fetches per request
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

/// Monitoring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Enable the Prometheus registry
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_fetch_concurrency() -> usize {
    8
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Load configuration with environment variable overrides applied
    pub fn from_file_with_env(path: &str) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("READER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("READER_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.monitoring.log_level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server port cannot be 0".to_string()));
        }
        if self.query.fetch_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "query.fetch_concurrency must be > 0".to_string(),
            ));
        }
        if self.throttling.window_secs == 0 {
            return Err(ConfigError::Invalid(
                "throttling.window_secs must be > 0".to_string(),
            ));
        }
        for (tenant, rule) in &self.throttling.tenants {
            if rule.max_concurrent == 0 {
                return Err(ConfigError::Invalid(format!(
                    "throttling rule for '{}' has max_concurrent = 0",
                    tenant
                )));
            }
        }
        Ok(())
    }
}
