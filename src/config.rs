//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - presto-adapter.toml (default configuration)
//! - presto-adapter.local.toml (git-ignored local overrides)
//! - Environment variables (PRESTO_ADAPTER_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # presto-adapter.toml
//! [client]
//! host = "presto.internal"
//! port = 8080
//! catalog = "hive"
//!
//! [pool]
//! concurrency_limit = 4
//! frequency_limit = 10
//! frequency_window_ms = 1000
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! PRESTO_ADAPTER_CLIENT__HOST=localhost
//! PRESTO_ADAPTER_LIMITS__ROW_LIMIT=5000
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::execution::ExecutionLimits;

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection settings for the Presto coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Sent as `X-Presto-User`
    #[serde(default = "default_user")]
    pub user: String,

    /// Sent as `X-Presto-Source`
    #[serde(default = "default_source")]
    pub source: String,

    /// Default catalog for unqualified names
    #[serde(default)]
    pub catalog: Option<String>,

    /// Default schema for unqualified names
    #[serde(default)]
    pub schema: Option<String>,

    /// Use https (disable only for local test clusters)
    #[serde(default = "default_true")]
    pub ssl: bool,

    /// Delay between `nextUri` polls when a page carried no rows
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request HTTP timeout in milliseconds. 0 = no timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Submission pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of queries in flight at once
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Maximum number of query starts per window
    #[serde(default = "default_frequency_limit")]
    pub frequency_limit: usize,

    /// Length of the sliding rate window in milliseconds
    #[serde(default = "default_frequency_window_ms")]
    pub frequency_window_ms: u64,
}

/// Default result ceilings applied to `execute`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum rows collected per query. 0 = stop on the first row.
    #[serde(default = "default_row_limit")]
    pub row_limit: usize,

    /// Maximum estimated result bytes collected per query
    #[serde(default = "default_byte_limit")]
    pub byte_limit: usize,

    /// Query timeout in milliseconds. 0 = no timeout.
    #[serde(default)]
    pub query_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_user() -> String {
    "presto-adapter".to_string()
}
fn default_source() -> String {
    "presto-adapter".to_string()
}
fn default_true() -> bool {
    true
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_concurrency_limit() -> usize {
    10
}
fn default_frequency_limit() -> usize {
    10
}
fn default_frequency_window_ms() -> u64 {
    1000
}
fn default_row_limit() -> usize {
    1000
}
fn default_byte_limit() -> usize {
    1_048_576 // 1 MiB
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. presto-adapter.toml (base configuration)
    /// 2. presto-adapter.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (PRESTO_ADAPTER_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("presto-adapter.toml"))
            .merge(Toml::file("presto-adapter.local.toml"))
            .merge(Env::prefixed("PRESTO_ADAPTER_").split("__"))
            .extract()
    }

    /// Load configuration from specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("PRESTO_ADAPTER_").split("__"))
            .extract()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            client: ClientConfig::default(),
            pool: PoolConfig::default(),
            limits: LimitsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Coordinator base URL, e.g. `https://presto.internal:8080`
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

impl PoolConfig {
    pub fn frequency_window(&self) -> Duration {
        Duration::from_millis(self.frequency_window_ms)
    }
}

impl LimitsConfig {
    pub fn execution_limits(&self) -> ExecutionLimits {
        ExecutionLimits::new(self.row_limit, self.byte_limit)
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        (self.query_timeout_ms > 0).then(|| Duration::from_millis(self.query_timeout_ms))
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }

    /// This config with `PA_TRACE_LEVEL` and `PA_TRACE_JSON` applied
    pub fn with_env_overrides(&self) -> LoggingConfig {
        self.overridden(
            std::env::var("PA_TRACE_LEVEL").ok(),
            std::env::var("PA_TRACE_JSON").ok(),
        )
    }

    fn overridden(&self, level: Option<String>, json: Option<String>) -> LoggingConfig {
        let format = match json.as_deref() {
            Some("0") => "text".to_string(),
            Some(_) => "json".to_string(),
            None => self.format.clone(),
        };
        LoggingConfig {
            level: level.unwrap_or_else(|| self.level.clone()),
            format,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            source: default_source(),
            catalog: None,
            schema: None,
            ssl: true,
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            concurrency_limit: default_concurrency_limit(),
            frequency_limit: default_frequency_limit(),
            frequency_window_ms: default_frequency_window_ms(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            row_limit: default_row_limit(),
            byte_limit: default_byte_limit(),
            query_timeout_ms: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
