//! Configuration management for kvhistory
//!
//! Layering, lowest to highest precedence: built-in defaults, an optional
//! TOML file, `KVHISTORY_*` environment variables, then whatever the CLI
//! applies on top. Loading never validates; call [`Config::validate`] once
//! the last layer is applied.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

mod error;

pub use error::ConfigError;

use crate::fetcher::{FetcherConfig, DEFAULT_CONCURRENCY_LIMIT};
use crate::logging::LogLevel;
use crate::retry::RetryPolicy;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store connection configuration
    pub store: StoreConfig,

    /// Fetch configuration
    pub fetch: FetchConfig,

    /// Per-read retry policy
    pub retry: RetryPolicy,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Store connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store endpoints
    pub endpoints: Vec<String>,

    /// Connection establishment timeout
    #[serde(with = "humantime_serde")]
    pub dial_timeout: Duration,

    /// Timeout of a single request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

/// Fetch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum point-in-time reads in flight
    pub concurrency_limit: usize,

    /// Deadline for the whole fetch (optional)
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoints: vec!["localhost:2379".to_string()],
            dial_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            timeout: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_format: false,
            with_target: false,
        }
    }
}

fn parse_var<T, F>(vars: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    vars(name)
        .map(|raw| {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
                var: name.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_var_duration<F>(vars: &F, name: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    vars(name)
        .map(|raw| {
            humantime_serde::re::humantime::parse_duration(raw.trim()).map_err(|e| {
                ConfigError::InvalidEnv {
                    var: name.to_string(),
                    reason: e.to_string(),
                }
            })
        })
        .transpose()
}

/// Reads a variable from the process environment
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl Config {
    /// Parse a TOML file; missing sections and keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults or `file`, then the variables `vars` resolves
    ///
    /// Variables follow the pattern KVHISTORY_<SECTION>_<KEY>, for example
    /// KVHISTORY_FETCH_CONCURRENCY_LIMIT=20. Pass [`process_env`] to read the
    /// real environment.
    pub fn load<F>(file: Option<&Path>, vars: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_vars(&vars)?;
        Ok(config)
    }

    fn apply_vars<F>(&mut self, vars: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Store config
        if let Some(endpoints) = vars("KVHISTORY_STORE_ENDPOINTS") {
            self.store.endpoints = split_endpoints(&endpoints);
        }
        if let Some(timeout) = parse_var_duration(vars, "KVHISTORY_STORE_DIAL_TIMEOUT")? {
            self.store.dial_timeout = timeout;
        }
        if let Some(timeout) = parse_var_duration(vars, "KVHISTORY_STORE_REQUEST_TIMEOUT")? {
            self.store.request_timeout = timeout;
        }

        // Fetch config
        if let Some(limit) = parse_var(vars, "KVHISTORY_FETCH_CONCURRENCY_LIMIT")? {
            self.fetch.concurrency_limit = limit;
        }
        if let Some(timeout) = parse_var_duration(vars, "KVHISTORY_FETCH_TIMEOUT")? {
            self.fetch.timeout = Some(timeout);
        }

        // Retry policy
        if let Some(attempts) = parse_var(vars, "KVHISTORY_RETRY_MAX_ATTEMPTS")? {
            self.retry.max_attempts = attempts;
        }
        if let Some(delay) = parse_var_duration(vars, "KVHISTORY_RETRY_BASE_DELAY")? {
            self.retry.base_delay = delay;
        }
        if let Some(delay) = parse_var_duration(vars, "KVHISTORY_RETRY_MAX_DELAY")? {
            self.retry.max_delay = delay;
        }
        if let Some(total) = parse_var_duration(vars, "KVHISTORY_RETRY_MAX_TOTAL_DURATION")? {
            self.retry.max_total_duration = total;
        }

        // Logging config
        if let Some(level) = vars("KVHISTORY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_var(vars, "KVHISTORY_LOG_JSON")? {
            self.logging.json_format = json;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate store config
        if self.store.endpoints.is_empty() || self.store.endpoints.iter().any(|e| e.is_empty()) {
            return Err(ConfigError::ValidationFailed(
                "store.endpoints needs at least one non-empty endpoint".to_string(),
            ));
        }

        // Validate fetch config
        if self.fetch.concurrency_limit == 0 {
            return Err(ConfigError::ValidationFailed(
                "fetch.concurrency_limit must be greater than 0".to_string(),
            ));
        }

        // Validate retry policy
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "retry.max_attempts must be greater than 0".to_string(),
            ));
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(ConfigError::ValidationFailed(format!(
                "retry.base_delay ({:?}) must not exceed retry.max_delay ({:?})",
                self.retry.base_delay, self.retry.max_delay
            )));
        }

        // Validate logging config
        if LogLevel::from_str(&self.logging.level).is_err() {
            return Err(ConfigError::ValidationFailed(format!(
                "logging.level is not a log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Fetcher settings derived from this configuration
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            concurrency_limit: self.fetch.concurrency_limit,
            retry_policy: self.retry,
        }
    }
}

/// Split a comma-separated endpoint list, dropping blanks
pub fn split_endpoints(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect()
}
