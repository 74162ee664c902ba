//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A `KVHISTORY_*` variable held a value of the wrong shape
    #[error("invalid value for {var}: {reason}")]
    InvalidEnv { var: String, reason: String },

    /// The fully layered configuration is unusable
    #[error("invalid configuration: {0}")]
    ValidationFailed(String),
}
