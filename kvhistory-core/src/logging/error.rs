//! Error types for the logging subsystem

use thiserror::Error;

/// Errors that can occur in the logging subsystem
#[derive(Debug, Clone, Error)]
pub enum LoggingError {
    /// Failed to initialize the logging system
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// Invalid configuration provided
    #[error("Invalid logging configuration: {0}")]
    InvalidConfiguration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_error_display() {
        let err = LoggingError::InitializationFailed("test error".to_string());
        assert_eq!(format!("{}", err), "Failed to initialize logging: test error");

        let err = LoggingError::InvalidConfiguration("bad level".to_string());
        assert_eq!(format!("{}", err), "Invalid logging configuration: bad level");
    }
}
