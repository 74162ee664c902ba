//! Error types for history fetches

use thiserror::Error;

/// Result type for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Failures reported by a store client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected or failed the request
    #[error("store request failed: {0}")]
    Request(String),
}

/// Errors that can end a history fetch
#[derive(Error, Debug)]
pub enum HistoryError {
    /// The key has no current value
    #[error("key '{key}' not found")]
    NotFound { key: String },

    /// A revision read failed every retry attempt
    #[error("failed to get history at revision {revision} after {attempts} attempt(s)")]
    RevisionFetchFailed {
        revision: i64,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// The caller cancelled the fetch or its deadline expired
    #[error("history fetch cancelled")]
    Cancelled,

    /// Connection setup failed
    #[error("failed to connect to store: {0}")]
    Connection(String),

    /// The current read of the key failed
    #[error("failed to get key")]
    Store(#[from] StoreError),

    /// The key's create/mod revision pair cannot be walked
    #[error("invalid revision range: create_revision {create_revision}, mod_revision {mod_revision}")]
    InvalidRevisionRange { create_revision: i64, mod_revision: i64 },

    /// A read task panicked or was torn down unexpectedly
    #[error("read task failed: {0}")]
    TaskFailed(String),
}

impl HistoryError {
    /// Revision that caused the failure, if it was a per-revision read
    pub fn revision(&self) -> Option<i64> {
        match self {
            HistoryError::RevisionFetchFailed { revision, .. } => Some(*revision),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, HistoryError::Cancelled)
    }
}
