//! Request and record types shared across the fetch pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A key as it existed at one store revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Per-key write counter at this revision
    pub version: i64,
    /// Stored value, decoded as UTF-8 (lossy)
    pub value: String,
    /// The revision this snapshot was read at
    pub revision: i64,
    /// Revision at which the key's current lifetime began
    pub create_revision: i64,
    /// Revision of the write that produced this value
    pub mod_revision: i64,
}

/// Direction in which revisions are walked and results are returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "asc")]
    Ascending,
    #[default]
    #[serde(rename = "desc")]
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            other => Err(format!("unsupported sort order '{}', expected asc or desc", other)),
        }
    }
}

/// Store credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Parameters of one history fetch
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Store endpoints, e.g. `localhost:2379`
    pub endpoints: Vec<String>,
    /// Key whose history is reconstructed
    pub key: String,
    /// Maximum number of revisions to read, `0` for no limit
    pub limit: usize,
    /// Walk and result order
    pub order: SortOrder,
    /// Optional authentication
    pub credentials: Option<Credentials>,
}

impl FetchRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            endpoints: vec!["localhost:2379".to_string()],
            key: key.into(),
            limit: 0,
            order: SortOrder::default(),
            credentials: None,
        }
    }

    pub fn with_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}
