//! Store client seam
//!
//! The fetch pipeline only needs one operation from a store: read a key,
//! either at the current revision or at an exact past one. Connection setup
//! and authentication happen before a [`RevisionedStore`] is handed over.

use async_trait::async_trait;

use crate::error::StoreError;

#[cfg(feature = "etcd")]
mod etcd;
mod memory;

#[cfg(feature = "etcd")]
pub use etcd::EtcdStore;
pub use memory::MemoryStore;

/// A key's value and revision metadata as returned by one read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySnapshot {
    pub value: Vec<u8>,
    pub version: i64,
    pub create_revision: i64,
    pub mod_revision: i64,
}

/// Point-in-time reads against a revisioned key-value store
#[async_trait]
pub trait RevisionedStore: Send + Sync + 'static {
    /// Read `key` at `revision`, or at the current revision when `None`
    ///
    /// `Ok(None)` means the key held no value at that revision.
    async fn get(&self, key: &str, revision: Option<i64>) -> Result<Option<KeySnapshot>, StoreError>;
}

