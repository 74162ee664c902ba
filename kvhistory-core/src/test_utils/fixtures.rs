//! Test fixtures for building populated stores

use std::sync::Arc;

use crate::store::MemoryStore;
use crate::types::VersionRecord;

/// Store holding `versions` writes of `key`, each preceded by a write to an
/// unrelated key so revisions are not contiguous per key
///
/// Returns the store with the key's create and current mod revision.
pub fn store_with_interleaved_history(key: &str, versions: usize) -> (Arc<MemoryStore>, i64, i64) {
    let store = Arc::new(MemoryStore::new());
    let mut create = 0;
    let mut modr = 0;
    for i in 0..versions {
        store.put("unrelated", format!("noise-{}", i));
        modr = store.put(key, format!("value-{}", i + 1));
        if i == 0 {
            create = modr;
        }
    }
    (store, create, modr)
}

/// Store holding `versions` consecutive writes of `key`
///
/// Returns the store with the key's create and current mod revision.
pub fn store_with_history(key: &str, versions: usize) -> (Arc<MemoryStore>, i64, i64) {
    let store = Arc::new(MemoryStore::new());
    let mut create = 0;
    let mut modr = 0;
    for i in 0..versions {
        modr = store.put(key, format!("value-{}", i + 1));
        if i == 0 {
            create = modr;
        }
    }
    (store, create, modr)
}

/// Revisions of `records`, in the order given
pub fn revisions_of(records: &[VersionRecord]) -> Vec<i64> {
    records.iter().map(|r| r.revision).collect()
}
