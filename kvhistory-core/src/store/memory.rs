//! In-process MVCC store
//!
//! Keeps every write of every key so reads at any past revision can be
//! answered the way etcd answers them. Reads can be slowed down or made to
//! fail per revision, and the store counts how many reads are in flight at
//! once, which is what the fetcher tests assert against.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use super::{KeySnapshot, RevisionedStore};
use crate::error::StoreError;

#[derive(Debug, Clone)]
enum Event {
    Put(KeySnapshot),
    Delete { revision: i64 },
}

impl Event {
    fn revision(&self) -> i64 {
        match self {
            Event::Put(snapshot) => snapshot.mod_revision,
            Event::Delete { revision } => *revision,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    revision: i64,
    history: HashMap<String, Vec<Event>>,
    /// Remaining injected failures per revision, `None` fails forever
    failures: HashMap<i64, Option<u32>>,
    fail_current_read: bool,
}

/// MVCC key-value store held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    latency: RwLock<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    reads: AtomicUsize,
}

struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `value`, returning the new store revision
    pub fn put(&self, key: &str, value: impl Into<Vec<u8>>) -> i64 {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.revision += 1;
        let revision = state.revision;

        let events = state.history.entry(key.to_string()).or_default();
        let current = match events.last() {
            Some(Event::Put(snapshot)) => Some(snapshot.clone()),
            _ => None,
        };
        let snapshot = match current {
            Some(prev) => KeySnapshot {
                value: value.into(),
                version: prev.version + 1,
                create_revision: prev.create_revision,
                mod_revision: revision,
            },
            None => KeySnapshot {
                value: value.into(),
                version: 1,
                create_revision: revision,
                mod_revision: revision,
            },
        };
        events.push(Event::Put(snapshot));
        revision
    }

    /// Delete `key`, returning the new store revision
    pub fn delete(&self, key: &str) -> i64 {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.revision += 1;
        let revision = state.revision;
        state
            .history
            .entry(key.to_string())
            .or_default()
            .push(Event::Delete { revision });
        revision
    }

    /// Current store revision
    pub fn revision(&self) -> i64 {
        self.state.read().unwrap_or_else(|e| e.into_inner()).revision
    }

    /// Delay every read by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// Fail the next `times` reads at `revision`
    pub fn fail_revision(&self, revision: i64, times: u32) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.failures.insert(revision, Some(times));
    }

    /// Fail every read at `revision`
    pub fn fail_revision_always(&self, revision: i64) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.failures.insert(revision, None);
    }

    /// Make reads without an explicit revision fail
    pub fn fail_current_reads(&self, enabled: bool) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).fail_current_read = enabled;
    }

    /// Reads currently executing
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of reads observed executing at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Reads started so far, including failed ones
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InFlight<'_> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight { counter: &self.in_flight }
    }

    fn read(&self, key: &str, revision: Option<i64>) -> Result<Option<KeySnapshot>, StoreError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        let at = match revision {
            None if state.fail_current_read => {
                return Err(StoreError::Unavailable("injected failure".to_string()))
            }
            None => state.revision,
            Some(rev) => {
                if let Some(remaining) = state.failures.get_mut(&rev) {
                    match remaining {
                        None => {
                            return Err(StoreError::Unavailable(format!(
                                "injected failure at revision {}",
                                rev
                            )))
                        }
                        Some(0) => {}
                        Some(n) => {
                            *n -= 1;
                            return Err(StoreError::Unavailable(format!(
                                "injected failure at revision {}",
                                rev
                            )));
                        }
                    }
                }
                if rev > state.revision {
                    return Err(StoreError::Request(format!(
                        "required revision {} is a future revision",
                        rev
                    )));
                }
                rev
            }
        };

        let snapshot = state.history.get(key).and_then(|events| {
            match events.iter().rev().find(|event| event.revision() <= at) {
                Some(Event::Put(snapshot)) => Some(snapshot.clone()),
                _ => None,
            }
        });
        Ok(snapshot)
    }
}

#[async_trait]
impl RevisionedStore for MemoryStore {
    async fn get(&self, key: &str, revision: Option<i64>) -> Result<Option<KeySnapshot>, StoreError> {
        let _guard = self.enter();

        let latency = *self.latency.read().unwrap_or_else(|e| e.into_inner());
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.read(key, revision)
    }
}
