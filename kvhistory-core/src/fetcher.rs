//! Bounded-concurrency revision fetcher
//!
//! One read unit per planned revision. The coordinator only spawns a unit
//! once it holds a slot from the semaphore, so at most `concurrency_limit`
//! reads are in flight and at most that many tasks exist at any time. Each
//! unit owns its slot and releases it when it ends, whatever the outcome.
//!
//! Fan-in is structured: every spawned unit lives in a [`JoinSet`] and is
//! joined before [`RevisionFetcher::fetch`] returns. The first failure
//! cancels a child of the caller's signal, which every unit races against,
//! and the coordinator then drains the set. If the fetch future itself is
//! dropped, the `JoinSet` aborts whatever is left.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

use crate::cancel::CancelSignal;
use crate::error::{HistoryError, HistoryResult};
use crate::metrics;
use crate::retry::{RetryError, RetryExecutor, RetryPolicy};
use crate::store::RevisionedStore;
use crate::types::VersionRecord;

/// Default number of reads allowed in flight at once
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 10;

/// Fetcher tuning, passed in explicitly per fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetcherConfig {
    /// Maximum concurrent reads; `0` is treated as `1`
    pub concurrency_limit: usize,
    /// Backoff applied to every read independently
    pub retry_policy: RetryPolicy,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            retry_policy: RetryPolicy::default(),
        }
    }
}

type UnitResult = HistoryResult<Option<VersionRecord>>;

/// Reads a key at many revisions concurrently
pub struct RevisionFetcher<S: ?Sized> {
    store: Arc<S>,
    config: FetcherConfig,
}

impl<S: RevisionedStore + ?Sized> RevisionFetcher<S> {
    pub fn new(store: Arc<S>, config: FetcherConfig) -> Self {
        Self { store, config }
    }

    /// Read `key` at every revision in `revisions`
    ///
    /// Returns one record per revision that held a value, in no particular
    /// order. Revisions at which the key had no value contribute nothing.
    /// Any revision that fails every retry fails the whole fetch, and a
    /// cancelled `cancel` yields [`HistoryError::Cancelled`].
    pub async fn fetch(
        &self,
        cancel: &CancelSignal,
        key: &str,
        revisions: &[i64],
    ) -> HistoryResult<Vec<VersionRecord>> {
        let limit = self.config.concurrency_limit.max(1);
        let slots = Arc::new(Semaphore::new(limit));
        let abort = cancel.child();
        let retry = RetryExecutor::new(self.config.retry_policy);
        let key: Arc<str> = Arc::from(key);

        let mut units: JoinSet<UnitResult> = JoinSet::new();
        let mut records = Vec::with_capacity(revisions.len());
        let mut failure: Option<HistoryError> = None;

        debug!(key = %key, planned = revisions.len(), concurrency = limit, "Dispatching revision reads");

        'dispatch: for &revision in revisions {
            let slot = loop {
                tokio::select! {
                    biased;
                    _ = abort.cancelled() => break 'dispatch,
                    Some(joined) = units.join_next(), if !units.is_empty() => {
                        if let Err(err) = absorb(joined, &mut records) {
                            failure = Some(err);
                            abort.cancel();
                            break 'dispatch;
                        }
                    }
                    permit = slots.clone().acquire_owned() => match permit {
                        Ok(permit) => break permit,
                        // The semaphore is never closed
                        Err(_) => break 'dispatch,
                    },
                }
            };

            units.spawn(read_unit(
                self.store.clone(),
                key.clone(),
                revision,
                retry,
                abort.clone(),
                slot,
            ));
        }

        while let Some(joined) = units.join_next().await {
            if let Err(err) = absorb(joined, &mut records) {
                if failure.is_none() {
                    failure = Some(err);
                    abort.cancel();
                }
            }
        }

        if let Some(err) = failure {
            if !err.is_cancelled() {
                warn!(key = %key, error = ?err, "History fetch failed");
            }
            return Err(err);
        }
        if abort.is_cancelled() {
            return Err(HistoryError::Cancelled);
        }

        debug!(key = %key, planned = revisions.len(), fetched = records.len(), "Revision reads complete");
        Ok(records)
    }
}

fn absorb(
    joined: Result<UnitResult, JoinError>,
    records: &mut Vec<VersionRecord>,
) -> HistoryResult<()> {
    match joined {
        Ok(Ok(Some(record))) => {
            records.push(record);
            Ok(())
        }
        Ok(Ok(None)) => Ok(()),
        Ok(Err(err)) => Err(err),
        Err(err) => Err(HistoryError::TaskFailed(err.to_string())),
    }
}

async fn read_unit<S: RevisionedStore + ?Sized>(
    store: Arc<S>,
    key: Arc<str>,
    revision: i64,
    retry: RetryExecutor,
    cancel: CancelSignal,
    _slot: OwnedSemaphorePermit,
) -> UnitResult {
    let result = retry
        .execute(&cancel, || store.get(&key, Some(revision)))
        .await;

    match result {
        Ok(Some(snapshot)) => {
            metrics::read_completed("found");
            Ok(Some(VersionRecord {
                version: snapshot.version,
                value: String::from_utf8_lossy(&snapshot.value).into_owned(),
                revision,
                create_revision: snapshot.create_revision,
                mod_revision: snapshot.mod_revision,
            }))
        }
        Ok(None) => {
            // Compacted or not yet written at this revision
            debug!(revision, "No value at revision");
            metrics::read_completed("empty");
            Ok(None)
        }
        Err(RetryError::Cancelled) => Err(HistoryError::Cancelled),
        Err(RetryError::Exhausted { attempts, source }) => {
            metrics::read_completed("failed");
            Err(HistoryError::RevisionFetchFailed { revision, attempts, source })
        }
    }
}
