//! History fetch entry point
//!
//! Ties the pieces together: a current read of the key gives the
//! create/mod revision pair, the planner turns it into revisions, the
//! fetcher reads them and the orderer sorts the batch.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::cancel::CancelSignal;
use crate::error::{HistoryError, HistoryResult};
use crate::fetcher::{FetcherConfig, RevisionFetcher};
use crate::metrics;
use crate::orderer::order_records;
use crate::planner::plan_revisions;
use crate::retry::{RetryError, RetryExecutor};
use crate::store::RevisionedStore;
use crate::types::{FetchRequest, VersionRecord};

/// Reconstruct the value history of `request.key` from `store`
///
/// The result is ordered by revision in `request.order` and holds at most
/// `request.limit` records (all of them when the limit is `0`). Revisions at
/// which the key held no value, for instance because they were compacted,
/// are skipped, so the result can be shorter than the planned range.
pub async fn fetch_history<S: RevisionedStore + ?Sized>(
    store: Arc<S>,
    request: &FetchRequest,
    config: &FetcherConfig,
    cancel: &CancelSignal,
) -> HistoryResult<Vec<VersionRecord>> {
    let started = Instant::now();
    let key = request.key.as_str();

    let current = RetryExecutor::new(config.retry_policy)
        .execute(cancel, || store.get(key, None))
        .await
        .map_err(|err| match err {
            RetryError::Cancelled => HistoryError::Cancelled,
            RetryError::Exhausted { source, .. } => HistoryError::Store(source),
        })?
        .ok_or_else(|| HistoryError::NotFound { key: key.to_string() })?;

    let revisions = plan_revisions(
        current.create_revision,
        current.mod_revision,
        request.order,
        request.limit,
    )?;
    info!(
        key,
        create_revision = current.create_revision,
        mod_revision = current.mod_revision,
        order = %request.order,
        planned = revisions.len(),
        "Fetching key history"
    );

    let fetcher = RevisionFetcher::new(store, *config);
    let mut records = fetcher.fetch(cancel, key, &revisions).await?;
    if records.len() < revisions.len() {
        debug!(
            key,
            skipped = revisions.len() - records.len(),
            "Some revisions held no value for the key"
        );
    }

    order_records(&mut records, request.order);

    metrics::fetch_duration(started.elapsed().as_secs_f64());
    metrics::records_returned(records.len());
    info!(key, records = records.len(), elapsed = ?started.elapsed(), "Key history fetched");

    Ok(records)
}

/// Connect to the etcd endpoints of `request` and fetch the key's history
#[cfg(feature = "etcd")]
pub async fn connect_and_fetch(
    request: &FetchRequest,
    config: &crate::config::Config,
    cancel: &CancelSignal,
) -> HistoryResult<Vec<VersionRecord>> {
    use crate::store::EtcdStore;

    let connect = EtcdStore::connect(
        &request.endpoints,
        request.credentials.as_ref(),
        config.store.dial_timeout,
        config.store.request_timeout,
    );
    let store = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(HistoryError::Cancelled),
        store = connect => store?,
    };

    fetch_history(Arc::new(store), request, &config.fetcher_config(), cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::{revisions_of, store_with_history};
    use crate::types::SortOrder;

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        store.put("other", "x");

        let err = fetch_history(
            store,
            &FetchRequest::new("missing"),
            &FetcherConfig::default(),
            &CancelSignal::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, HistoryError::NotFound { key } if key == "missing"));
    }

    #[tokio::test]
    async fn test_deleted_key_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        store.put("k", "a");
        store.delete("k");

        let result = fetch_history(
            store,
            &FetchRequest::new("k"),
            &FetcherConfig::default(),
            &CancelSignal::new(),
        )
        .await;

        assert!(matches!(result, Err(HistoryError::NotFound { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_read_failure_is_store_error() {
        let (store, _, _) = store_with_history("k", 3);
        store.fail_current_reads(true);

        let result = fetch_history(
            store,
            &FetchRequest::new("k"),
            &FetcherConfig::default(),
            &CancelSignal::new(),
        )
        .await;

        assert!(matches!(result, Err(HistoryError::Store(_))));
    }

    #[tokio::test]
    async fn test_limit_and_order() {
        let (store, _, _) = store_with_history("k", 6);
        let request = FetchRequest::new("k").with_order(SortOrder::Ascending).with_limit(3);

        let records = fetch_history(store, &request, &FetcherConfig::default(), &CancelSignal::new())
            .await
            .unwrap();

        assert_eq!(revisions_of(&records), vec![1, 2, 3]);
        assert_eq!(records[0].value, "value-1");
        assert_eq!(records[2].version, 3);
    }

    #[tokio::test]
    async fn test_history_after_recreate_starts_at_new_lifetime() {
        let store = Arc::new(MemoryStore::new());
        store.put("k", "old"); // 1
        store.delete("k"); // 2
        store.put("k", "new-1"); // 3
        store.put("k", "new-2"); // 4

        let records = fetch_history(
            store,
            &FetchRequest::new("k"),
            &FetcherConfig::default(),
            &CancelSignal::new(),
        )
        .await
        .unwrap();

        assert_eq!(revisions_of(&records), vec![4, 3]);
        assert!(records.iter().all(|r| r.create_revision == 3));
        assert!(records.iter().all(|r| r.value.starts_with("new")));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (store, _, _) = store_with_history("k", 3);
        let cancel = CancelSignal::new();
        cancel.cancel();

        let result = fetch_history(store.clone(), &FetchRequest::new("k"), &FetcherConfig::default(), &cancel).await;

        assert!(matches!(result, Err(HistoryError::Cancelled)));
        assert_eq!(store.reads(), 0);
    }
}
