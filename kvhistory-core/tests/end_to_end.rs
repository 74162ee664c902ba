//! End-to-end history fetches against the in-memory store
//!
//! These tests drive `fetch_history` the way the CLI does:
//! - full and limited ranges in both orders
//! - single-revision keys
//! - interleaved writes to other keys
//! - failure, cancellation and deadline paths

use kvhistory_core::test_utils::{
    assert_completes_within, revisions_of, store_with_history, store_with_interleaved_history,
    DEFAULT_TEST_TIMEOUT,
};
use kvhistory_core::{
    fetch_history, CancelSignal, FetchRequest, FetcherConfig, HistoryError, MemoryStore,
    RetryPolicy, SortOrder,
};
use std::sync::Arc;
use std::time::Duration;

fn fast_retry() -> FetcherConfig {
    FetcherConfig {
        concurrency_limit: 10,
        retry_policy: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            max_total_duration: Duration::from_secs(1),
        },
    }
}

/// Key created at revision 5 and modified up to revision 8
fn store_created_at_5_modified_at_8() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for i in 1..=4 {
        store.put("warmup", format!("w{}", i));
    }
    for i in 1..=4 {
        store.put("app/config", format!("v{}", i));
    }
    assert_eq!(store.revision(), 8);
    store
}

#[tokio::test]
async fn descending_history_without_limit() -> anyhow::Result<()> {
    let store = store_created_at_5_modified_at_8();
    let request = FetchRequest::new("app/config").with_order(SortOrder::Descending);

    let records = fetch_history(store, &request, &fast_retry(), &CancelSignal::new()).await?;

    assert_eq!(revisions_of(&records), vec![8, 7, 6, 5]);
    let values: Vec<&str> = records.iter().map(|r| r.value.as_str()).collect();
    assert_eq!(values, vec!["v4", "v3", "v2", "v1"]);
    let versions: Vec<i64> = records.iter().map(|r| r.version).collect();
    assert_eq!(versions, vec![4, 3, 2, 1]);
    assert!(records.iter().all(|r| r.create_revision == 5));
    assert!(records.iter().all(|r| r.mod_revision == r.revision));
    Ok(())
}

#[tokio::test]
async fn ascending_history_with_limit() -> anyhow::Result<()> {
    let store = store_created_at_5_modified_at_8();
    let request = FetchRequest::new("app/config")
        .with_order(SortOrder::Ascending)
        .with_limit(2);

    let records = fetch_history(store, &request, &fast_retry(), &CancelSignal::new()).await?;

    assert_eq!(revisions_of(&records), vec![5, 6]);
    Ok(())
}

#[tokio::test]
async fn descending_limit_keeps_newest() -> anyhow::Result<()> {
    let store = store_created_at_5_modified_at_8();
    let request = FetchRequest::new("app/config").with_limit(3);

    let records = fetch_history(store, &request, &fast_retry(), &CancelSignal::new()).await?;

    assert_eq!(revisions_of(&records), vec![8, 7, 6]);
    Ok(())
}

#[tokio::test]
async fn single_revision_key() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    for i in 1..=4 {
        store.put("warmup", format!("w{}", i));
    }
    store.put("once", "only");

    for order in [SortOrder::Ascending, SortOrder::Descending] {
        for limit in [0, 1, 10] {
            let request = FetchRequest::new("once").with_order(order).with_limit(limit);
            let records =
                fetch_history(store.clone(), &request, &fast_retry(), &CancelSignal::new()).await?;

            assert_eq!(records.len(), 1);
            assert_eq!(records[0].revision, 5);
            assert_eq!(records[0].value, "only");
        }
    }
    Ok(())
}

#[tokio::test]
async fn interleaved_writes_repeat_values() -> anyhow::Result<()> {
    let (store, create, modr) = store_with_interleaved_history("k", 3);
    assert_eq!((create, modr), (2, 6));

    let request = FetchRequest::new("k").with_order(SortOrder::Ascending);
    let records = fetch_history(store, &request, &fast_retry(), &CancelSignal::new()).await?;

    // One record per revision in range, no dedup of unchanged values
    assert_eq!(revisions_of(&records), vec![2, 3, 4, 5, 6]);
    let mods: Vec<i64> = records.iter().map(|r| r.mod_revision).collect();
    assert_eq!(mods, vec![2, 2, 4, 4, 6]);
    Ok(())
}

#[tokio::test]
async fn large_history_under_concurrency_cap() -> anyhow::Result<()> {
    let (store, create, modr) = store_with_history("big", 500);
    store.set_latency(Duration::from_millis(1));
    let config = FetcherConfig {
        concurrency_limit: 8,
        ..fast_retry()
    };

    let records =
        fetch_history(store.clone(), &FetchRequest::new("big"), &config, &CancelSignal::new())
            .await?;

    assert_eq!(records.len(), 500);
    assert_eq!(records.first().map(|r| r.revision), Some(modr));
    assert_eq!(records.last().map(|r| r.revision), Some(create));
    assert!(records.windows(2).all(|w| w[0].revision > w[1].revision));
    assert!(store.max_in_flight() <= 8);
    assert_eq!(store.in_flight(), 0);
    Ok(())
}

#[tokio::test]
async fn exhausted_revision_aborts_everything() {
    let (store, _, _) = store_with_history("k", 30);
    store.fail_revision_always(17);

    let err = fetch_history(store.clone(), &FetchRequest::new("k"), &fast_retry(), &CancelSignal::new())
        .await
        .unwrap_err();

    assert_eq!(err.revision(), Some(17));
    assert!(err.to_string().contains("revision 17"));
    let line = format!("{:#}", anyhow::Error::from(err));
    assert_eq!(line.matches("injected failure at revision 17").count(), 1, "{line}");
    assert_eq!(store.in_flight(), 0);
    assert_eq!(Arc::strong_count(&store), 1);
}

#[tokio::test]
async fn deadline_cancels_slow_fetch() {
    let (store, _, _) = store_with_history("k", 100);
    store.set_latency(Duration::from_millis(200));

    let cancel = CancelSignal::new();
    cancel.cancel_after(Duration::from_millis(50));

    let result = assert_completes_within(
        DEFAULT_TEST_TIMEOUT,
        fetch_history(store.clone(), &FetchRequest::new("k"), &fast_retry(), &cancel),
    )
    .await;

    assert!(matches!(result, Err(HistoryError::Cancelled)));
    assert_eq!(store.in_flight(), 0);
}
