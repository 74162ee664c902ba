/*
    Metrics - fetch and read counters for monitoring

    Provides counters and histograms for:
    - Point-in-time reads (by result) and retries
    - Whole-fetch latency and result size

    Nothing is exported unless the embedding binary installs a recorder.
*/

use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    describe_counter!(
        "kvhistory_reads_total",
        "Total number of point-in-time reads completed, labeled by result (found, empty, failed)"
    );

    describe_counter!(
        "kvhistory_read_retries_total",
        "Total number of read attempts that failed and were retried after backoff"
    );

    describe_histogram!(
        "kvhistory_fetch_duration_seconds",
        "Duration of a whole history fetch, from plan to ordered result"
    );

    describe_histogram!(
        "kvhistory_records_returned",
        "Number of records returned per successful history fetch"
    );
}

/// Record a completed read
pub fn read_completed(result: &'static str) {
    counter!("kvhistory_reads_total", "result" => result).increment(1);
}

/// Record a retried read attempt
pub fn read_retried() {
    counter!("kvhistory_read_retries_total").increment(1);
}

/// Record fetch duration
pub fn fetch_duration(duration_secs: f64) {
    histogram!("kvhistory_fetch_duration_seconds").record(duration_secs);
}

/// Record result size of a successful fetch
pub fn records_returned(count: usize) {
    histogram!("kvhistory_records_returned").record(count as f64);
}
