//! Pipeline metrics
//!
//! Recorded through the `metrics` facade. Nothing is exported unless the
//! embedding process installs a recorder; without one every call is a no-op.

pub const RUNS_TOTAL: &str = "election_pipeline_runs_total";
pub const FAILURES_TOTAL: &str = "election_pipeline_failures_total";
pub const ROWS_PUBLISHED_TOTAL: &str = "election_rows_published_total";
pub const FETCH_DURATION_SECONDS: &str = "election_fetch_duration_seconds";

/// Metrics for contest-group pipeline runs
pub struct PipelineMetrics;

impl PipelineMetrics {
    pub fn record_run(group: &str) {
        ::metrics::counter!(RUNS_TOTAL, "group" => group.to_string()).increment(1);
    }

    /// Record a failed run, labelled with the stage it failed in
    pub fn record_failure(group: &str, stage: &str) {
        ::metrics::counter!(
            FAILURES_TOTAL,
            "group" => group.to_string(),
            "stage" => stage.to_string()
        )
        .increment(1);
    }

    pub fn record_rows_published(group: &str, rows: usize) {
        ::metrics::counter!(ROWS_PUBLISHED_TOTAL, "group" => group.to_string())
            .increment(rows as u64);
    }

    pub fn record_fetch_duration(source: &'static str, duration_secs: f64) {
        ::metrics::histogram!(FETCH_DURATION_SECONDS, "source" => source).record(duration_secs);
    }
}
