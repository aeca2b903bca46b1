use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Metric name prefix for all hydrator metrics
const PREFIX: &str = "notification_hydrator";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_runs_total"), "Total number of pipeline runs"),
        &["outcome"]
    ).expect("Failed to create runs_total metric");

    pub static ref RUN_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_run_duration_seconds"),
            "Pipeline run duration in seconds"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0])
    ).expect("Failed to create run_duration_seconds metric");

    pub static ref FETCH_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_fetch_failures_total"), "Entity fetches that failed"),
        &["entity", "kind"]
    ).expect("Failed to create fetch_failures_total metric");
}

/// Outcome label of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Payload returned and written to the store.
    Saved,
    /// Payload returned, write skipped (cold start or incomplete run).
    NotSaved,
    /// Nothing to do: missing identifiers or unknown server.
    Skipped,
    /// The run body failed unexpectedly.
    Failed,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Saved => "saved",
            RunOutcome::NotSaved => "not_saved",
            RunOutcome::Skipped => "skipped",
            RunOutcome::Failed => "failed",
        }
    }
}

pub fn init_metrics() {
    // Ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(RUN_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(FETCH_FAILURES_TOTAL.clone()));

    tracing::debug!("Metrics initialized");
}

pub fn record_run(outcome: RunOutcome, duration: Duration) {
    RUNS_TOTAL.with_label_values(&[outcome.as_str()]).inc();
    RUN_DURATION_SECONDS.observe(duration.as_secs_f64());
}

pub fn record_fetch_failure(entity: &str, kind: &str) {
    FETCH_FAILURES_TOTAL.with_label_values(&[entity, kind]).inc();
}

/// Render every registered metric in the Prometheus text format.
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
