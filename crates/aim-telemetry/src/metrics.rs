//! Prometheus metrics for AIM services.
//!
//! All metrics follow the naming convention: `aim_<area>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // DISPATCHER METRICS
    // =========================================================================

    /// Tickets admitted
    pub static ref JOBS_SUBMITTED: IntCounter = IntCounter::new(
        "aim_dispatcher_jobs_submitted_total",
        "Total number of jobs admitted to the dispatcher"
    ).expect("metric creation failed");

    /// Tickets completed, by outcome
    pub static ref JOBS_COMPLETED: IntCounterVec = IntCounterVec::new(
        Opts::new("aim_dispatcher_jobs_completed_total", "Total jobs completed"),
        &["outcome"]  // outcome: succeeded/failed/panicked/timed_out
    ).expect("metric creation failed");

    /// Tickets queued or running
    pub static ref PENDING_JOBS: IntGauge = IntGauge::new(
        "aim_dispatcher_pending_jobs",
        "Number of tickets queued or running"
    ).expect("metric creation failed");

    /// Tickets running
    pub static ref RUNNING_JOBS: IntGauge = IntGauge::new(
        "aim_dispatcher_running_jobs",
        "Number of tickets currently running"
    ).expect("metric creation failed");

    /// Execution time from promotion to completion
    pub static ref JOB_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "aim_dispatcher_job_duration_seconds",
            "Time spent executing jobs"
        ).buckets(exponential_buckets(0.001, 2.0, 16).unwrap())
    ).expect("metric creation failed");

    // =========================================================================
    // HTTP METRICS
    // =========================================================================

    /// Rejected authentication attempts
    pub static ref AUTH_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("aim_auth_failures_total", "Requests rejected by authentication"),
        &["reason"]
    ).expect("metric creation failed");

    /// Requests answered with a cost estimate only
    pub static ref COST_PREVIEWS: IntCounter = IntCounter::new(
        "aim_http_cost_previews_total",
        "Requests answered with a cost estimate instead of running"
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Dispatcher
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_COMPLETED.clone()),
        Box::new(PENDING_JOBS.clone()),
        Box::new(RUNNING_JOBS.clone()),
        Box::new(JOB_DURATION.clone()),
        // HTTP
        Box::new(AUTH_FAILURES.clone()),
        Box::new(COST_PREVIEWS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
