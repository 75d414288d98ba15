//! Observability for verification runs
//!
//! Provides:
//! - Prometheus metrics (run outcomes, step latency, probe attempts, leaked resources)
//! - Structured logging with tracing

use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, HistogramVec, IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Step latency buckets in seconds; deploys take minutes, polls up to 15 minutes
const STEP_BUCKETS: &[f64] = &[
    0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0,
];

const ATTEMPT_BUCKETS: &[f64] = &[1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 180.0];

static GLOBAL_METRICS: OnceLock<VerifierMetricsInner> = OnceLock::new();

struct VerifierMetricsInner {
    runs_total: IntCounterVec,
    step_duration_seconds: HistogramVec,
    probe_attempts: Histogram,
    leaked_resources: IntGauge,
    last_success_timestamp: IntGauge,
}

impl VerifierMetricsInner {
    fn new() -> Self {
        Self {
            runs_total: register_int_counter_vec!(
                "grid_verifier_runs_total",
                "Verification runs by outcome",
                &["outcome"]
            )
            .expect("Failed to register runs_total"),

            step_duration_seconds: register_histogram_vec!(
                "grid_verifier_step_duration_seconds",
                "Time spent in each verification step",
                &["step"],
                STEP_BUCKETS.to_vec()
            )
            .expect("Failed to register step_duration_seconds"),

            probe_attempts: register_histogram!(
                "grid_verifier_probe_attempts",
                "Probe attempts until the gateway domain answered",
                ATTEMPT_BUCKETS.to_vec()
            )
            .expect("Failed to register probe_attempts"),

            leaked_resources: register_int_gauge!(
                "grid_verifier_leaked_resources",
                "Resources whose teardown failed in the last run"
            )
            .expect("Failed to register leaked_resources"),

            last_success_timestamp: register_int_gauge!(
                "grid_verifier_last_success_timestamp_seconds",
                "Unix time of the last passing verification run"
            )
            .expect("Failed to register last_success_timestamp"),
        }
    }
}

/// Handle to the process-wide verifier metrics; clones share one registry
#[derive(Clone)]
pub struct VerifierMetrics {
    _private: (),
}

impl Default for VerifierMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl VerifierMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(VerifierMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &VerifierMetricsInner {
        GLOBAL_METRICS.get_or_init(VerifierMetricsInner::new)
    }

    /// Count a finished run; `outcome` is "passed" or an error kind
    pub fn record_run(&self, outcome: &str) {
        self.inner().runs_total.with_label_values(&[outcome]).inc();
        if outcome == "passed" {
            self.inner()
                .last_success_timestamp
                .set(chrono::Utc::now().timestamp());
        }
    }

    pub fn observe_step(&self, step: &str, duration: Duration) {
        self.inner()
            .step_duration_seconds
            .with_label_values(&[step])
            .observe(duration.as_secs_f64());
    }

    pub fn observe_probe_attempts(&self, attempts: u32) {
        self.inner().probe_attempts.observe(f64::from(attempts));
    }

    pub fn set_leaked_resources(&self, count: usize) {
        self.inner()
            .leaked_resources
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    pub fn runs(&self, outcome: &str) -> u64 {
        self.inner().runs_total.with_label_values(&[outcome]).get()
    }

    /// Everything in the default registry in the Prometheus text format
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Event-named log lines for verification runs
#[derive(Clone)]
pub struct StructuredLogger {
    run_id: String,
}

impl StructuredLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_started(&self, solution: &str, workload: &str, gateway: &str) {
        info!(
            event = "run_started",
            run_id = %self.run_id,
            solution = %solution,
            workload = %workload,
            gateway = %gateway,
            "Verification run started"
        );
    }

    pub fn step_completed(&self, step: &str, duration: Duration) {
        info!(
            event = "step_completed",
            run_id = %self.run_id,
            step = %step,
            elapsed_ms = duration.as_millis() as u64,
            "Verification step completed"
        );
    }

    pub fn run_finished(&self, outcome: &str, duration: Duration) {
        if outcome == "passed" {
            info!(
                event = "run_finished",
                run_id = %self.run_id,
                outcome = %outcome,
                elapsed_secs = duration.as_secs(),
                "Verification run passed"
            );
        } else {
            warn!(
                event = "run_finished",
                run_id = %self.run_id,
                outcome = %outcome,
                elapsed_secs = duration.as_secs(),
                "Verification run failed"
            );
        }
    }

    pub fn teardown_finished(&self, deleted: usize, leaked: usize) {
        if leaked == 0 {
            info!(
                event = "teardown_finished",
                run_id = %self.run_id,
                deleted = deleted,
                "Teardown completed"
            );
        } else {
            warn!(
                event = "teardown_finished",
                run_id = %self.run_id,
                deleted = deleted,
                leaked = leaked,
                "Teardown left resources behind"
            );
        }
    }
}
