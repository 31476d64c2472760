//! Optional OpenTelemetry counters for the feed core.
//!
//! With the `metrics` feature enabled, call [`init_metrics`] once with a
//! [`Meter`] from the installed provider; every `record_*` function is a
//! no-op until then. Without the feature the functions compile to nothing.

use crate::fanout::JobKind;
#[cfg(feature = "metrics")]
use opentelemetry::{
    KeyValue,
    metrics::{Counter, Meter},
};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

// Metric handles - only compiled when metrics feature is enabled
#[cfg(feature = "metrics")]
static JOBS_SUCCEEDED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static JOBS_FAILED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static JOB_RETRIES: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static BATCHES_SHED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static BATCHES_DROPPED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static PAGES_SERVED: OnceLock<Counter<u64>> = OnceLock::new();

/// Registers the feed counters on `meter`. Later calls are ignored.
#[cfg(feature = "metrics")]
pub fn init_metrics(meter: &Meter) {
    let _ = JOBS_SUCCEEDED.set(
        meter
            .u64_counter("fanout_jobs_succeeded")
            .with_description("Fan-out jobs that reached Succeeded")
            .build(),
    );

    let _ = JOBS_FAILED.set(
        meter
            .u64_counter("fanout_jobs_failed")
            .with_description("Fan-out jobs that reached TerminalFailure")
            .build(),
    );

    let _ = JOB_RETRIES.set(
        meter
            .u64_counter("fanout_job_retries")
            .with_description("Fan-out attempts scheduled for retry")
            .build(),
    );

    let _ = BATCHES_SHED.set(
        meter
            .u64_counter("fanout_batches_shed")
            .with_description("Batches rejected because every worker queue was full")
            .build(),
    );

    let _ = BATCHES_DROPPED.set(
        meter
            .u64_counter("fanout_batches_dropped")
            .with_description("Queued batches dropped at shutdown")
            .build(),
    );

    let _ = PAGES_SERVED.set(
        meter
            .u64_counter("feed_pages_served")
            .with_description("Feed pages computed by the pagination engine")
            .build(),
    );
}

#[cfg(feature = "metrics")]
fn add(counter: &OnceLock<Counter<u64>>, kind: JobKind) {
    if let Some(counter) = counter.get() {
        counter.add(1, &[KeyValue::new("kind", kind.as_str())]);
    }
}

#[cfg(feature = "metrics")]
pub fn record_job_succeeded(kind: JobKind) {
    add(&JOBS_SUCCEEDED, kind);
}

#[cfg(not(feature = "metrics"))]
pub fn record_job_succeeded(_kind: JobKind) {}

#[cfg(feature = "metrics")]
pub fn record_job_failed(kind: JobKind) {
    add(&JOBS_FAILED, kind);
}

#[cfg(not(feature = "metrics"))]
pub fn record_job_failed(_kind: JobKind) {}

#[cfg(feature = "metrics")]
pub fn record_job_retry(kind: JobKind) {
    add(&JOB_RETRIES, kind);
}

#[cfg(not(feature = "metrics"))]
pub fn record_job_retry(_kind: JobKind) {}

#[cfg(feature = "metrics")]
pub fn record_batch_shed(kind: JobKind) {
    add(&BATCHES_SHED, kind);
}

#[cfg(not(feature = "metrics"))]
pub fn record_batch_shed(_kind: JobKind) {}

#[cfg(feature = "metrics")]
pub fn record_batch_dropped(kind: JobKind) {
    add(&BATCHES_DROPPED, kind);
}

#[cfg(not(feature = "metrics"))]
pub fn record_batch_dropped(_kind: JobKind) {}

#[cfg(feature = "metrics")]
pub fn record_page_served() {
    if let Some(counter) = PAGES_SERVED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_page_served() {}
