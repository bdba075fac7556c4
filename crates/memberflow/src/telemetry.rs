//! Pipeline metric hooks.
//!
//! With the `metrics` feature the pipeline records through OpenTelemetry
//! instruments registered by [`init_metric_handles`]. Without it every hook
//! compiles to a no-op. Hooks called before the handles are registered are
//! ignored.

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(feature = "metrics")]
static REQUESTS_SUBMITTED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static REQUESTS_SUCCEEDED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static REQUESTS_FAILED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static REQUESTS_INFLIGHT: OnceLock<UpDownCounter<i64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static PERSIST_LATENCY_MS: OnceLock<Histogram<f64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static PREFETCH_BATCHES: OnceLock<Counter<u64>> = OnceLock::new();

/// Registers the pipeline's instruments on `meter`. Only the first call has
/// any effect.
#[cfg(feature = "metrics")]
pub fn init_metric_handles(meter: &Meter) {
    let _ = REQUESTS_SUBMITTED.set(
        meter
            .u64_counter("requests_submitted")
            .with_description("Requests admitted into the pipeline")
            .build(),
    );

    let _ = REQUESTS_SUCCEEDED.set(
        meter
            .u64_counter("requests_succeeded")
            .with_description("Requests persisted successfully")
            .build(),
    );

    let _ = REQUESTS_FAILED.set(
        meter
            .u64_counter("requests_failed")
            .with_description("Requests whose persistence failed")
            .build(),
    );

    let _ = REQUESTS_INFLIGHT.set(
        meter
            .i64_up_down_counter("requests_inflight")
            .with_description("Requests admitted but not yet settled")
            .build(),
    );

    let _ = PERSIST_LATENCY_MS.set(
        meter
            .f64_histogram("persist_latency")
            .with_unit("ms")
            .with_description("Admission-to-settlement latency")
            .build(),
    );

    let _ = PREFETCH_BATCHES.set(
        meter
            .u64_counter("prefetch_batches")
            .with_description("Batches pulled from the request source")
            .build(),
    );
}

#[cfg(feature = "metrics")]
pub fn increment_submitted() {
    if let Some(counter) = REQUESTS_SUBMITTED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_submitted() {}

#[cfg(feature = "metrics")]
pub fn increment_succeeded() {
    if let Some(counter) = REQUESTS_SUCCEEDED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_succeeded() {}

#[cfg(feature = "metrics")]
pub fn increment_failed() {
    if let Some(counter) = REQUESTS_FAILED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_failed() {}

#[cfg(feature = "metrics")]
pub fn increment_inflight() {
    if let Some(counter) = REQUESTS_INFLIGHT.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_inflight() {}

#[cfg(feature = "metrics")]
pub fn decrement_inflight() {
    if let Some(counter) = REQUESTS_INFLIGHT.get() {
        counter.add(-1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn decrement_inflight() {}

#[cfg(feature = "metrics")]
pub fn record_persist_latency(ms: f64) {
    if let Some(hist) = PERSIST_LATENCY_MS.get() {
        hist.record(ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_persist_latency(_ms: f64) {}

#[cfg(feature = "metrics")]
pub fn increment_prefetch_batches() {
    if let Some(counter) = PREFETCH_BATCHES.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_prefetch_batches() {}
