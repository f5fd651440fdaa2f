//! Metrics collection for `umbra`.
//!
//! Prometheus-compatible metrics behind the `metrics` facade, with typed
//! convenience functions for the measurements the control loop takes.
//! Every label value comes from a closed enum, so cardinality is bounded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::UmbraError;
use crate::phase::{Bracketing, PhaseKind};

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `UmbraError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), UmbraError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| UmbraError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!("umbra_captures_total", "Capture requests issued");
    describe_counter!(
        "umbra_capture_failures_total",
        "Capture requests the camera reported as failed"
    );
    describe_histogram!(
        "umbra_capture_duration_ms",
        "Time the camera took per capture request in milliseconds"
    );
    describe_counter!(
        "umbra_phase_transitions_total",
        "Total number of phase transitions"
    );
    describe_gauge!("umbra_current_phase", "Currently active phase (1 = active)");
    describe_gauge!("umbra_cycle_index", "Next cycle index per phase");
    describe_counter!(
        "umbra_notification_failures_total",
        "Notifications that could not be delivered"
    );
    describe_counter!("umbra_errors_total", "Total number of errors by category");
}

/// Records a capture request.
pub fn record_capture(phase: PhaseKind, bracketing: Bracketing) {
    counter!(
        "umbra_captures_total",
        "phase" => phase.name(),
        "bracketing" => bracketing.label(),
    )
    .increment(1);
}

/// Records a failed capture request.
pub fn record_capture_failure(phase: PhaseKind) {
    counter!("umbra_capture_failures_total", "phase" => phase.name()).increment(1);
}

/// Records how long the camera took for one request.
pub fn record_capture_duration(phase: PhaseKind, duration: Duration) {
    histogram!("umbra_capture_duration_ms", "phase" => phase.name())
        .record(duration.as_secs_f64() * 1000.0);
}

/// Records a phase transition.
pub fn record_phase_transition(from: Option<PhaseKind>, to: PhaseKind) {
    counter!(
        "umbra_phase_transitions_total",
        "from" => from.map_or("none", PhaseKind::name),
        "to" => to.name(),
    )
    .increment(1);
}

/// Sets the currently active phase gauge.
///
/// Zeros out the previous phase label first so stale labels do not keep
/// reporting `1.0`.
pub fn set_current_phase(phase: PhaseKind, previous: Option<PhaseKind>) {
    if let Some(prev) = previous {
        gauge!("umbra_current_phase", "phase" => prev.name()).set(0.0);
    }
    gauge!("umbra_current_phase", "phase" => phase.name()).set(1.0);
}

/// Publishes the next cycle index of a phase.
#[allow(clippy::cast_precision_loss)]
pub fn set_cycle_index(phase: PhaseKind, index: u64) {
    gauge!("umbra_cycle_index", "phase" => phase.name()).set(index as f64);
}

/// Records an undelivered notification.
pub fn record_notification_failure() {
    counter!("umbra_notification_failures_total").increment(1);
}

/// Records an error by category.
pub fn record_error(category: &'static str) {
    counter!("umbra_errors_total", "category" => category).increment(1);
}
