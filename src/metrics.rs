//! Metric helpers for `chatlens`.
//!
//! This module defines metric names and simple helper functions
//! wrapping the [`metrics`](https://docs.rs/metrics) crate. Without the
//! `metrics` feature every helper is a no-op.

#[cfg(feature = "metrics")]
use std::net::SocketAddr;

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking flows with buffered state.
pub const FLOWS_ACTIVE: &str = "chatlens_flows_active";
/// Name of the counter tracking chat messages decoded from frames.
pub const FRAMES_DECODED: &str = "chatlens_frames_decoded_total";
/// Name of the counter tracking discarded frames and resyncs.
pub const FRAMES_DISCARDED: &str = "chatlens_frames_discarded_total";
/// Name of the counter tracking translation outcomes.
pub const TRANSLATIONS: &str = "chatlens_translations_total";
/// Name of the counter tracking lines shown on the display.
pub const LINES_DISPLAYED: &str = "chatlens_lines_displayed_total";

/// Increment the active flows gauge.
pub fn inc_flows() {
    #[cfg(feature = "metrics")]
    gauge!(FLOWS_ACTIVE).increment(1.0);
}

/// Decrement the active flows gauge.
pub fn dec_flows() {
    #[cfg(feature = "metrics")]
    gauge!(FLOWS_ACTIVE).decrement(1.0);
}

/// Record a decoded chat message.
pub fn inc_frames_decoded() {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_DECODED).increment(1);
}

/// Record a discarded frame, labelled by `reason`.
pub fn inc_frames_discarded(reason: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_DISCARDED, "reason" => reason).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = reason;
}

/// Record a translation, labelled `translated` or `passthrough`.
pub fn inc_translations(outcome: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(TRANSLATIONS, "outcome" => outcome).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

/// Record a line handed to the display.
pub fn inc_lines_displayed() {
    #[cfg(feature = "metrics")]
    counter!(LINES_DISPLAYED).increment(1);
}

/// Errors raised while installing the exporter.
#[cfg(feature = "metrics")]
pub type ExporterError = metrics_exporter_prometheus::BuildError;

/// Install the global recorder and serve Prometheus text on `addr`.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns [`ExporterError`] if a recorder is already installed or the
/// listener cannot be bound.
#[cfg(feature = "metrics")]
pub fn install_exporter(addr: SocketAddr) -> Result<(), ExporterError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}
