//! Prometheus Metrics Module
//!
//! Exposes client metrics in Prometheus format when a listener port is
//! configured. Without one, the recording functions below are no-ops.
//!
//! # Metrics Categories
//!
//! - **Frames**: frames received by kind, pongs and keepalive pings sent
//! - **Records**: normalized records emitted, frames and events rejected
//! - **Connection**: connected gauge, reconnect attempts, subscribe acks

use std::net::SocketAddr;
use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::domain::streaming::StreamMode;

// =============================================================================
// Exporter
// =============================================================================

static INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

/// Install the Prometheus recorder with an HTTP listener on `port`.
///
/// Must be called from within a Tokio runtime. Calling it again after a
/// successful install is a no-op.
///
/// # Errors
///
/// Returns an error if the listener or recorder cannot be installed.
pub fn init_metrics(port: u16) -> Result<SocketAddr, BuildError> {
    if let Some(addr) = INSTALLED.get() {
        return Ok(*addr);
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_metrics();

    Ok(*INSTALLED.get_or_init(|| addr))
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "bybit_client_frames_received_total",
        "Total WebSocket frames received by kind"
    );
    describe_counter!(
        "bybit_client_records_total",
        "Total normalized records emitted"
    );
    describe_counter!(
        "bybit_client_rejected_events_total",
        "Events inside data frames that failed validation"
    );
    describe_counter!(
        "bybit_client_ignored_frames_total",
        "Text frames that carried no usable payload"
    );
    describe_counter!("bybit_client_pongs_sent_total", "Pong replies sent");
    describe_counter!(
        "bybit_client_keepalive_pings_total",
        "Application-level keepalive pings sent"
    );
    describe_counter!(
        "bybit_client_subscribe_acks_total",
        "Subscribe acknowledgements by outcome"
    );
    describe_counter!(
        "bybit_client_reconnects_total",
        "Total WebSocket reconnection attempts"
    );
    describe_gauge!(
        "bybit_client_connected",
        "1 while a session is active, 0 otherwise"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for inbound frame kinds.
#[derive(Debug, Clone, Copy)]
pub enum FrameKind {
    /// Text frame.
    Text,
    /// Binary frame.
    Binary,
    /// Transport ping, pong or close.
    Control,
}

impl FrameKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Control => "control",
        }
    }
}

/// Record an inbound frame.
pub fn record_frame(kind: FrameKind) {
    counter!(
        "bybit_client_frames_received_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record one normalized record.
pub fn record_normalized(mode: StreamMode) {
    counter!("bybit_client_records_total", "mode" => mode.as_str()).increment(1);
}

/// Record events dropped by validation.
pub fn record_rejected(count: u64) {
    if count > 0 {
        counter!("bybit_client_rejected_events_total").increment(count);
    }
}

/// Record a text frame with nothing usable in it.
pub fn record_ignored_frame() {
    counter!("bybit_client_ignored_frames_total").increment(1);
}

/// Record a pong reply.
pub fn record_pong_sent() {
    counter!("bybit_client_pongs_sent_total").increment(1);
}

/// Record a keepalive ping.
pub fn record_keepalive_ping() {
    counter!("bybit_client_keepalive_pings_total").increment(1);
}

/// Record a subscribe acknowledgement.
pub fn record_subscribe_ack(success: bool) {
    counter!(
        "bybit_client_subscribe_acks_total",
        "outcome" => if success { "ok" } else { "rejected" }
    )
    .increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect() {
    counter!("bybit_client_reconnects_total").increment(1);
}

/// Update the connected gauge.
pub fn set_connected(connected: bool) {
    gauge!("bybit_client_connected").set(if connected { 1.0 } else { 0.0 });
}

// =============================================================================
// Tests
// =============================================================================
