//! Bybit WebSocket Client
//!
//! Keeps a public market data subscription alive for as long as the process
//! runs. Each connection is handed to a [`Session`]; when the session fails
//! the client backs off and reconnects, forever, until cancelled.
//!
//! # Stream URL
//!
//! - Spot: `wss://stream.bybit.com/v5/public/spot?compress=false`
//! - Linear: `wss://stream.bybit.com/v5/public/linear?compress=false`
//!
//! # States
//!
//! ```text
//! Connecting ──ok──► Active ──error──► Backoff ──sleep──► Connecting
//!      │                                  ▲
//!      └──────────────error───────────────┘
//!
//! any state ──cancel──► Stopped
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_util::sync::CancellationToken;

use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::session::{Session, SessionConfig};
use super::writer::{DEFAULT_OUTBOUND_CAPACITY, OutboundQueue};
use crate::application::ports::{FrameSink, TransportError};
use crate::domain::rate::RateReport;
use crate::domain::streaming::NormalizedRecord;
use crate::domain::subscription::SubscriptionRequest;
use crate::infrastructure::metrics;

/// Default cap on a single frame or message.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Default time allowed for the TCP/TLS/WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Error Type
// =============================================================================

/// Errors that end a session.
#[derive(Debug, thiserror::Error)]
pub enum BybitClientError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Outbound writer failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Control message could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Connection closed by the peer.
    #[error("connection closed")]
    ConnectionClosed,

    /// No frame arrived within the idle timeout.
    #[error("no frame received for {0:?}")]
    IdleTimeout(Duration),

    /// Handling one frame, including its outbound replies, took too long.
    #[error("outbound writes stalled for {0:?}")]
    WriteStalled(Duration),

    /// Handshake did not complete in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),
}

// =============================================================================
// Client Events
// =============================================================================

/// Events emitted by the client.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Opening a connection.
    Connecting {
        /// Consecutive failed attempts before this one.
        attempt: u32,
    },
    /// Connected and subscribe request sent.
    Connected,
    /// Subscribe acknowledgement from the server.
    SubscribeAck {
        /// Whether the server accepted the request.
        success: bool,
        /// Server message (empty on success).
        message: String,
    },
    /// Normalized record.
    Record(NormalizedRecord),
    /// Per-symbol rates for the last window.
    RateReport(RateReport),
    /// Session ended.
    Disconnected {
        /// Why the session ended.
        reason: String,
    },
    /// Waiting before the next connection attempt.
    Reconnecting {
        /// Attempt number the delay was computed for (1-based).
        attempt: u32,
        /// Backoff delay.
        delay: Duration,
    },
    /// Client stopped after cancellation.
    Stopped,
}

/// Supervisor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Opening the transport.
    Connecting,
    /// Session running.
    Active,
    /// Sleeping before a retry.
    Backoff,
    /// Cancelled; terminal.
    Stopped,
}

impl ConnectionState {
    /// Lowercase label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Backoff => "backoff",
            Self::Stopped => "stopped",
        }
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the Bybit client.
#[derive(Debug, Clone)]
pub struct BybitClientConfig {
    /// WebSocket URL.
    pub url: String,
    /// What to subscribe to.
    pub request: SubscriptionRequest,
    /// Reconnection configuration.
    pub reconnect: ReconnectConfig,
    /// Per-session configuration.
    pub session: SessionConfig,
    /// Maximum frame and message size.
    pub max_frame_bytes: usize,
    /// Handshake timeout.
    pub connect_timeout: Duration,
    /// Outbound queue capacity.
    pub outbound_capacity: usize,
}

impl BybitClientConfig {
    /// Create a configuration with default tunables.
    #[must_use]
    pub fn new(url: impl Into<String>, request: SubscriptionRequest) -> Self {
        Self {
            url: url.into(),
            request,
            reconnect: ReconnectConfig::default(),
            session: SessionConfig::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }

    fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig::default()
            .max_message_size(Some(self.max_frame_bytes))
            .max_frame_size(Some(self.max_frame_bytes))
    }
}

// =============================================================================
// Bybit Client
// =============================================================================

/// Reconnect supervisor for the Bybit public stream.
pub struct BybitClient {
    config: BybitClientConfig,
    event_tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
    state: parking_lot::RwLock<ConnectionState>,
}

impl BybitClient {
    /// Create a new client.
    #[must_use]
    pub fn new(
        config: BybitClientConfig,
        event_tx: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            event_tx,
            cancel,
            state: parking_lot::RwLock::new(ConnectionState::Connecting),
        }
    }

    /// Current supervisor state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = std::mem::replace(&mut *self.state.write(), next);
        if previous != next {
            tracing::debug!(from = previous.as_str(), to = next.as_str(), "State transition");
        }
    }

    /// Run the connection loop until cancelled.
    ///
    /// Never returns on its own: every failure leads to a backoff and a new
    /// connection attempt.
    pub async fn run(self: Arc<Self>) {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        while !self.cancel.is_cancelled() {
            self.set_state(ConnectionState::Connecting);
            let attempt = policy.attempt_count();
            tracing::info!(url = %self.config.url, attempt, "Connecting to Bybit stream");
            let _ = self.event_tx.send(StreamEvent::Connecting { attempt }).await;

            let result = self.connect_and_run(&mut policy).await;
            metrics::set_connected(false);

            if self.cancel.is_cancelled() {
                break;
            }

            let reason = match result {
                Ok(()) => "session ended".to_string(),
                Err(e) => e.to_string(),
            };
            tracing::warn!(reason = %reason, "Bybit connection lost");
            let _ = self
                .event_tx
                .send(StreamEvent::Disconnected { reason })
                .await;

            self.set_state(ConnectionState::Backoff);
            let delay = policy.next_delay();
            let attempt = policy.attempt_count();
            tracing::info!(
                attempt,
                delay_ms = delay.as_millis(),
                "Reconnecting to Bybit stream"
            );
            metrics::record_reconnect();
            let _ = self
                .event_tx
                .send(StreamEvent::Reconnecting { attempt, delay })
                .await;

            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("Client cancelled during reconnect delay");
                    break;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Stopped);
        tracing::info!("Bybit client stopped");
        let _ = self.event_tx.send(StreamEvent::Stopped).await;
    }

    /// Connect, subscribe and run one session.
    ///
    /// Returns `Ok(())` only on cancellation.
    async fn connect_and_run(&self, policy: &mut ReconnectPolicy) -> Result<(), BybitClientError> {
        let timeout = self.config.connect_timeout;
        let connect = tokio_tungstenite::connect_async_with_config(
            self.config.url.as_str(),
            Some(self.config.websocket_config()),
            false,
        );

        let (ws_stream, _response) = tokio::select! {
            () = self.cancel.cancelled() => return Ok(()),
            result = tokio::time::timeout(timeout, connect) => {
                result.map_err(|_| BybitClientError::ConnectTimeout(timeout))??
            }
        };

        let (write, mut read) = ws_stream.split();
        let (queue, writer) = OutboundQueue::spawn(write, self.config.outbound_capacity);
        let sink: Arc<dyn FrameSink> = Arc::new(queue);

        let mut session = Session::new(
            self.config.request.clone(),
            self.config.session.clone(),
            sink,
            self.event_tx.clone(),
        );

        let subscribed = tokio::select! {
            () = self.cancel.cancelled() => None,
            result = session.subscribe() => Some(result),
        };

        let result = match subscribed {
            None => Ok(()),
            Some(Ok(())) => {
                policy.reset();
                self.set_state(ConnectionState::Active);
                metrics::set_connected(true);
                tracing::info!(
                    mode = %self.config.request.mode(),
                    symbols = ?self.config.request.symbols(),
                    "Bybit stream connected"
                );
                let _ = self.event_tx.send(StreamEvent::Connected).await;
                session.run(&mut read, &self.cancel).await
            }
            Some(Err(e)) => Err(e),
        };

        drop(session);
        writer.shutdown().await;

        result
    }
}
