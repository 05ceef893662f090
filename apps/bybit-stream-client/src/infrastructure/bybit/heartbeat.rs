//! Keepalive Agent
//!
//! Sends an application-level `{"op":"ping","ts":<ms>}` on a fixed interval
//! for as long as its session lives. Bybit drops idle public connections,
//! and transport-level pings are not used for this feed.
//!
//! The agent never reports failure: if a send fails it simply stops, and the
//! session's read path notices the dead connection on its own.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::messages::{HeartbeatMessage, now_ms};
use crate::application::ports::FrameSink;
use crate::infrastructure::metrics;

/// Default interval between pings.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration for keepalive behavior.
#[derive(Debug, Clone)]
pub struct KeepaliveConfig {
    /// Interval between ping messages. The first ping goes out one interval
    /// after the agent starts.
    pub ping_interval: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
        }
    }
}

impl KeepaliveConfig {
    /// Create a new configuration with a custom interval.
    #[must_use]
    pub const fn new(ping_interval: Duration) -> Self {
        Self { ping_interval }
    }
}

/// Periodic pinger bound to one connection.
///
/// # Example
///
/// ```rust,no_run
/// use bybit_stream_client::infrastructure::bybit::heartbeat::{KeepaliveAgent, KeepaliveConfig};
/// use bybit_stream_client::application::ports::FrameSink;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// async fn example(sink: Arc<dyn FrameSink>) {
///     let cancel = CancellationToken::new();
///     let agent = KeepaliveAgent::new(KeepaliveConfig::default(), sink, cancel.clone());
///     let handle = tokio::spawn(agent.run());
///
///     // ... session runs ...
///
///     cancel.cancel();
///     let _ = handle.await;
/// }
/// ```
pub struct KeepaliveAgent {
    config: KeepaliveConfig,
    sink: Arc<dyn FrameSink>,
    cancel: CancellationToken,
}

impl KeepaliveAgent {
    /// Create a new keepalive agent.
    #[must_use]
    pub fn new(config: KeepaliveConfig, sink: Arc<dyn FrameSink>, cancel: CancellationToken) -> Self {
        Self {
            config,
            sink,
            cancel,
        }
    }

    /// Run until cancelled or a send fails. Returns the number of pings sent.
    pub async fn run(self) -> u64 {
        let period = self.config.ping_interval;
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut sent = 0_u64;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!(pings = sent, "Keepalive agent cancelled");
                    break;
                }
                _ = interval.tick() => {}
            }

            let frame = match HeartbeatMessage::ping(now_ms()).to_json() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::debug!(error = %e, "Failed to encode ping");
                    break;
                }
            };

            let result = tokio::select! {
                () = self.cancel.cancelled() => break,
                result = self.sink.send_text(frame) => result,
            };

            if let Err(e) = result {
                tracing::debug!(error = %e, "Keepalive send failed, stopping agent");
                break;
            }

            sent += 1;
            metrics::record_keepalive_ping();
            tracing::trace!(pings = sent, "Keepalive ping sent");
        }

        sent
    }
}
