//! Session Loop
//!
//! Owns one connection's lifetime: subscribe, run the keepalive agent next
//! to the receive loop, hand records to the rate tracker and the event
//! channel, and tear everything down on the way out.
//!
//! Frames are handled strictly in arrival order. I/O failures are returned
//! to the caller untouched; the reconnect supervisor decides what happens
//! next.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use super::client::{BybitClientError, StreamEvent};
use super::codec::{DecodedFrame, FrameDecoder};
use super::heartbeat::{KeepaliveAgent, KeepaliveConfig};
use super::messages::{HeartbeatMessage, SubscribeMessage, now_ms};
use crate::application::ports::FrameSink;
use crate::domain::rate::{DEFAULT_REPORT_WINDOW, RateTracker};
use crate::domain::subscription::SubscriptionRequest;
use crate::infrastructure::metrics::{self, FrameKind};

/// Characters of a raw frame shown in preview logs.
const RAW_PREVIEW_CHARS: usize = 500;

/// Per-session tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Keepalive agent configuration.
    pub keepalive: KeepaliveConfig,
    /// Rate report window.
    pub report_window: Duration,
    /// Number of leading text frames logged verbatim.
    pub raw_preview_frames: usize,
    /// End the session when no frame arrives for this long (`None` disables).
    pub idle_timeout: Option<Duration>,
    /// Maximum topics per subscribe message (0 = all in one).
    pub subscribe_batch: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keepalive: KeepaliveConfig::default(),
            report_window: DEFAULT_REPORT_WINDOW,
            raw_preview_frames: 10,
            idle_timeout: Some(Duration::from_secs(30)),
            subscribe_batch: 10,
        }
    }
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// All frames received.
    pub frames: u64,
    /// Text frames received.
    pub text_frames: u64,
    /// Binary frames received (not decoded).
    pub binary_frames: u64,
    /// Normalized records produced.
    pub records: u64,
    /// Events inside data frames that failed validation.
    pub rejected_events: u64,
    /// Text frames that carried nothing usable.
    pub ignored_frames: u64,
    /// Pong replies sent.
    pub pongs_sent: u64,
    /// Subscribe acknowledgements received.
    pub subscribe_acks: u64,
}

/// What the receive loop should do after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Keep reading.
    Continue,
    /// Peer sent a close frame.
    Closed,
}

/// State for one connection.
pub struct Session {
    request: SubscriptionRequest,
    config: SessionConfig,
    decoder: FrameDecoder,
    tracker: RateTracker,
    sink: Arc<dyn FrameSink>,
    event_tx: mpsc::Sender<StreamEvent>,
    preview_left: usize,
    stats: SessionStats,
}

impl Session {
    /// Create a session writing through `sink` and reporting on `event_tx`.
    #[must_use]
    pub fn new(
        request: SubscriptionRequest,
        config: SessionConfig,
        sink: Arc<dyn FrameSink>,
        event_tx: mpsc::Sender<StreamEvent>,
    ) -> Self {
        let tracker = RateTracker::new(request.instruments(), config.report_window, Instant::now());
        Self {
            decoder: FrameDecoder::new(request.mode()),
            preview_left: config.raw_preview_frames,
            request,
            config,
            tracker,
            sink,
            event_tx,
            stats: SessionStats::default(),
        }
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Send the subscribe request(s) for every configured topic.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer has shut down.
    pub async fn subscribe(&self) -> Result<(), BybitClientError> {
        let batches = self.request.topic_batches(self.config.subscribe_batch);
        let total = batches.len();

        for (index, args) in batches.into_iter().enumerate() {
            let json = SubscribeMessage::new(args).to_json()?;
            tracing::info!(
                batch = index + 1,
                batches = total,
                payload = %json,
                "Sending subscribe request"
            );
            self.sink.send_text(json).await?;
        }

        Ok(())
    }

    /// Run the receive loop with a keepalive agent alongside it.
    ///
    /// Returns `Ok(())` only when `cancel` fires. The keepalive agent is
    /// cancelled and joined on every exit path.
    ///
    /// # Errors
    ///
    /// Returns an error on read failure, peer close, idle timeout, or a
    /// pong reply that fails or stays blocked past the idle timeout.
    pub async fn run<S>(&mut self, read: &mut S, cancel: &CancellationToken) -> Result<(), BybitClientError>
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        let keepalive_cancel = cancel.child_token();
        let keepalive_guard = keepalive_cancel.clone().drop_guard();
        let agent = KeepaliveAgent::new(
            self.config.keepalive.clone(),
            Arc::clone(&self.sink),
            keepalive_cancel,
        );
        let keepalive = tokio::spawn(agent.run());

        let result = self.receive_loop(read, cancel).await;

        drop(keepalive_guard);
        match keepalive.await {
            Ok(pings) => tracing::debug!(pings, "Keepalive agent stopped"),
            Err(e) => tracing::debug!(error = %e, "Keepalive agent join failed"),
        }

        tracing::info!(
            frames = self.stats.frames,
            records = self.stats.records,
            binary_frames = self.stats.binary_frames,
            ignored_frames = self.stats.ignored_frames,
            pongs_sent = self.stats.pongs_sent,
            "Session ended"
        );

        result
    }

    async fn receive_loop<S>(&mut self, read: &mut S, cancel: &CancellationToken) -> Result<(), BybitClientError>
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        let idle_timeout = self.config.idle_timeout;

        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                next = next_frame(read, idle_timeout) => next?,
            };

            let msg = match next {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => return Err(e.into()),
                None => {
                    tracing::info!("WebSocket stream ended");
                    return Err(BybitClientError::ConnectionClosed);
                }
            };

            let outcome = tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                outcome = within(idle_timeout, self.process(msg)) => outcome?,
            };

            if outcome == FrameOutcome::Closed {
                return Err(BybitClientError::ConnectionClosed);
            }
        }
    }

    /// Handle one frame, then check the rate window.
    async fn process(&mut self, msg: Message) -> Result<FrameOutcome, BybitClientError> {
        let outcome = self.handle_message(msg).await?;
        if outcome == FrameOutcome::Continue {
            self.flush_rates(Instant::now()).await;
        }
        Ok(outcome)
    }

    /// Handle one inbound frame.
    ///
    /// # Errors
    ///
    /// Returns an error if a pong reply cannot be queued.
    pub async fn handle_message(&mut self, msg: Message) -> Result<FrameOutcome, BybitClientError> {
        self.stats.frames += 1;

        match msg {
            Message::Text(text) => {
                metrics::record_frame(FrameKind::Text);
                self.handle_text(text.as_str()).await?;
            }
            Message::Binary(data) => {
                metrics::record_frame(FrameKind::Binary);
                self.stats.binary_frames += 1;
                tracing::warn!(
                    size = data.len(),
                    "Unexpected binary frame (compression should be off), skipping"
                );
            }
            Message::Ping(_) | Message::Pong(_) => {
                metrics::record_frame(FrameKind::Control);
                tracing::trace!("Ignoring transport-level ping/pong");
            }
            Message::Close(frame) => {
                metrics::record_frame(FrameKind::Control);
                tracing::info!(frame = ?frame, "Server sent close frame");
                return Ok(FrameOutcome::Closed);
            }
            Message::Frame(_) => {}
        }

        Ok(FrameOutcome::Continue)
    }

    async fn handle_text(&mut self, text: &str) -> Result<(), BybitClientError> {
        self.stats.text_frames += 1;

        if self.preview_left > 0 {
            self.preview_left -= 1;
            tracing::info!(raw = preview(text), "RAW");
        }

        match self.decoder.decode(text) {
            DecodedFrame::TextPing => {
                self.sink.send_text("pong".to_string()).await?;
                self.stats.pongs_sent += 1;
                metrics::record_pong_sent();
            }
            DecodedFrame::Ping { ts } => {
                let pong = HeartbeatMessage::pong(ts.unwrap_or_else(now_ms)).to_json()?;
                self.sink.send_text(pong).await?;
                self.stats.pongs_sent += 1;
                metrics::record_pong_sent();
            }
            DecodedFrame::Pong => {
                tracing::trace!("Pong received");
            }
            DecodedFrame::SubscribeAck(ack) => {
                self.stats.subscribe_acks += 1;
                metrics::record_subscribe_ack(ack.success);
                if ack.success {
                    tracing::info!(conn_id = %ack.conn_id, "ACK subscribe");
                } else {
                    tracing::warn!(
                        conn_id = %ack.conn_id,
                        ret_msg = %ack.ret_msg,
                        "Subscribe rejected"
                    );
                }
                let _ = self
                    .event_tx
                    .send(StreamEvent::SubscribeAck {
                        success: ack.success,
                        message: ack.ret_msg,
                    })
                    .await;
            }
            DecodedFrame::Data {
                records, rejected, ..
            } => {
                self.stats.rejected_events += rejected as u64;
                metrics::record_rejected(rejected as u64);
                for record in records {
                    self.tracker.observe(&record.symbol);
                    self.stats.records += 1;
                    metrics::record_normalized(self.decoder.mode());
                    let _ = self.event_tx.send(StreamEvent::Record(record)).await;
                }
            }
            DecodedFrame::Ignored(reason) => {
                self.stats.ignored_frames += 1;
                metrics::record_ignored_frame();
                tracing::trace!(reason = ?reason, "Frame ignored");
            }
        }

        Ok(())
    }

    /// Emit a rate report if the window has elapsed at `now`.
    pub async fn flush_rates(&mut self, now: Instant) {
        if let Some(report) = self.tracker.maybe_report(now) {
            let _ = self.event_tx.send(StreamEvent::RateReport(report)).await;
        }
    }
}

async fn next_frame<S>(
    read: &mut S,
    idle_timeout: Option<Duration>,
) -> Result<Option<Result<Message, tungstenite::Error>>, BybitClientError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, read.next())
            .await
            .map_err(|_| BybitClientError::IdleTimeout(limit)),
        None => Ok(read.next().await),
    }
}

/// Bound frame handling so a blocked writer or event consumer ends the session.
async fn within<F, T>(limit: Option<Duration>, fut: F) -> Result<T, BybitClientError>
where
    F: Future<Output = Result<T, BybitClientError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| BybitClientError::WriteStalled(limit))?,
        None => fut.await,
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(RAW_PREVIEW_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
