//! Outbound Writer
//!
//! One task owns the write half of the connection and drains a bounded
//! queue, so keepalive pings, pong replies and subscribe requests can be
//! issued from anywhere without interleaving on the wire.
//!
//! ```text
//! KeepaliveAgent ──┐
//!                  ├──► mpsc ──► writer task ──► WebSocket sink
//! Session (pong) ──┘
//! ```
//!
//! The writer closes the sink once every [`OutboundQueue`] clone is dropped.

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::application::ports::{FrameSink, TransportError};

/// Default number of frames that may be queued ahead of the writer.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

/// How long teardown waits for the writer to flush and close.
const WRITER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Cloneable handle for queueing frames to the writer task.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: mpsc::Sender<Message>,
}

impl OutboundQueue {
    /// Spawn a writer task that owns `sink`.
    pub fn spawn<W>(sink: W, capacity: usize) -> (Self, WriterTask)
    where
        W: Sink<Message> + Unpin + Send + 'static,
        W::Error: Display + Send,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(write_loop(sink, rx));
        (Self { tx }, WriterTask { handle })
    }

    /// Check if the writer task has stopped accepting frames.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl FrameSink for OutboundQueue {
    async fn send_text(&self, frame: String) -> Result<(), TransportError> {
        self.tx
            .send(Message::Text(frame.into()))
            .await
            .map_err(|_| TransportError::WriterClosed)
    }
}

/// Join handle of a running writer task.
#[derive(Debug)]
pub struct WriterTask {
    handle: JoinHandle<()>,
}

impl WriterTask {
    /// Wait for the writer to drain and close the sink.
    ///
    /// All [`OutboundQueue`] clones must be dropped first. A writer stuck on
    /// a dead socket is aborted after a bounded wait.
    pub async fn shutdown(self) {
        let abort = self.handle.abort_handle();
        if tokio::time::timeout(WRITER_SHUTDOWN_TIMEOUT, self.handle)
            .await
            .is_err()
        {
            tracing::warn!(
                timeout_secs = WRITER_SHUTDOWN_TIMEOUT.as_secs(),
                "Writer did not close in time, aborting"
            );
            abort.abort();
        }
    }
}

async fn write_loop<W>(mut sink: W, mut rx: mpsc::Receiver<Message>)
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    while let Some(msg) = rx.recv().await {
        if let Err(e) = sink.send(msg).await {
            tracing::debug!(error = %e, "Outbound write failed, stopping writer");
            return;
        }
    }

    if let Err(e) = sink.close().await {
        tracing::trace!(error = %e, "Error closing WebSocket sink");
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use futures::channel::mpsc::unbounded;
    use futures::sink::drain;

    use super::*;

    #[tokio::test]
    async fn frames_arrive_in_order() {
        let (sink_tx, sink_rx) = unbounded::<Message>();
        let (queue, writer) = OutboundQueue::spawn(sink_tx, 8);

        queue.send_text("one".to_string()).await.unwrap();
        queue.send_text("two".to_string()).await.unwrap();
        drop(queue);
        writer.shutdown().await;

        let received: Vec<Message> = sink_rx.collect().await;
        assert_eq!(
            received,
            vec![Message::text("one".to_string()), Message::text("two".to_string())]
        );
    }

    #[tokio::test]
    async fn concurrent_senders_share_one_writer() {
        let (sink_tx, sink_rx) = unbounded::<Message>();
        let (queue, writer) = OutboundQueue::spawn(sink_tx, 4);

        let mut tasks = Vec::new();
        for i in 0..10 {
            let q = queue.clone();
            tasks.push(tokio::spawn(async move {
                q.send_text(format!("frame-{i}")).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        drop(queue);
        writer.shutdown().await;

        let received: Vec<Message> = sink_rx.collect().await;
        assert_eq!(received.len(), 10);
    }

    #[tokio::test]
    async fn send_after_writer_exit_fails() {
        let (sink_tx, sink_rx) = unbounded::<Message>();
        drop(sink_rx);
        let (queue, writer) = OutboundQueue::spawn(sink_tx, 1);

        // First frame hits the closed sink and stops the writer.
        let _ = queue.send_text("lost".to_string()).await;
        writer.shutdown().await;

        assert!(queue.is_closed());
        assert_eq!(
            queue.send_text("late".to_string()).await,
            Err(TransportError::WriterClosed)
        );
    }

    #[tokio::test]
    async fn drain_sink_accepts_everything() {
        let (queue, writer) = OutboundQueue::spawn(drain::<Message>(), 2);
        for _ in 0..5 {
            queue.send_text("x".to_string()).await.unwrap();
        }
        drop(queue);
        writer.shutdown().await;
    }
}
