//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `FrameSink`: Serialized text-frame writes to the active connection

use async_trait::async_trait;

/// Errors surfaced by an outbound transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The writer behind the sink has shut down.
    #[error("connection writer closed")]
    WriterClosed,
}

/// Single-writer outbound channel for one connection.
///
/// Implementations must serialize concurrent callers so frames are never
/// interleaved on the wire.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Queue one text frame for sending.
    async fn send_text(&self, frame: String) -> Result<(), TransportError>;
}
