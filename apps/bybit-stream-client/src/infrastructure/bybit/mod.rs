//! Bybit WebSocket Adapters
//!
//! Client for Bybit's v5 public market data stream:
//!
//! - **codec**: frame classification and record normalization
//! - **session**: one connection's receive loop and keepalive
//! - **client**: reconnect supervisor around sessions

pub mod client;
pub mod codec;
pub mod heartbeat;
pub mod messages;
pub mod reconnect;
pub mod session;
pub mod writer;

pub use client::{BybitClient, BybitClientConfig, BybitClientError, ConnectionState, StreamEvent};
pub use codec::{DecodedFrame, FrameDecoder, IgnoreReason, decode_records};
pub use heartbeat::{KeepaliveAgent, KeepaliveConfig};
pub use messages::{HeartbeatMessage, Operation, SubscribeAck, SubscribeMessage};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use session::{FrameOutcome, Session, SessionConfig, SessionStats};
pub use writer::{OutboundQueue, WriterTask};
