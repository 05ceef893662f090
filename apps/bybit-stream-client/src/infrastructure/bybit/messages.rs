//! Bybit WebSocket Message Types
//!
//! Wire format types for the v5 public stream control plane. Data frames
//! have no struct here; their schema differs by topic and the codec reads
//! them as untyped JSON.
//!
//! # Control Messages
//!
//! ```json
//! {"op":"subscribe","args":["tickers.BTCUSDT","tickers.ETHUSDT"]}
//! {"op":"ping","ts":1700000000000}
//! {"op":"pong","ts":1700000000000}
//! {"success":true,"ret_msg":"","conn_id":"a1b2","op":"subscribe"}
//! ```
//!
//! # References
//!
//! - [Public WebSocket](https://bybit-exchange.github.io/docs/v5/ws/connect)

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Control operation carried in the `op` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Topic subscription (request and acknowledgement).
    Subscribe,
    /// Application-level liveness probe.
    Ping,
    /// Reply to a liveness probe.
    Pong,
}

impl Operation {
    /// Match the raw `op` string.
    #[must_use]
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "subscribe" => Some(Self::Subscribe),
            "ping" => Some(Self::Ping),
            "pong" => Some(Self::Pong),
            _ => None,
        }
    }
}

/// Subscribe request.
///
/// # Wire Format (JSON)
/// ```json
/// {"op":"subscribe","args":["publicTrade.BTCUSDT"]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeMessage {
    /// Always `subscribe`.
    pub op: Operation,
    /// Topic strings.
    pub args: Vec<String>,
}

impl SubscribeMessage {
    /// Create a subscribe request for `args`.
    #[must_use]
    pub const fn new(args: Vec<String>) -> Self {
        Self {
            op: Operation::Subscribe,
            args,
        }
    }

    /// Serialize to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Application-level ping or pong.
///
/// # Wire Format (JSON)
/// ```json
/// {"op":"ping","ts":1700000000000}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatMessage {
    /// `ping` or `pong`.
    pub op: Operation,
    /// Correlation token, milliseconds since the Unix epoch.
    pub ts: i64,
}

impl HeartbeatMessage {
    /// Outbound ping stamped with `ts`.
    #[must_use]
    pub const fn ping(ts: i64) -> Self {
        Self {
            op: Operation::Ping,
            ts,
        }
    }

    /// Pong echoing `ts`.
    #[must_use]
    pub const fn pong(ts: i64) -> Self {
        Self {
            op: Operation::Pong,
            ts,
        }
    }

    /// Serialize to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Acknowledgement of a subscribe request.
///
/// Read leniently from an untyped root: a missing `success` counts as
/// success, other missing fields default to empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubscribeAck {
    /// Whether the server accepted every topic in the request.
    pub success: bool,
    /// Server message, e.g. `Invalid symbol :[tickers.TAOUSDT]`.
    pub ret_msg: String,
    /// Server-assigned connection id.
    pub conn_id: String,
}

impl SubscribeAck {
    /// Extract an acknowledgement from a parsed frame.
    #[must_use]
    pub fn from_value(root: &Value) -> Self {
        let text = |key: &str| {
            root.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            success: root.get("success").and_then(Value::as_bool).unwrap_or(true),
            ret_msg: text("ret_msg"),
            conn_id: text("conn_id"),
        }
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
