//! Market Data Streaming Types
//!
//! Core domain types for market data: the stream mode and the normalized
//! `(symbol, price, timestamp)` record every inbound event is reduced to.
//! These types are codec-agnostic.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which public channel family the client subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    /// 24h ticker snapshots/deltas (`tickers.*`).
    #[default]
    Ticker,
    /// Public trade prints (`publicTrade.*`).
    Trade,
}

impl StreamMode {
    /// Parse mode from string. Anything other than `trade` maps to ticker.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "trade" | "trades" => Self::Trade,
            _ => Self::Ticker,
        }
    }

    /// Topic prefix used in subscribe arguments.
    #[must_use]
    pub const fn topic_prefix(&self) -> &'static str {
        match self {
            Self::Ticker => "tickers",
            Self::Trade => "publicTrade",
        }
    }

    /// Lowercase mode name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::Trade => "trade",
        }
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single normalized price observation.
///
/// Only constructed through [`NormalizedRecord::new`], which rejects empty
/// symbols and non-positive or non-finite prices and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Instrument name as reported by the feed (e.g. `BTCUSDT`).
    pub symbol: String,
    /// Last/trade price.
    pub price: f64,
    /// Event time in seconds since the Unix epoch.
    pub timestamp: f64,
}

impl NormalizedRecord {
    /// Build a record, returning `None` unless all three fields are usable.
    #[must_use]
    pub fn new(symbol: impl Into<String>, price: f64, timestamp: f64) -> Option<Self> {
        let symbol = symbol.into();
        if symbol.is_empty() || !is_positive(price) || !is_positive(timestamp) {
            return None;
        }
        Some(Self {
            symbol,
            price,
            timestamp,
        })
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing() {
        assert_eq!(StreamMode::from_str_case_insensitive("trade"), StreamMode::Trade);
        assert_eq!(StreamMode::from_str_case_insensitive("TRADE"), StreamMode::Trade);
        assert_eq!(StreamMode::from_str_case_insensitive("ticker"), StreamMode::Ticker);
        assert_eq!(StreamMode::from_str_case_insensitive("bogus"), StreamMode::Ticker);
    }

    #[test]
    fn mode_topic_prefix() {
        assert_eq!(StreamMode::Ticker.topic_prefix(), "tickers");
        assert_eq!(StreamMode::Trade.topic_prefix(), "publicTrade");
    }

    #[test]
    fn record_requires_positive_fields() {
        assert!(NormalizedRecord::new("BTCUSDT", 1.0, 1.0).is_some());
        assert!(NormalizedRecord::new("", 1.0, 1.0).is_none());
        assert!(NormalizedRecord::new("BTCUSDT", 0.0, 1.0).is_none());
        assert!(NormalizedRecord::new("BTCUSDT", -3.0, 1.0).is_none());
        assert!(NormalizedRecord::new("BTCUSDT", 1.0, 0.0).is_none());
        assert!(NormalizedRecord::new("BTCUSDT", f64::NAN, 1.0).is_none());
        assert!(NormalizedRecord::new("BTCUSDT", 1.0, f64::INFINITY).is_none());
    }
}
