//! Subscription Request Types
//!
//! A subscription is a stream mode plus an ordered list of base assets.
//! Topics and instrument names are derived from it, never stored, so the
//! subscribe message and the rate tracker keys cannot drift apart.
//!
//! # Topic format
//!
//! ```text
//! <prefix>.<BASE>USDT      e.g. tickers.BTCUSDT, publicTrade.ETHUSDT
//! ```

use crate::domain::streaming::StreamMode;

/// Quote asset appended to every base symbol.
pub const QUOTE_ASSET: &str = "USDT";

/// Base assets subscribed when none are configured.
pub const DEFAULT_SYMBOLS: &str = "BTC,ETH,XRP";

/// What to subscribe to on every (re)connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    mode: StreamMode,
    symbols: Vec<String>,
}

impl SubscriptionRequest {
    /// Create a request, uppercasing symbols and dropping blank entries.
    ///
    /// Duplicates are kept; the order of `symbols` is preserved.
    #[must_use]
    pub fn new<I, S>(mode: StreamMode, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols = symbols
            .into_iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self { mode, symbols }
    }

    /// Create a request from a comma-separated list such as `"btc, eth,,xrp"`.
    #[must_use]
    pub fn from_symbol_list(mode: StreamMode, list: &str) -> Self {
        Self::new(mode, list.split(','))
    }

    /// Stream mode.
    #[must_use]
    pub const fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Normalized base assets.
    #[must_use]
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Check if there is nothing to subscribe to.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Instrument names (`BTCUSDT`), the canonical per-symbol key.
    #[must_use]
    pub fn instruments(&self) -> Vec<String> {
        self.symbols.iter().map(|s| instrument_name(s)).collect()
    }

    /// Subscribe topics in symbol order.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        let prefix = self.mode.topic_prefix();
        self.symbols
            .iter()
            .map(|s| format!("{prefix}.{}", instrument_name(s)))
            .collect()
    }

    /// Topics split into batches of at most `batch_size` (0 means one batch).
    #[must_use]
    pub fn topic_batches(&self, batch_size: usize) -> Vec<Vec<String>> {
        let topics = self.topics();
        if topics.is_empty() {
            return Vec::new();
        }
        if batch_size == 0 {
            return vec![topics];
        }
        topics.chunks(batch_size).map(<[String]>::to_vec).collect()
    }
}

/// Instrument name for a base asset.
#[must_use]
pub fn instrument_name(base: &str) -> String {
    format!("{}{QUOTE_ASSET}", base.trim().to_uppercase())
}
