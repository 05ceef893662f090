//! Client Configuration Settings
//!
//! Configuration types for the stream client. Identity (mode, symbols,
//! category) comes from the command line; tunables come from environment
//! variables with defaults.

use std::time::Duration;

use crate::domain::streaming::StreamMode;
use crate::domain::subscription::SubscriptionRequest;
use crate::infrastructure::bybit::client::{BybitClientConfig, DEFAULT_MAX_FRAME_BYTES};
use crate::infrastructure::bybit::heartbeat::KeepaliveConfig;
use crate::infrastructure::bybit::session::SessionConfig;

/// Bybit market segment; selects the public endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Category {
    /// Spot market.
    #[default]
    Spot,
    /// USDT perpetuals.
    Linear,
}

impl Category {
    /// Parse category from string. Anything other than `linear` maps to spot.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "linear" => Self::Linear,
            _ => Self::Spot,
        }
    }

    /// Category name as used in the endpoint path.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Linear => "linear",
        }
    }

    /// Public WebSocket endpoint with compression disabled.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "wss://stream.bybit.com/v5/public/{}?compress=false",
            self.as_str()
        )
    }
}

/// Tunables read from `BYBIT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuningSettings {
    /// Keepalive ping interval.
    pub keepalive_interval: Duration,
    /// Idle watchdog (`None` = disabled).
    pub idle_timeout: Option<Duration>,
    /// Rate report window.
    pub report_window: Duration,
    /// Text frames logged verbatim at the start of each session.
    pub raw_preview_frames: usize,
    /// Maximum WebSocket frame/message size.
    pub max_frame_bytes: usize,
    /// Topics per subscribe message.
    pub subscribe_batch: usize,
}

impl Default for TuningSettings {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(30)),
            report_window: Duration::from_secs(10),
            raw_preview_frames: 10,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            subscribe_batch: 10,
        }
    }
}

impl TuningSettings {
    /// Load tunables from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load tunables through `lookup`; unset or unparseable values keep
    /// their defaults.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let idle_secs = parse_env_u64(&lookup, "BYBIT_IDLE_TIMEOUT_SECS", 30);

        Self {
            keepalive_interval: parse_env_duration_secs(
                &lookup,
                "BYBIT_KEEPALIVE_INTERVAL_SECS",
                defaults.keepalive_interval,
            ),
            idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
            report_window: parse_env_duration_secs(
                &lookup,
                "BYBIT_REPORT_WINDOW_SECS",
                defaults.report_window,
            ),
            raw_preview_frames: parse_env_usize(
                &lookup,
                "BYBIT_RAW_PREVIEW_FRAMES",
                defaults.raw_preview_frames,
            ),
            max_frame_bytes: parse_env_nonzero_usize(
                &lookup,
                "BYBIT_MAX_FRAME_BYTES",
                defaults.max_frame_bytes,
            ),
            subscribe_batch: parse_env_usize(
                &lookup,
                "BYBIT_SUBSCRIBE_BATCH",
                defaults.subscribe_batch,
            ),
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Stream mode.
    pub mode: StreamMode,
    /// Market category.
    pub category: Category,
    /// Comma-separated base assets.
    pub symbols: String,
    /// Endpoint override.
    pub url: Option<String>,
    /// Prometheus listener port (0 = disabled).
    pub metrics_port: u16,
    /// Environment tunables.
    pub tuning: TuningSettings,
}

impl ClientSettings {
    /// WebSocket URL: the override if set, else the category endpoint.
    #[must_use]
    pub fn url(&self) -> String {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map_or_else(|| self.category.endpoint(), ToString::to_string)
    }

    /// Normalized subscription request.
    ///
    /// # Errors
    ///
    /// Returns an error if no symbol survives normalization.
    pub fn subscription(&self) -> Result<SubscriptionRequest, ConfigError> {
        let request = SubscriptionRequest::from_symbol_list(self.mode, &self.symbols);
        if request.is_empty() {
            return Err(ConfigError::EmptySymbols(self.symbols.clone()));
        }
        Ok(request)
    }

    /// Build the client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the symbol list is empty.
    pub fn client_config(&self) -> Result<BybitClientConfig, ConfigError> {
        let mut config = BybitClientConfig::new(self.url(), self.subscription()?);
        config.max_frame_bytes = self.tuning.max_frame_bytes;
        config.session = SessionConfig {
            keepalive: KeepaliveConfig::new(self.tuning.keepalive_interval),
            report_window: self.tuning.report_window,
            raw_preview_frames: self.tuning.raw_preview_frames,
            idle_timeout: self.tuning.idle_timeout,
            subscribe_batch: self.tuning.subscribe_batch,
        };
        Ok(config)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The symbol list contains no usable entry.
    #[error("no symbols to subscribe to in {0:?}")]
    EmptySymbols(String),
}

fn parse_env_u64<F>(lookup: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize<F>(lookup: &F, key: &str, default: usize) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_env_nonzero_usize<F>(lookup: &F, key: &str, default: usize) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn parse_env_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map_or(default, Duration::from_secs)
}
