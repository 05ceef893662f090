#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::panic
    )
)]

//! Bybit Stream Client - Resilient Public Market Data Feed
//!
//! Keeps a subscription to Bybit's v5 public WebSocket alive across network
//! failures, normalizes ticker and trade payloads into uniform
//! `(symbol, price, timestamp)` records, and reports per-symbol message
//! rates.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core streaming logic and data types
//!   - `streaming`: Stream modes and normalized records
//!   - `subscription`: Subscription requests and topic derivation
//!   - `rate`: Per-symbol rate accounting
//!
//! - **Application**: Port definitions
//!   - `ports`: Outbound frame sink
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `bybit`: Decoder, session loop, keepalive, reconnect supervisor
//!   - `config`: Command line and environment tunables
//!   - `metrics`: Prometheus exporter
//!   - `telemetry`: Tracing subscriber and OTLP export
//!
//! # Data Flow
//!
//! ```text
//!                ┌──────────────┐  frames  ┌───────────┐ records ┌──────────────┐
//! Bybit WS ─────►│ BybitClient  │─────────►│  Session  │────────►│ StreamEvent  │──► main
//!                │ (reconnect)  │          │ (decode,  │         │   channel    │
//!                └──────────────┘          │  rates)   │         └──────────────┘
//!                       ▲                  └─────┬─────┘
//!                       │    ping / pong         │
//!                       └──── writer task ◄──────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core streaming types with no external dependencies.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::rate::{RateReport, RateSample, RateTracker};
pub use domain::streaming::{NormalizedRecord, StreamMode};
pub use domain::subscription::SubscriptionRequest;

// Ports
pub use application::ports::{FrameSink, TransportError};

// Bybit client
pub use infrastructure::bybit::{
    BybitClient, BybitClientConfig, BybitClientError, ConnectionState, ReconnectConfig, Session,
    SessionConfig, SessionStats, StreamEvent,
};

// Infrastructure config
pub use infrastructure::config::{Category, Cli, ClientSettings, ConfigError, TuningSettings};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
