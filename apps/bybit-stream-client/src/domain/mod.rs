//! Domain Layer - Core streaming types and business logic.
//!
//! This layer contains the core domain types for market data streaming
//! with no I/O. Everything here is pure Rust and deterministic given its
//! inputs, which is what makes it testable without a live feed.

/// Normalized market data records and stream modes.
pub mod streaming;

/// Subscription requests and topic derivation.
pub mod subscription;

/// Per-symbol message rate accounting.
pub mod rate;
