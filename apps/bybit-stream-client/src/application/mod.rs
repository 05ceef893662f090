//! Application Layer - Port definitions.
//!
//! This layer defines how the streaming core talks to the outside world
//! without naming a concrete transport.

/// Port interfaces for external systems (outbound frame transport).
pub mod ports;
