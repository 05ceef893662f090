//! Configuration Module
//!
//! Command line parsing and environment-driven tunables for the client.

mod cli;
mod settings;

pub use cli::Cli;
pub use settings::{Category, ClientSettings, ConfigError, TuningSettings};
