//! Reconnection Policy
//!
//! Capped exponential backoff with a small deterministic spread:
//!
//! ```text
//! delay(attempt) = min(cap, 2^min(attempt, max_exponent)) + (attempt mod spread)
//! ```
//!
//! measured in `unit`s (one second by default). Retries are unbounded; only
//! cancellation stops them.

use std::time::Duration;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Duration of one backoff step.
    pub unit: Duration,
    /// Largest exponent applied to the doubling term.
    pub max_exponent: u32,
    /// Cap on the doubling term, in units.
    pub max_multiplier: u64,
    /// Modulus of the per-attempt spread, in units (0 disables it).
    pub spread: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(1),
            max_exponent: 5,
            max_multiplier: 30,
            spread: 3,
        }
    }
}

impl ReconnectConfig {
    /// Default shape with a custom step duration.
    #[must_use]
    pub fn with_unit(unit: Duration) -> Self {
        Self {
            unit,
            ..Self::default()
        }
    }

    /// Delay for a given zero-based attempt number.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(self.max_exponent).min(63);
        let doubling = (1_u64 << exponent).min(self.max_multiplier);
        let spread = if self.spread == 0 {
            0
        } else {
            u64::from(attempt % self.spread)
        };
        let units = u32::try_from(doubling + spread).unwrap_or(u32::MAX);
        self.unit.saturating_mul(units)
    }
}

/// Reconnection policy tracking the current attempt.
///
/// # Example
///
/// ```rust
/// use bybit_stream_client::infrastructure::bybit::reconnect::{ReconnectConfig, ReconnectPolicy};
/// use std::time::Duration;
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
///
/// assert_eq!(policy.next_delay(), Duration::from_secs(1));
/// assert_eq!(policy.next_delay(), Duration::from_secs(3));
///
/// // Simulate successful connection
/// policy.reset();
/// assert_eq!(policy.attempt_count(), 0);
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
        }
    }

    /// Delay for the current attempt; advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.config.delay_for_attempt(self.attempt_count);
        self.attempt_count = self.attempt_count.saturating_add(1);
        delay
    }

    /// Reset the policy after a successful connection.
    pub const fn reset(&mut self) {
        self.attempt_count = 0;
    }

    /// Get the current attempt count.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(0, 1)]
    #[test_case(1, 3)]
    #[test_case(2, 6)]
    #[test_case(3, 8)]
    #[test_case(4, 17)]
    #[test_case(5, 32)]
    #[test_case(6, 30)]
    #[test_case(7, 31)]
    #[test_case(100, 31)]
    fn default_delay_table(attempt: u32, secs: u64) {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay_for_attempt(attempt), Duration::from_secs(secs));
    }

    #[test]
    fn default_config_values() {
        let config = ReconnectConfig::default();
        assert_eq!(config.unit, Duration::from_secs(1));
        assert_eq!(config.max_exponent, 5);
        assert_eq!(config.max_multiplier, 30);
        assert_eq!(config.spread, 3);
    }

    #[test]
    fn policy_walks_the_table() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
        let delays: Vec<u64> = (0..8).map(|_| policy.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 3, 6, 8, 17, 32, 30, 31]);
        assert_eq!(policy.attempt_count(), 8);
    }

    #[test]
    fn policy_reset() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
        let _ = policy.next_delay();
        let _ = policy.next_delay();
        assert_eq!(policy.attempt_count(), 2);

        policy.reset();

        assert_eq!(policy.attempt_count(), 0);
        assert_eq!(policy.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn custom_unit_scales_delay() {
        let config = ReconnectConfig::with_unit(Duration::from_millis(10));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(30));
    }

    #[test]
    fn zero_spread_is_pure_doubling() {
        let config = ReconnectConfig {
            spread: 0,
            ..ReconnectConfig::default()
        };
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
    }

    #[test]
    fn unlimited_attempts() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
        for _ in 0..1000 {
            assert!(policy.next_delay() <= Duration::from_secs(32));
        }
    }
}
