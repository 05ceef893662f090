//! Message Rate Tracking
//!
//! Counts normalized records per instrument and, once per reporting window,
//! turns the counts into messages-per-second samples.
//!
//! The tracker is clock-agnostic: callers pass `now` explicitly so reports
//! can be driven deterministically in tests.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Default reporting window.
pub const DEFAULT_REPORT_WINDOW: Duration = Duration::from_secs(10);

/// Observed rate for one instrument over one window.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSample {
    /// Instrument name (`BTCUSDT`).
    pub symbol: String,
    /// Records observed during the window.
    pub count: u64,
    /// `count / elapsed_seconds`.
    pub rate: f64,
}

impl fmt::Display for RateSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.2} msg/s", self.symbol, self.rate)
    }
}

/// One flushed reporting window.
#[derive(Debug, Clone, PartialEq)]
pub struct RateReport {
    /// Actual time covered by the report.
    pub elapsed: Duration,
    /// One sample per tracked instrument, in subscription order.
    pub samples: Vec<RateSample>,
}

/// Per-instrument counters with a fixed reporting window.
#[derive(Debug)]
pub struct RateTracker {
    tracked: Vec<String>,
    counts: HashMap<String, u64>,
    window: Duration,
    last_report: Instant,
}

impl RateTracker {
    /// Create a tracker reporting on `tracked` instruments every `window`.
    #[must_use]
    pub fn new(tracked: Vec<String>, window: Duration, now: Instant) -> Self {
        Self {
            tracked,
            counts: HashMap::new(),
            window,
            last_report: now,
        }
    }

    /// Count one record for `symbol`.
    pub fn observe(&mut self, symbol: &str) {
        *self.counts.entry(symbol.to_string()).or_insert(0) += 1;
    }

    /// Records counted for `symbol` since the last report.
    #[must_use]
    pub fn count(&self, symbol: &str) -> u64 {
        self.counts.get(symbol).copied().unwrap_or(0)
    }

    /// Flush a report if at least one window has passed since the last one.
    ///
    /// Counts for untracked instruments are discarded with the flush so the
    /// map stays bounded by what the feed actually sends per window.
    pub fn maybe_report(&mut self, now: Instant) -> Option<RateReport> {
        let elapsed = now.saturating_duration_since(self.last_report);
        if elapsed < self.window {
            return None;
        }

        let secs = elapsed.as_secs_f64();
        let samples = self
            .tracked
            .iter()
            .map(|symbol| {
                let count = self.count(symbol);
                #[allow(clippy::cast_precision_loss)]
                let rate = if secs > 0.0 { count as f64 / secs } else { 0.0 };
                RateSample {
                    symbol: symbol.clone(),
                    count,
                    rate,
                }
            })
            .collect();

        self.counts.clear();
        self.last_report = now;

        Some(RateReport { elapsed, samples })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(symbols: &[&str], start: Instant) -> RateTracker {
        RateTracker::new(
            symbols.iter().map(|s| (*s).to_string()).collect(),
            DEFAULT_REPORT_WINDOW,
            start,
        )
    }

    #[test]
    fn reports_rate_after_window() {
        let start = Instant::now();
        let mut tracker = tracker(&["BTCUSDT"], start);
        for _ in 0..37 {
            tracker.observe("BTCUSDT");
        }

        let report = tracker
            .maybe_report(start + Duration::from_secs(10))
            .expect("window elapsed");
        assert_eq!(report.samples.len(), 1);
        assert_eq!(report.samples[0].count, 37);
        assert!((report.samples[0].rate - 3.7).abs() < 1e-9);
        assert_eq!(report.samples[0].to_string(), "BTCUSDT: 3.70 msg/s");
        assert_eq!(tracker.count("BTCUSDT"), 0);
    }

    #[test]
    fn no_report_before_window() {
        let start = Instant::now();
        let mut tracker = tracker(&["BTCUSDT"], start);
        tracker.observe("BTCUSDT");
        assert!(tracker.maybe_report(start + Duration::from_secs(9)).is_none());
        assert_eq!(tracker.count("BTCUSDT"), 1);
    }

    #[test]
    fn immediate_second_call_emits_nothing() {
        let start = Instant::now();
        let mut tracker = tracker(&["BTCUSDT"], start);
        tracker.observe("BTCUSDT");
        let at = start + Duration::from_secs(10);
        assert!(tracker.maybe_report(at).is_some());
        assert!(tracker.maybe_report(at).is_none());
        assert!(tracker.maybe_report(at + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn silent_symbols_report_zero() {
        let start = Instant::now();
        let mut tracker = tracker(&["BTCUSDT", "ETHUSDT"], start);
        tracker.observe("BTCUSDT");

        let report = tracker.maybe_report(start + Duration::from_secs(10)).unwrap();
        assert_eq!(report.samples[1].symbol, "ETHUSDT");
        assert_eq!(report.samples[1].count, 0);
        assert_eq!(report.samples[1].to_string(), "ETHUSDT: 0.00 msg/s");
    }

    #[test]
    fn rate_uses_actual_elapsed_time() {
        let start = Instant::now();
        let mut tracker = tracker(&["BTCUSDT"], start);
        for _ in 0..40 {
            tracker.observe("BTCUSDT");
        }
        let report = tracker.maybe_report(start + Duration::from_secs(20)).unwrap();
        assert_eq!(report.elapsed, Duration::from_secs(20));
        assert!((report.samples[0].rate - 2.0).abs() < 1e-9);
    }

    #[test]
    fn untracked_symbols_are_counted_but_not_reported() {
        let start = Instant::now();
        let mut tracker = tracker(&["BTCUSDT"], start);
        tracker.observe("DOGEUSDT");
        assert_eq!(tracker.count("DOGEUSDT"), 1);

        let report = tracker.maybe_report(start + Duration::from_secs(10)).unwrap();
        assert!(report.samples.iter().all(|s| s.symbol != "DOGEUSDT"));
        assert_eq!(tracker.count("DOGEUSDT"), 0);
    }
}
