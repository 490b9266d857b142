//! # Fibonacci Backoff
//!
//! Progressive retry delays for users whose reconciliation keeps failing.
//! Grows more slowly than exponential backoff, so a stuck Conflict or a
//! malformed Secret is retried regularly without hammering the API server.
//!
//! Values are tracked in minutes and returned in seconds.
//! Default sequence: 1m, 1m, 2m, 3m, 5m, 8m, 10m (max).
//!
//! `NotReady` outcomes never enter this sequence; they requeue on a fixed
//! interval instead.
//!
//! ## Usage
//!
//! ```rust
//! use user_pki_controller::controller::backoff::FibonacciBackoff;
//!
//! let mut backoff = FibonacciBackoff::new(1, 10); // 1 minute min, 10 minutes max
//! assert_eq!(backoff.next_backoff_seconds(), 60);  // 1m = 60s
//! assert_eq!(backoff.next_backoff_seconds(), 60);  // 1m = 60s
//! assert_eq!(backoff.next_backoff_seconds(), 120); // 2m = 120s
//! assert_eq!(backoff.next_backoff_seconds(), 180); // 3m = 180s
//! ```

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, capped at `max_minutes`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Minimum backoff value in minutes (for reset)
    min_minutes: u64,
    /// Previous backoff value in minutes
    prev_minutes: u64,
    /// Current backoff value in minutes
    current_minutes: u64,
    /// Maximum backoff value in minutes
    max_minutes: u64,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min_minutes` and capped at `max_minutes`
    ///
    /// A `max_minutes` below `min_minutes` is raised to `min_minutes`.
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        let min_minutes = min_minutes.max(1);
        Self {
            min_minutes,
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes: max_minutes.max(min_minutes),
        }
    }

    /// Get the next backoff duration in seconds and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result_seconds = self.current_minutes * 60;

        let next_minutes = self.prev_minutes + self.current_minutes;
        self.prev_minutes = self.current_minutes;
        self.current_minutes = std::cmp::min(next_minutes, self.max_minutes);

        result_seconds
    }

    /// Get the next backoff duration as a `Duration` and advance the sequence
    ///
    /// ```
    /// use user_pki_controller::controller::backoff::FibonacciBackoff;
    /// use std::time::Duration;
    ///
    /// let mut backoff = FibonacciBackoff::new(1, 10);
    /// assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
    /// ```
    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fibonacci_backoff_sequence() {
        let mut backoff = FibonacciBackoff::new(1, 10);

        // 1m, 1m, 2m, 3m, 5m, 8m, 10m (max)
        assert_eq!(backoff.next_backoff_seconds(), 60);
        assert_eq!(backoff.next_backoff_seconds(), 60);
        assert_eq!(backoff.next_backoff_seconds(), 120);
        assert_eq!(backoff.next_backoff_seconds(), 180);
        assert_eq!(backoff.next_backoff_seconds(), 300);
        assert_eq!(backoff.next_backoff_seconds(), 480);
        assert_eq!(backoff.next_backoff_seconds(), 600);
        // 13m would follow, capped
        assert_eq!(backoff.next_backoff_seconds(), 600);
    }

    #[test]
    fn test_fibonacci_backoff_reset() {
        let mut backoff = FibonacciBackoff::new(1, 10);
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();

        backoff.reset();

        assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(120));
    }

    #[test]
    fn test_inverted_bounds_are_clamped() {
        let mut backoff = FibonacciBackoff::new(5, 2);
        assert_eq!(backoff.next_backoff_seconds(), 300);
        assert_eq!(backoff.next_backoff_seconds(), 300);
        assert_eq!(backoff.next_backoff_seconds(), 300);
    }

    #[test]
    fn test_zero_minimum_still_waits() {
        let mut backoff = FibonacciBackoff::new(0, 10);
        assert_eq!(backoff.next_backoff_seconds(), 60);
    }
}
