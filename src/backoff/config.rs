//! Backoff controller configuration.

use std::time::Duration;

/// Consecutive soft failures tolerated for one query. The last one is
/// returned to the caller.
pub const MAX_RETRIES: u32 = 3;

/// Consecutive failed queries after which the session circuit opens.
pub const DEFAULT_ABORT_THRESHOLD: u32 = 3;

/// Configuration for pacing, retry and session abort behavior.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Minimum delay between the start of two calls. Applied before the
    /// first call too.
    pub pacing: Duration,

    /// Maximum attempts per query (first try included).
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retries.
    pub max_delay: Duration,

    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,

    /// Consecutive failed queries before the session circuit opens.
    pub abort_threshold: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            pacing: Duration::from_secs(1),
            max_attempts: MAX_RETRIES,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            abort_threshold: DEFAULT_ABORT_THRESHOLD,
        }
    }
}

impl BackoffConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables pacing and retry delays. Intended for tests and replays.
    pub fn immediate() -> Self {
        Self {
            pacing: Duration::ZERO,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Sets the inter-call pacing.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Sets the maximum number of attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the initial retry delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum retry delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// Sets the abort threshold.
    pub fn with_abort_threshold(mut self, threshold: u32) -> Self {
        self.abort_threshold = threshold.max(1);
        self
    }

    /// Calculates the delay before a given retry (1-indexed).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(retry as i32 - 1);

        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_delay as u64)
    }

    /// Returns whether another attempt should be made after `attempts` tries.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BackoffConfig::default();
        assert_eq!(config.max_attempts, MAX_RETRIES);
        assert_eq!(config.pacing, Duration::from_secs(1));
        assert_eq!(config.abort_threshold, 3);
    }

    #[test]
    fn test_delay_doubles() {
        let config = BackoffConfig::new().with_initial_delay(Duration::from_millis(100));

        assert_eq!(config.delay_for_retry(0), Duration::ZERO);
        assert_eq!(config.delay_for_retry(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_retry(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_retry(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped() {
        let config = BackoffConfig::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0);

        // 1 * 10 = 10, but capped at 5
        assert_eq!(config.delay_for_retry(2), Duration::from_secs(5));
    }

    #[test]
    fn test_should_retry() {
        let config = BackoffConfig::new();
        assert!(config.should_retry(1));
        assert!(config.should_retry(2));
        assert!(!config.should_retry(3));

        let config = BackoffConfig::new().with_max_attempts(0);
        assert_eq!(config.max_attempts, 1);
        assert!(!config.should_retry(1));
    }

    #[test]
    fn test_immediate_has_no_delays() {
        let config = BackoffConfig::immediate();
        assert_eq!(config.pacing, Duration::ZERO);
        assert_eq!(config.delay_for_retry(3), Duration::ZERO);
        assert_eq!(config.max_attempts, MAX_RETRIES);
    }
}
