//! Session circuit state machine.

use serde::{Deserialize, Serialize};

/// The current state of the session circuit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed; queries pass through normally.
    Closed {
        /// Number of consecutive failed queries.
        consecutive_failures: u32,
    },

    /// Circuit is open; queries are rejected without a network call.
    Open {
        /// Consecutive failed queries when the circuit opened.
        consecutive_failures: u32,
        /// The failure that opened the circuit.
        last_error: String,
    },

    /// Circuit is half-open; one probe query is allowed through.
    HalfOpen {
        /// Consecutive failed queries carried over from the open state.
        consecutive_failures: u32,
        /// Whether the probe has been handed out.
        probe_in_flight: bool,
    },
}

impl CircuitState {
    /// Creates a new closed state.
    pub fn closed() -> Self {
        Self::Closed {
            consecutive_failures: 0,
        }
    }

    /// Returns `true` if the circuit is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    /// Returns `true` if the circuit is open.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Returns `true` if the circuit is half-open.
    pub fn is_half_open(&self) -> bool {
        matches!(self, Self::HalfOpen { .. })
    }

    /// Returns the consecutive failure count if closed.
    pub fn consecutive_failures(&self) -> Option<u32> {
        match self {
            Self::Closed {
                consecutive_failures,
            } => Some(*consecutive_failures),
            _ => None,
        }
    }

    /// Returns the name of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Closed { .. } => "closed",
            Self::Open { .. } => "open",
            Self::HalfOpen { .. } => "half_open",
        }
    }
}

impl Default for CircuitState {
    fn default() -> Self {
        Self::closed()
    }
}

/// Counters describing controller behavior over a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffMetrics {
    /// Network calls made (retries included).
    pub total_calls: u64,
    /// Calls that succeeded.
    pub successes: u64,
    /// Calls that ended in a soft failure.
    pub soft_failures: u64,
    /// Calls that ended in a hard failure.
    pub hard_failures: u64,
    /// Retries performed.
    pub retries: u64,
    /// Queries rejected because the circuit was open.
    pub rejected: u64,
    /// Number of times the circuit has opened.
    pub times_opened: u64,
    /// Number of times the circuit has closed from half-open.
    pub times_closed: u64,
}

impl BackoffMetrics {
    /// Creates new empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful call.
    pub fn record_success(&mut self) {
        self.total_calls += 1;
        self.successes += 1;
    }

    /// Records a call that ended in a soft failure.
    pub fn record_soft_failure(&mut self) {
        self.total_calls += 1;
        self.soft_failures += 1;
    }

    /// Records a call that ended in a hard failure.
    pub fn record_hard_failure(&mut self) {
        self.total_calls += 1;
        self.hard_failures += 1;
    }

    /// Records a retry.
    pub fn record_retry(&mut self) {
        self.retries += 1;
    }

    /// Records a query rejected by the open circuit.
    pub fn record_rejected(&mut self) {
        self.rejected += 1;
    }

    /// Records that the circuit opened.
    pub fn record_opened(&mut self) {
        self.times_opened += 1;
    }

    /// Records that the circuit closed.
    pub fn record_closed(&mut self) {
        self.times_closed += 1;
    }

    /// Returns the share of calls that succeeded (0.0 to 1.0).
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 1.0;
        }
        self.successes as f64 / self.total_calls as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_state_default() {
        let state = CircuitState::default();
        assert!(state.is_closed());
        assert_eq!(state.consecutive_failures(), Some(0));
    }

    #[test]
    fn test_circuit_state_names() {
        assert_eq!(CircuitState::closed().name(), "closed");
        assert_eq!(
            CircuitState::Open {
                consecutive_failures: 3,
                last_error: "timeout".into(),
            }
            .name(),
            "open"
        );
        assert_eq!(
            CircuitState::HalfOpen {
                consecutive_failures: 3,
                probe_in_flight: false,
            }
            .name(),
            "half_open"
        );
    }

    #[test]
    fn test_metrics() {
        let mut metrics = BackoffMetrics::new();
        assert_eq!(metrics.success_rate(), 1.0);

        metrics.record_soft_failure();
        metrics.record_retry();
        metrics.record_success();
        metrics.record_hard_failure();

        assert_eq!(metrics.total_calls, 3);
        assert_eq!(metrics.retries, 1);
        assert!((metrics.success_rate() - 0.333).abs() < 0.01);
    }
}
