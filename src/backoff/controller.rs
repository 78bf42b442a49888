//! Backoff controller implementation.

use crate::backoff::config::BackoffConfig;
use crate::backoff::state::{BackoffMetrics, CircuitState};
use crate::core::{FailureClass, HarvestError, HarvestResult, QueryDescriptor, QueryExecutor};

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{RwLock, RwLockWriteGuard};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Pacing, retry and session-abort wrapper around a query executor.
///
/// The controller is the only path from the harvest loop to the network.
/// Every call it makes is paced, soft failures are retried with exponential
/// backoff, and a run of consecutive failed queries trips a session circuit.
///
/// # States
///
/// - **Closed**: Normal operation. Queries pass through, failed queries are counted.
/// - **Open**: Too many consecutive failed queries. Queries are rejected with
///   [`HarvestError::SessionAbort`] without touching the network.
/// - **Half-Open**: Entered when the harvest begins a new partition. One probe
///   query is let through; success closes the circuit, failure reopens it.
///
/// # Example
///
/// ```rust,ignore
/// use roster_harvest::backoff::{BackoffConfig, BackoffController};
/// use roster_harvest::backends::MockExecutor;
///
/// let controller = BackoffController::new(MockExecutor::new(), BackoffConfig::default());
/// let payload = controller.run(&query).await?;
/// ```
pub struct BackoffController<E: QueryExecutor> {
    /// The wrapped executor.
    inner: E,
    /// Current state of the session circuit.
    state: RwLock<CircuitState>,
    /// Configuration.
    config: BackoffConfig,
    /// Metrics.
    metrics: RwLock<BackoffMetrics>,
    /// Start of the most recent call, shared by every caller.
    last_call: Mutex<Option<Instant>>,
    /// Retries performed by the current run.
    current_retries: AtomicU32,
}

impl<E: QueryExecutor> BackoffController<E> {
    /// Creates a new controller around the given executor.
    pub fn new(executor: E, config: BackoffConfig) -> Self {
        Self {
            inner: executor,
            state: RwLock::new(CircuitState::closed()),
            config,
            metrics: RwLock::new(BackoffMetrics::new()),
            last_call: Mutex::new(None),
            current_retries: AtomicU32::new(0),
        }
    }

    /// Returns the current state of the session circuit.
    pub fn state(&self) -> CircuitState {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns a copy of the current metrics.
    pub fn metrics(&self) -> BackoffMetrics {
        self.metrics
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns the number of retries performed by the current (or last) run.
    pub fn current_retries(&self) -> u32 {
        self.current_retries.load(Ordering::Relaxed)
    }

    /// Returns a reference to the wrapped executor.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Signals that the harvest loop is starting a new partition.
    ///
    /// An open circuit moves to half-open so the next query can probe the
    /// endpoint. Returns `true` if that transition happened.
    pub fn begin_partition(&self) -> bool {
        let mut state = self.write_state();
        if let CircuitState::Open {
            consecutive_failures,
            ..
        } = &*state
        {
            tracing::info!(
                executor = self.inner.name(),
                consecutive_failures = *consecutive_failures,
                "Session circuit half-open, probing endpoint"
            );
            *state = CircuitState::HalfOpen {
                consecutive_failures: *consecutive_failures,
                probe_in_flight: false,
            };
            return true;
        }
        false
    }

    /// Forces the circuit into the open state.
    pub fn force_open(&self, reason: impl Into<String>) {
        *self.write_state() = CircuitState::Open {
            consecutive_failures: self.config.abort_threshold,
            last_error: reason.into(),
        };
        self.write_metrics().record_opened();
    }

    /// Runs one query with pacing, retries and session-abort accounting.
    ///
    /// # Errors
    ///
    /// - The last soft failure once the attempt budget is spent.
    /// - The hard failure, unretried.
    /// - [`HarvestError::SessionAbort`] if the circuit is open, or if this
    ///   query's failure opened it.
    pub async fn run(&self, query: &QueryDescriptor) -> HarvestResult<Value> {
        self.run_decoded(query, Ok).await
    }

    /// Runs one query and decodes its payload before settling the outcome.
    ///
    /// A payload that `decode` rejects counts as a hard failure of the
    /// query: it is not retried and it feeds the session circuit the same
    /// way a failed request does.
    ///
    /// # Errors
    ///
    /// The same as [`run`](Self::run), plus the decode error.
    pub async fn run_decoded<T, F>(&self, query: &QueryDescriptor, decode: F) -> HarvestResult<T>
    where
        F: FnOnce(Value) -> HarvestResult<T> + Send,
    {
        self.current_retries.store(0, Ordering::Relaxed);
        self.admit()?;

        let mut attempts = 0;
        loop {
            self.pace().await;
            attempts += 1;

            let outcome = self.inner.execute(query).await;
            match outcome {
                Ok(payload) => {
                    return match decode(payload) {
                        Ok(decoded) => {
                            self.record_success();
                            Ok(decoded)
                        }
                        Err(e) => {
                            self.write_metrics().record_hard_failure();
                            Err(self.record_failure(e))
                        }
                    };
                }
                Err(e) if e.is_retryable() => {
                    self.write_metrics().record_soft_failure();

                    if !self.config.should_retry(attempts) {
                        tracing::debug!(
                            query = %query.label(),
                            attempts,
                            error = %e,
                            "Retries exhausted"
                        );
                        return Err(self.record_failure(e));
                    }

                    let retry = self.current_retries.fetch_add(1, Ordering::Relaxed) + 1;
                    self.write_metrics().record_retry();
                    let delay = match &e {
                        HarvestError::RateLimited {
                            retry_after: Some(wait),
                            ..
                        } => (*wait).max(self.config.delay_for_retry(retry)),
                        _ => self.config.delay_for_retry(retry),
                    };

                    tracing::debug!(
                        query = %query.label(),
                        retry,
                        max_attempts = self.config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying query"
                    );

                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) if e.class() == FailureClass::Hard => {
                    self.write_metrics().record_hard_failure();
                    return Err(self.record_failure(e));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Checks if a query may go through.
    fn admit(&self) -> Result<(), HarvestError> {
        let mut state = self.write_state();

        let rejection = match &mut *state {
            CircuitState::Closed { .. } => return Ok(()),

            CircuitState::Open {
                consecutive_failures,
                last_error,
            } => HarvestError::SessionAbort {
                consecutive_failures: *consecutive_failures,
                last_error: last_error.clone(),
            },

            CircuitState::HalfOpen {
                consecutive_failures,
                probe_in_flight,
            } => {
                if !*probe_in_flight {
                    *probe_in_flight = true;
                    return Ok(());
                }
                HarvestError::SessionAbort {
                    consecutive_failures: *consecutive_failures,
                    last_error: "probe query in flight".to_string(),
                }
            }
        };

        drop(state);
        self.write_metrics().record_rejected();
        Err(rejection)
    }

    /// Records a successful query.
    fn record_success(&self) {
        self.write_metrics().record_success();

        let mut state = self.write_state();
        if state.is_half_open() {
            tracing::info!(executor = self.inner.name(), "Session circuit closed after probe");
            self.write_metrics().record_closed();
        }
        *state = CircuitState::closed();
    }

    /// Records a failed query, opening the circuit at the threshold.
    ///
    /// Returns the error to hand upward: the original one, or a session
    /// abort if this failure opened the circuit.
    fn record_failure(&self, error: HarvestError) -> HarvestError {
        let mut state = self.write_state();

        let consecutive_failures = match &*state {
            CircuitState::Closed {
                consecutive_failures,
            } => {
                let count = consecutive_failures + 1;
                if count < self.config.abort_threshold {
                    *state = CircuitState::Closed {
                        consecutive_failures: count,
                    };
                    return error;
                }
                count
            }
            // A failed probe reopens immediately.
            CircuitState::HalfOpen {
                consecutive_failures,
                ..
            } => consecutive_failures + 1,
            CircuitState::Open { .. } => return error,
        };

        let last_error = error.to_string();
        tracing::warn!(
            executor = self.inner.name(),
            consecutive_failures,
            error = %last_error,
            "Session circuit opened"
        );

        *state = CircuitState::Open {
            consecutive_failures,
            last_error: last_error.clone(),
        };
        self.write_metrics().record_opened();

        HarvestError::SessionAbort {
            consecutive_failures,
            last_error,
        }
    }

    /// Waits until the pacing interval since the previous call has elapsed.
    async fn pace(&self) {
        let mut last_call = self.last_call.lock().await;
        let wait = match *last_call {
            Some(last) => (last + self.config.pacing).saturating_duration_since(Instant::now()),
            None => self.config.pacing,
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        *last_call = Some(Instant::now());
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CircuitState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_metrics(&self) -> RwLockWriteGuard<'_, BackoffMetrics> {
        self.metrics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<E: QueryExecutor> fmt::Debug for BackoffController<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackoffController")
            .field("inner", &self.inner)
            .field(
                "state",
                &*self
                    .state
                    .read()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
            )
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl<E: QueryExecutor> QueryExecutor for BackoffController<E> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, query: &QueryDescriptor) -> Result<Value, HarvestError> {
        self.run(query).await
    }
}
