//! Pacing, retry and session-abort control for outbound queries.
//!
//! The backoff controller combines three behaviors in front of a
//! [`QueryExecutor`](crate::core::QueryExecutor):
//!
//! - **Pacing**: a minimum delay between calls, shared by every caller.
//! - **Retry**: soft failures are retried with exponential backoff.
//! - **Session circuit**: consecutive failed queries open a circuit that
//!   rejects further queries until the harvest moves to a new partition.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use roster_harvest::backoff::{BackoffConfig, BackoffController};
//! use roster_harvest::backends::MockExecutor;
//! use std::time::Duration;
//!
//! let config = BackoffConfig::default()
//!     .with_pacing(Duration::from_millis(500))
//!     .with_abort_threshold(5);
//!
//! let controller = BackoffController::new(MockExecutor::new(), config);
//! ```

mod config;
mod controller;
mod state;

pub use config::{BackoffConfig, DEFAULT_ABORT_THRESHOLD, MAX_RETRIES};
pub use controller::BackoffController;
pub use state::{BackoffMetrics, CircuitState};
