//! The query executor seam.
//!
//! Everything that talks to the remote directory implements
//! [`QueryExecutor`]. The backoff controller wraps an executor, and the
//! harvester only ever talks to the controller.

use crate::core::error::HarvestError;
use crate::core::query::QueryDescriptor;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// Performs one round trip for one query and classifies the outcome.
///
/// # Implementation Notes
///
/// - `Ok(payload)` means HTTP 200 without an error envelope. The payload is
///   the full parsed response body (including the top-level `data` key).
/// - Transient failures (timeouts, connection errors, 429, 5xx, other
///   non-200 statuses) must map to a [`FailureClass::Soft`] error.
/// - An error envelope on a 200 response must map to
///   [`HarvestError::Rejected`].
/// - Implementations must not retry or sleep; pacing and retries belong to
///   the [`BackoffController`](crate::backoff::BackoffController).
///
/// [`FailureClass::Soft`]: crate::core::FailureClass::Soft
///
/// # Example Implementation
///
/// ```rust,ignore
/// use roster_harvest::core::{HarvestError, QueryDescriptor, QueryExecutor};
/// use async_trait::async_trait;
/// use serde_json::Value;
///
/// #[derive(Debug)]
/// struct FixtureExecutor {
///     body: Value,
/// }
///
/// #[async_trait]
/// impl QueryExecutor for FixtureExecutor {
///     fn name(&self) -> &str {
///         "fixture"
///     }
///
///     async fn execute(&self, _query: &QueryDescriptor) -> Result<Value, HarvestError> {
///         Ok(self.body.clone())
///     }
/// }
/// ```
#[async_trait]
pub trait QueryExecutor: Send + Sync + Debug {
    /// Returns a stable name for this executor, used in errors and logs.
    fn name(&self) -> &str;

    /// Executes one query.
    ///
    /// # Errors
    ///
    /// Returns a soft failure for transport problems and a hard failure for
    /// application-level rejections. Never returns `SessionAbort`.
    async fn execute(&self, query: &QueryDescriptor) -> Result<Value, HarvestError>;
}

#[async_trait]
impl<E: QueryExecutor + ?Sized> QueryExecutor for Arc<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn execute(&self, query: &QueryDescriptor) -> Result<Value, HarvestError> {
        (**self).execute(query).await
    }
}

/// An arc-wrapped executor for shared ownership.
pub type ArcExecutor = Arc<dyn QueryExecutor>;
