//! Query executor implementations.
//!
//! This module contains implementations of the `QueryExecutor` trait.
//!
//! ## Available Backends
//!
//! - [`mock`] - A scripted executor for testing
//! - [`graphql`] - The live GraphQL endpoint over HTTP (requires `graphql` feature)
//!
//! ## Implementing a Custom Backend
//!
//! To add a new transport, implement the `QueryExecutor` trait:
//!
//! ```rust,ignore
//! use roster_harvest::core::{HarvestError, QueryDescriptor, QueryExecutor};
//! use async_trait::async_trait;
//! use serde_json::Value;
//!
//! #[derive(Debug)]
//! pub struct ReplayExecutor {
//!     // Recorded responses
//! }
//!
//! #[async_trait]
//! impl QueryExecutor for ReplayExecutor {
//!     fn name(&self) -> &str {
//!         "replay"
//!     }
//!
//!     async fn execute(&self, query: &QueryDescriptor) -> Result<Value, HarvestError> {
//!         // Look up a recorded response for `query`
//!         todo!()
//!     }
//! }
//! ```

pub mod mock;

#[cfg(feature = "graphql")]
pub mod graphql;

// Re-exports
pub use mock::{MockExecutor, MockReply};

#[cfg(feature = "graphql")]
pub use graphql::{classify_response, GraphQlConfig, GraphQlExecutor};
