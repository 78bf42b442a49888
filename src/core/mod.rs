//! Core types and traits for the roster_harvest library.
//!
//! This module provides the fundamental building blocks used throughout
//! the library:
//!
//! - [`types`] - The `EntityRecord` and its detail collections
//! - [`traits`] - The `QueryExecutor` trait
//! - [`error`] - Structured error types and failure classes
//! - [`query`] - GraphQL query descriptors and global id helpers
//! - [`parser`] - Raw node to record mapping

pub mod error;
pub mod parser;
pub mod query;
pub mod traits;
pub mod types;

// Re-export commonly used types at the core level
pub use error::{FailureClass, HarvestError, HarvestResult, OutputError, OutputResult, ParseError};
pub use parser::RecordParser;
pub use query::{decode_global_id, encode_global_id, school_global_id, QueryDescriptor};
pub use traits::{ArcExecutor, QueryExecutor};
pub use types::{Course, EntityRecord, RatingDistribution, StarBucket, UNKNOWN_DEPARTMENT};
