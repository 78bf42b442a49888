//! # Roster Harvest
//!
//! A partitioned, paginated harvester for instructor directories that are
//! only reachable through a capped search API.
//!
//! ## Overview
//!
//! The search surface of the source hides results past a fixed window, so a
//! single query can never page through the whole directory. Roster Harvest
//! works around that by:
//!
//! - Splitting the crawl into one search per initial letter, plus a final
//!   unfiltered sweep
//! - Paging each partition to its end, by cursor or by offset
//! - Deduplicating records across overlapping partitions
//! - Pacing and retrying queries, and backing off the whole session when
//!   the endpoint keeps failing
//! - Enriching a sample of records with per-instructor detail, without
//!   discarding what the summary already had
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use roster_harvest::{HarvestConfig, Harvester, JsonlStore};
//! use roster_harvest::backends::{GraphQlConfig, GraphQlExecutor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let executor = GraphQlExecutor::new(GraphQlConfig::default())?;
//!
//!     let harvester = Harvester::builder()
//!         .with_executor(executor)
//!         .with_config(HarvestConfig::new().with_max_records(Some(100)))
//!         .with_store(JsonlStore::new("data/professors.jsonl"))
//!         .build()?;
//!
//!     let outcome = harvester.run().await?;
//!     println!("Collected {} records", outcome.records.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `default` - Includes `graphql` and `cli`
//! - `graphql` - The HTTP executor for the live GraphQL endpoint
//! - `cli` - Dependencies of the `roster-harvest` binary
//!
//! ## Architecture
//!
//! The library is organized into several layers:
//!
//! - **Core**: Records, query descriptors, parsing, and error handling
//! - **Backends**: Query executor implementations
//! - **Backoff**: Pacing, retry and session abort in front of an executor
//! - **Harvest**: Partition planning, pagination, deduplication, enrichment
//! - **Output**: Line-delimited JSON storage for harvested records
//! - **Audit**: Structured run events

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod backends;
pub mod backoff;
pub mod core;
pub mod harvest;
pub mod output;

// Re-export commonly used types at the crate root
pub use crate::core::{
    EntityRecord, FailureClass, HarvestError, HarvestResult, OutputError, ParseError,
    QueryDescriptor, QueryExecutor, RecordParser,
};

pub use crate::backoff::{BackoffConfig, BackoffController};
pub use crate::harvest::{
    HarvestConfig, HarvestOutcome, HarvestReport, Harvester, PaginationStyle,
};
pub use crate::output::{JsonlStore, RecordStore, WriteMode};

/// Prelude module for convenient imports.
///
/// ```rust
/// use roster_harvest::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{
        EntityRecord, FailureClass, HarvestError, HarvestResult, OutputError, ParseError,
        QueryDescriptor, QueryExecutor, RecordParser,
    };
    pub use crate::backoff::{BackoffConfig, BackoffController};
    pub use crate::harvest::{
        HarvestConfig, HarvestOutcome, HarvestReport, HarvestSession, Harvester, PaginationStyle,
    };
    pub use crate::output::{JsonlStore, MemoryStore, RecordStore, WriteMode};
}
