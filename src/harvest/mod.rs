//! The harvesting engine.
//!
//! A harvest walks the [`PartitionPlanner`]'s sequence of partitions, pages
//! each one to its end with a [`PaginationCursor`], parses and deduplicates
//! every node into a [`HarvestSession`], then optionally enriches a sample
//! of the collected records with detail queries.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use roster_harvest::harvest::{HarvestConfig, Harvester};
//! use roster_harvest::backends::MockExecutor;
//!
//! let harvester = Harvester::builder()
//!     .with_executor(MockExecutor::new())
//!     .with_config(HarvestConfig::new().with_max_records(Some(50)))
//!     .build()?;
//!
//! let outcome = harvester.run().await?;
//! println!("{} records", outcome.records.len());
//! ```

mod cursor;
mod dedup;
mod enrich;
mod harvester;
mod planner;
mod report;
mod session;

pub use cursor::{
    CursorState, Page, PaginationCursor, PaginationStyle, SearchPage, DEFAULT_CURSOR_PAGE_SIZE,
    DEFAULT_OFFSET_PAGE_SIZE, DEFAULT_PAGE_CEILING,
};
pub use dedup::Deduplicator;
pub use enrich::{merge_detail, EnrichmentMerger, EnrichmentReport};
pub use harvester::{
    HarvestConfig, HarvestOutcome, Harvester, HarvesterBuilder, DEFAULT_SCHOOL_ID, TEST_MODE_CAP,
};
pub use planner::{PartitionDescriptor, PartitionPlanner, ALPHABET, CATCH_ALL_DEFAULT_TARGET};
pub use report::{HarvestReport, PartitionEnd, PartitionReport};
pub use session::HarvestSession;
