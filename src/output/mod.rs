//! Output storage for harvested records.
//!
//! This module provides a trait-based abstraction for persisting records
//! as line-delimited JSON and reading them back.

mod jsonl;
mod memory;
mod traits;

pub use jsonl::{JsonlStore, DEFAULT_OUTPUT_PATH};
pub use memory::MemoryStore;
pub use traits::{RecordStore, WriteMode};
