//! Partition planning.
//!
//! The search surface caps how many results one query can page through, so
//! the directory is crawled as one bounded sub-query per initial letter,
//! followed by a single unfiltered sweep that picks up anything the letter
//! filters missed.

use std::fmt;

/// Letters used as partition filters, in run order.
pub const ALPHABET: std::ops::RangeInclusive<char> = 'A'..='Z';

/// Record count below which the catch-all runs when there is no maximum.
pub const CATCH_ALL_DEFAULT_TARGET: usize = 100;

/// One bounded sub-query of the crawl.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PartitionDescriptor {
    /// Search filtered by a single letter.
    Letter(char),
    /// Unfiltered sweep.
    CatchAll,
}

impl PartitionDescriptor {
    /// Returns the search text sent for this partition.
    pub fn search_text(&self) -> String {
        match self {
            Self::Letter(c) => c.to_string(),
            Self::CatchAll => String::new(),
        }
    }

    /// Returns the partition key used in reports (same as the search text).
    pub fn key(&self) -> String {
        self.search_text()
    }

    /// Returns `true` for the trailing unfiltered sweep.
    pub fn is_catch_all(&self) -> bool {
        matches!(self, Self::CatchAll)
    }
}

impl fmt::Display for PartitionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Letter(c) => write!(f, "{c}"),
            Self::CatchAll => f.write_str("*"),
        }
    }
}

/// Produces the partition sequence and decides when to stop.
#[derive(Debug, Clone, Default)]
pub struct PartitionPlanner {
    max_records: Option<usize>,
}

impl PartitionPlanner {
    /// Creates a planner. `None` means no record maximum.
    pub fn new(max_records: Option<usize>) -> Self {
        Self { max_records }
    }

    /// Returns the configured record maximum.
    pub fn max_records(&self) -> Option<usize> {
        self.max_records
    }

    /// Returns the partitions in generation order: every letter, then the
    /// catch-all.
    pub fn plan(&self) -> impl Iterator<Item = PartitionDescriptor> {
        ALPHABET
            .map(PartitionDescriptor::Letter)
            .chain(std::iter::once(PartitionDescriptor::CatchAll))
    }

    /// Returns `true` once `collected` records satisfy the maximum.
    pub fn target_reached(&self, collected: usize) -> bool {
        self.max_records.is_some_and(|max| collected >= max)
    }

    /// Returns whether a partition should run given the records collected so far.
    ///
    /// Letters run until the maximum is met. The catch-all runs only while
    /// fewer records than the maximum (or [`CATCH_ALL_DEFAULT_TARGET`]
    /// without one) have been collected.
    pub fn should_run(&self, partition: &PartitionDescriptor, collected: usize) -> bool {
        match partition {
            PartitionDescriptor::Letter(_) => !self.target_reached(collected),
            PartitionDescriptor::CatchAll => {
                collected < self.max_records.unwrap_or(CATCH_ALL_DEFAULT_TARGET)
            }
        }
    }
}
