//! Harvest report structures.
//!
//! This module defines the per-partition and per-session summaries that a
//! harvest produces alongside its records: how each partition ended, how
//! many nodes were seen, accepted, duplicated or rejected, and what the
//! backoff controller went through.

use crate::backoff::BackoffMetrics;
use crate::harvest::enrich::EnrichmentReport;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Why a partition stopped paginating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PartitionEnd {
    /// The source reported no further pages.
    Exhausted,
    /// A page came back with no nodes.
    EmptyPage,
    /// The offset reached the source-reported result count.
    ResultCountReached,
    /// The per-partition page ceiling was hit.
    PageCeiling,
    /// The requested record maximum was reached.
    TargetReached,
    /// A query failed after retries, or was rejected outright.
    Failed {
        /// Description of the failure.
        error: String,
    },
    /// The backoff controller aborted the session circuit.
    SessionAborted,
}

impl PartitionEnd {
    /// Returns `true` if the partition was abandoned rather than completed.
    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::SessionAborted)
    }

    /// Returns a short machine-friendly name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::EmptyPage => "empty_page",
            Self::ResultCountReached => "result_count_reached",
            Self::PageCeiling => "page_ceiling",
            Self::TargetReached => "target_reached",
            Self::Failed { .. } => "failed",
            Self::SessionAborted => "session_aborted",
        }
    }
}

impl fmt::Display for PartitionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { error } => write!(f, "failed: {error}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Summary of one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionReport {
    /// Partition key (`"A"`..`"Z"`, or `""` for the catch-all).
    pub key: String,

    /// Pages fetched successfully.
    pub pages: u32,

    /// Raw nodes observed.
    pub nodes: u64,

    /// Records accepted as new.
    pub accepted: u64,

    /// Records dropped as already seen.
    pub duplicates: u64,

    /// Nodes the parser rejected.
    pub rejected: u64,

    /// Why pagination stopped.
    pub end: PartitionEnd,

    /// Result count the source reported on the partition's last page.
    pub result_count: Option<u64>,

    /// Wall time spent on the partition.
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,
}

impl PartitionReport {
    /// Creates an empty report for a partition.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            pages: 0,
            nodes: 0,
            accepted: 0,
            duplicates: 0,
            rejected: 0,
            end: PartitionEnd::Exhausted,
            result_count: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Returns `true` if this is the catch-all partition.
    pub fn is_catch_all(&self) -> bool {
        self.key.is_empty()
    }
}

/// Summary of one harvest session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestReport {
    /// Session identifier.
    pub session_id: String,

    /// When the session started.
    pub started_at: DateTime<Utc>,

    /// When the report was produced.
    pub finished_at: DateTime<Utc>,

    /// Unique records collected.
    pub unique_records: usize,

    /// Raw nodes observed across all partitions.
    pub nodes_observed: u64,

    /// Records dropped as already seen.
    pub duplicates: u64,

    /// Nodes the parser rejected.
    pub rejected: u64,

    /// Per-partition summaries, in run order.
    pub partitions: Vec<PartitionReport>,

    /// Result count the unfiltered catch-all reported, if it ran.
    pub source_reported_total: Option<u64>,

    /// Whether the catch-all partition ran.
    pub catch_all_ran: bool,

    /// Enrichment summary, if an enrichment pass ran.
    pub enrichment: Option<EnrichmentReport>,

    /// Backoff controller counters.
    pub controller: BackoffMetrics,

    /// Records persisted by the output store.
    pub records_written: Option<usize>,
}

impl HarvestReport {
    /// Returns the partitions that were abandoned.
    pub fn abandoned_partitions(&self) -> Vec<&PartitionReport> {
        self.partitions
            .iter()
            .filter(|p| p.end.is_abandoned())
            .collect()
    }

    /// Returns the session's wall time.
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at).to_std().unwrap_or_default()
    }

    /// Returns `true` if the unique count does not exceed what the source
    /// reported for the unfiltered directory. Always `true` when the
    /// catch-all did not run.
    pub fn within_source_total(&self) -> bool {
        self.source_reported_total
            .map_or(true, |total| self.unique_records as u64 <= total)
    }
}

/// Serde helper for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
