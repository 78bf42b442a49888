//! Audit event types and emission functions.

use crate::core::HarvestError;
use crate::harvest::{EnrichmentReport, HarvestConfig, HarvestReport, PartitionReport};

use serde::{Deserialize, Serialize};

/// Compact summary of a partition for audit logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSummary {
    /// Partition key, `*` for the catch-all.
    pub partition: String,
    /// Pages fetched.
    pub pages: u32,
    /// Records accepted as new.
    pub accepted: u64,
    /// Why pagination stopped.
    pub end: String,
}

impl From<&PartitionReport> for PartitionSummary {
    fn from(p: &PartitionReport) -> Self {
        Self {
            partition: display_key(&p.key).to_string(),
            pages: p.pages,
            accepted: p.accepted,
            end: p.end.name().to_string(),
        }
    }
}

fn display_key(key: &str) -> &str {
    if key.is_empty() {
        "*"
    } else {
        key
    }
}

/// Emits an audit event for a harvest session starting.
pub fn emit_session_started(session_id: &str, config: &HarvestConfig) {
    tracing::info!(
        target: "roster_harvest::audit",
        event_type = "session_started",
        session_id = %session_id,
        school_id = config.school_id,
        school = %config.school_name,
        max_records = ?config.effective_max(),
        enrichment_sample = config.enrichment_sample,
        pagination = %config.pagination,
        test_mode = config.test_mode,
        "Harvest session started"
    );
}

/// Emits an audit event for a finished partition.
pub fn emit_partition_finished(session_id: &str, report: &PartitionReport) {
    tracing::info!(
        target: "roster_harvest::audit",
        event_type = "partition_finished",
        session_id = %session_id,
        partition = %display_key(&report.key),
        pages = report.pages,
        nodes = report.nodes,
        accepted = report.accepted,
        duplicates = report.duplicates,
        rejected = report.rejected,
        result_count = ?report.result_count,
        end = %report.end,
        abandoned = report.end.is_abandoned(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Partition finished"
    );
}

/// Emits an audit event for a partition unwound by an open session circuit.
pub fn emit_session_aborted(session_id: &str, partition: &str, error: &HarvestError) {
    let consecutive_failures = match error {
        HarvestError::SessionAbort {
            consecutive_failures,
            ..
        } => Some(*consecutive_failures),
        _ => None,
    };

    tracing::warn!(
        target: "roster_harvest::audit",
        event_type = "session_aborted",
        session_id = %session_id,
        partition = %display_key(partition),
        consecutive_failures = ?consecutive_failures,
        error = %error,
        "Session circuit aborted partition"
    );
}

/// Emits an audit event for a completed enrichment pass.
pub fn emit_enrichment_completed(session_id: &str, report: &EnrichmentReport) {
    tracing::info!(
        target: "roster_harvest::audit",
        event_type = "enrichment_completed",
        session_id = %session_id,
        attempted = report.attempted,
        enriched = report.enriched,
        failed = report.failed,
        "Enrichment completed"
    );
}

/// Emits an audit event for the final harvest report.
pub fn emit_harvest_report(report: &HarvestReport) {
    let partitions: Vec<PartitionSummary> =
        report.partitions.iter().map(PartitionSummary::from).collect();

    let abandoned: Vec<&str> = report
        .abandoned_partitions()
        .iter()
        .map(|p| display_key(&p.key))
        .collect();

    tracing::info!(
        target: "roster_harvest::audit",
        event_type = "harvest_report",
        session_id = %report.session_id,
        unique_records = report.unique_records,
        nodes_observed = report.nodes_observed,
        duplicates = report.duplicates,
        rejected = report.rejected,
        source_reported_total = ?report.source_reported_total,
        catch_all_ran = report.catch_all_ran,
        within_source_total = report.within_source_total(),
        abandoned = ?abandoned,
        partitions = ?partitions,
        calls = report.controller.total_calls,
        retries = report.controller.retries,
        records_written = ?report.records_written,
        duration_ms = report.duration().as_millis() as u64,
        "Harvest report generated"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::PartitionEnd;

    #[test]
    fn test_partition_summary_from() {
        let mut report = PartitionReport::new("");
        report.pages = 4;
        report.accepted = 12;
        report.end = PartitionEnd::PageCeiling;

        let summary = PartitionSummary::from(&report);

        assert_eq!(summary.partition, "*");
        assert_eq!(summary.pages, 4);
        assert_eq!(summary.accepted, 12);
        assert_eq!(summary.end, "page_ceiling");
    }

    #[test]
    fn test_emitters_without_subscriber() {
        let mut report = PartitionReport::new("K");
        report.end = PartitionEnd::SessionAborted;

        emit_partition_finished("s-1", &report);
        emit_session_aborted(
            "s-1",
            "K",
            &HarvestError::SessionAbort {
                consecutive_failures: 3,
                last_error: "timeout".into(),
            },
        );
        emit_enrichment_completed("s-1", &EnrichmentReport::default());
    }
}
