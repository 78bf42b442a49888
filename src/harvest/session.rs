//! Harvest session state.

use crate::backoff::BackoffController;
use crate::core::{ArcExecutor, EntityRecord, QueryExecutor};
use crate::harvest::dedup::Deduplicator;
use crate::harvest::enrich::EnrichmentReport;
use crate::harvest::report::{HarvestReport, PartitionReport};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Everything one harvest invocation owns.
///
/// The session holds the accepted records, the deduplicator's identity set
/// and the backoff controller with its failure counters. It is created at
/// harvest start and consumed by [`HarvestSession::into_parts`] once the
/// results have been flushed.
#[derive(Debug)]
pub struct HarvestSession<E: QueryExecutor = ArcExecutor> {
    id: Uuid,
    started_at: DateTime<Utc>,
    controller: BackoffController<E>,
    dedup: Deduplicator,
    records: Vec<EntityRecord>,
    partitions: Vec<PartitionReport>,
    rejected: u64,
    nodes_observed: u64,
    source_reported_total: Option<u64>,
    catch_all_ran: bool,
    enrichment: Option<EnrichmentReport>,
    records_written: Option<usize>,
}

impl<E: QueryExecutor> HarvestSession<E> {
    /// Starts a new session around a controller.
    pub fn new(controller: BackoffController<E>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            controller,
            dedup: Deduplicator::new(),
            records: Vec::new(),
            partitions: Vec::new(),
            rejected: 0,
            nodes_observed: 0,
            source_reported_total: None,
            catch_all_ran: false,
            enrichment: None,
            records_written: None,
        }
    }

    /// Returns the session id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns when the session started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the backoff controller.
    pub fn controller(&self) -> &BackoffController<E> {
        &self.controller
    }

    /// Returns the accepted records, in acceptance order.
    pub fn records(&self) -> &[EntityRecord] {
        &self.records
    }

    /// Number of unique records accepted.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no record has been accepted.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the partitions run so far.
    pub fn partitions(&self) -> &[PartitionReport] {
        &self.partitions
    }

    /// Offers a parsed record. Returns `true` if it was new and kept.
    pub fn offer(&mut self, record: EntityRecord) -> bool {
        if self.dedup.accept(&record) {
            self.records.push(record);
            true
        } else {
            false
        }
    }

    pub(crate) fn note_nodes(&mut self, count: usize) {
        self.nodes_observed += count as u64;
    }

    pub(crate) fn note_rejected(&mut self) {
        self.rejected += 1;
    }

    pub(crate) fn finish_partition(&mut self, report: PartitionReport) {
        if report.is_catch_all() {
            self.catch_all_ran = true;
            if report.result_count.is_some() {
                self.source_reported_total = report.result_count;
            }
        }
        self.partitions.push(report);
    }

    pub(crate) fn set_enrichment(&mut self, report: EnrichmentReport) {
        self.enrichment = Some(report);
    }

    pub(crate) fn set_records_written(&mut self, count: usize) {
        self.records_written = Some(count);
    }

    /// Splits the controller and the records so the enrichment pass can
    /// borrow both at once.
    pub(crate) fn controller_and_records(&mut self) -> (&BackoffController<E>, &mut [EntityRecord]) {
        (&self.controller, &mut self.records)
    }

    /// Builds the session report as of now.
    pub fn report(&self) -> HarvestReport {
        HarvestReport {
            session_id: self.id.to_string(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            unique_records: self.records.len(),
            nodes_observed: self.nodes_observed,
            duplicates: self.dedup.duplicates(),
            rejected: self.rejected,
            partitions: self.partitions.clone(),
            source_reported_total: self.source_reported_total,
            catch_all_ran: self.catch_all_ran,
            enrichment: self.enrichment,
            controller: self.controller.metrics(),
            records_written: self.records_written,
        }
    }

    /// Consumes the session, returning its records and final report.
    pub fn into_parts(self) -> (Vec<EntityRecord>, HarvestReport) {
        let report = self.report();
        (self.records, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::teacher_node;
    use crate::backends::MockExecutor;
    use crate::backoff::BackoffConfig;
    use crate::core::RecordParser;

    fn session() -> HarvestSession<MockExecutor> {
        HarvestSession::new(BackoffController::new(MockExecutor::new(), BackoffConfig::immediate()))
    }

    fn record(numeric_id: u64, first: &str) -> EntityRecord {
        RecordParser::new().parse(&teacher_node(numeric_id, first, "Last")).unwrap()
    }

    #[test]
    fn test_offer_keeps_first_parse() {
        let mut session = session();

        assert!(session.offer(record(1, "First")));
        assert!(!session.offer(record(1, "Second")));
        assert!(session.offer(record(2, "Other")));

        assert_eq!(session.len(), 2);
        assert_eq!(session.records()[0].first_name, "First");
        assert_eq!(session.report().duplicates, 1);
    }

    #[test]
    fn test_catch_all_sets_source_total() {
        let mut session = session();

        let mut letter = PartitionReport::new("A");
        letter.result_count = Some(40);
        session.finish_partition(letter);
        assert_eq!(session.report().source_reported_total, None);

        let mut catch_all = PartitionReport::new("");
        catch_all.result_count = Some(1234);
        session.finish_partition(catch_all);

        let report = session.report();
        assert!(report.catch_all_ran);
        assert_eq!(report.source_reported_total, Some(1234));
        assert_eq!(report.partitions.len(), 2);
    }

    #[test]
    fn test_into_parts() {
        let mut session = session();
        session.offer(record(9, "Nine"));
        session.note_nodes(3);
        session.note_rejected();
        session.set_records_written(1);
        let id = session.id().to_string();

        let (records, report) = session.into_parts();

        assert_eq!(records.len(), 1);
        assert_eq!(report.session_id, id);
        assert_eq!(report.nodes_observed, 3);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.records_written, Some(1));
        assert!(report.finished_at >= report.started_at);
    }
}
