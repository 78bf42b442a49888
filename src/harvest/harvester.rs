//! The main harvester implementation.

use crate::audit;
use crate::backoff::{BackoffConfig, BackoffController};
use crate::core::parser::{DEFAULT_PROFILE_BASE_URL, DEFAULT_SCHOOL_NAME};
use crate::core::{
    school_global_id, ArcExecutor, EntityRecord, HarvestError, HarvestResult, QueryExecutor,
    RecordParser,
};
use crate::harvest::cursor::{CursorState, PaginationCursor, PaginationStyle, DEFAULT_PAGE_CEILING};
use crate::harvest::enrich::{EnrichmentMerger, EnrichmentReport};
use crate::harvest::planner::{PartitionDescriptor, PartitionPlanner};
use crate::harvest::report::{HarvestReport, PartitionEnd, PartitionReport};
use crate::harvest::session::HarvestSession;
use crate::output::{RecordStore, WriteMode};

use std::sync::Arc;
use std::time::Instant;

/// Record cap applied in test mode.
pub const TEST_MODE_CAP: usize = 10;

/// Default school whose instructors are harvested.
pub const DEFAULT_SCHOOL_ID: u64 = 758;

/// Configuration for a harvest.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Maximum unique records to collect. `None` means no maximum.
    pub max_records: Option<usize>,

    /// Caps the harvest at [`TEST_MODE_CAP`] records.
    pub test_mode: bool,

    /// Records to enrich with detail queries after the harvest.
    pub enrichment_sample: usize,

    /// How successive pages are addressed.
    pub pagination: PaginationStyle,

    /// Page size. `None` uses the pagination style's default.
    pub page_size: Option<u32>,

    /// Maximum pages fetched for one partition.
    pub page_ceiling: u32,

    /// Numeric school id the search is restricted to.
    pub school_id: u64,

    /// School display name stamped on every record.
    pub school_name: String,

    /// Base URL that profile links are built from.
    pub profile_base_url: String,

    /// How the output store treats existing content.
    pub write_mode: WriteMode,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_records: None,
            test_mode: false,
            enrichment_sample: 0,
            pagination: PaginationStyle::default(),
            page_size: None,
            page_ceiling: DEFAULT_PAGE_CEILING,
            school_id: DEFAULT_SCHOOL_ID,
            school_name: DEFAULT_SCHOOL_NAME.to_string(),
            profile_base_url: DEFAULT_PROFILE_BASE_URL.to_string(),
            write_mode: WriteMode::Overwrite,
        }
    }
}

impl HarvestConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the record maximum.
    pub fn with_max_records(mut self, max: Option<usize>) -> Self {
        self.max_records = max;
        self
    }

    /// Enables or disables test mode.
    pub fn with_test_mode(mut self, enabled: bool) -> Self {
        self.test_mode = enabled;
        self
    }

    /// Sets the enrichment sample size.
    pub fn with_enrichment_sample(mut self, sample: usize) -> Self {
        self.enrichment_sample = sample;
        self
    }

    /// Sets the pagination style.
    pub fn with_pagination(mut self, style: PaginationStyle) -> Self {
        self.pagination = style;
        self
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the per-partition page ceiling.
    pub fn with_page_ceiling(mut self, ceiling: u32) -> Self {
        self.page_ceiling = ceiling;
        self
    }

    /// Sets the school id.
    pub fn with_school_id(mut self, school_id: u64) -> Self {
        self.school_id = school_id;
        self
    }

    /// Sets the school display name.
    pub fn with_school_name(mut self, name: impl Into<String>) -> Self {
        self.school_name = name.into();
        self
    }

    /// Sets the profile base URL.
    pub fn with_profile_base_url(mut self, url: impl Into<String>) -> Self {
        self.profile_base_url = url.into();
        self
    }

    /// Sets the output write mode.
    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    /// Returns the record maximum after applying test mode.
    pub fn effective_max(&self) -> Option<usize> {
        if self.test_mode {
            Some(self.max_records.map_or(TEST_MODE_CAP, |max| max.min(TEST_MODE_CAP)))
        } else {
            self.max_records
        }
    }

    /// Returns the page size in effect.
    pub fn effective_page_size(&self) -> u32 {
        self.page_size
            .unwrap_or_else(|| self.pagination.default_page_size())
    }

    /// Checks the configuration for values no harvest can run with.
    pub fn validate(&self) -> HarvestResult<()> {
        if self.page_size == Some(0) {
            return Err(HarvestError::configuration("page size must be positive"));
        }
        if self.page_ceiling == 0 {
            return Err(HarvestError::configuration("page ceiling must be positive"));
        }
        if self.school_id == 0 {
            return Err(HarvestError::configuration("school id must be positive"));
        }
        Ok(())
    }
}

/// Records and report produced by [`Harvester::run`].
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    /// Unique records, in acceptance order.
    pub records: Vec<EntityRecord>,
    /// Session report.
    pub report: HarvestReport,
}

/// Builder for creating a `Harvester`.
pub struct HarvesterBuilder {
    executor: Option<ArcExecutor>,
    config: HarvestConfig,
    backoff: BackoffConfig,
    store: Option<Arc<dyn RecordStore>>,
}

impl HarvesterBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            executor: None,
            config: HarvestConfig::default(),
            backoff: BackoffConfig::default(),
            store: None,
        }
    }

    /// Sets the query executor.
    pub fn with_executor<E: QueryExecutor + 'static>(mut self, executor: E) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    /// Sets a query executor wrapped in an Arc.
    pub fn with_arc_executor(mut self, executor: ArcExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Sets the harvest configuration.
    pub fn with_config(mut self, config: HarvestConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the backoff configuration.
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the output store.
    pub fn with_store<S: RecordStore + 'static>(mut self, store: S) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Sets an output store wrapped in an Arc.
    pub fn with_arc_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Builds the harvester.
    pub fn build(self) -> HarvestResult<Harvester> {
        let executor = self
            .executor
            .ok_or_else(|| HarvestError::configuration("a query executor is required"))?;
        self.config.validate()?;

        let parser = RecordParser::new()
            .with_school_name(self.config.school_name.clone())
            .with_profile_base_url(self.config.profile_base_url.clone());

        let cursor = PaginationCursor::new(
            self.config.pagination,
            school_global_id(self.config.school_id),
        )
        .with_page_size(self.config.effective_page_size())
        .with_page_ceiling(self.config.page_ceiling);

        Ok(Harvester {
            executor,
            planner: PartitionPlanner::new(self.config.effective_max()),
            config: self.config,
            backoff: self.backoff,
            store: self.store,
            parser,
            cursor,
        })
    }
}

impl Default for HarvesterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs partitioned harvests against one executor.
pub struct Harvester {
    executor: ArcExecutor,
    config: HarvestConfig,
    backoff: BackoffConfig,
    store: Option<Arc<dyn RecordStore>>,
    parser: RecordParser,
    planner: PartitionPlanner,
    cursor: PaginationCursor,
}

impl Harvester {
    /// Creates a new builder.
    pub fn builder() -> HarvesterBuilder {
        HarvesterBuilder::new()
    }

    /// Returns the harvest configuration.
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Returns the record parser.
    pub fn parser(&self) -> &RecordParser {
        &self.parser
    }

    /// Starts a fresh session with its own backoff controller.
    pub fn new_session(&self) -> HarvestSession {
        HarvestSession::new(BackoffController::new(
            Arc::clone(&self.executor),
            self.backoff.clone(),
        ))
    }

    /// Runs a whole harvest: partitions, enrichment, then output.
    ///
    /// # Errors
    ///
    /// Only fatal errors are returned, which means a failure to persist the
    /// records. Query failures end up in the report.
    pub async fn run(&self) -> HarvestResult<HarvestOutcome> {
        let mut session = self.new_session();
        let session_id = session.id().to_string();
        audit::emit_session_started(&session_id, &self.config);

        self.harvest(&mut session).await;

        if self.config.enrichment_sample > 0 && !session.is_empty() {
            self.enrich(&mut session).await;
        }

        if let Some(store) = &self.store {
            let written = store.write(session.records(), self.config.write_mode).await?;
            session.set_records_written(written);
        }

        let (records, report) = session.into_parts();
        audit::emit_harvest_report(&report);

        tracing::info!(
            session_id = %report.session_id,
            unique_records = report.unique_records,
            duplicates = report.duplicates,
            source_reported_total = ?report.source_reported_total,
            abandoned = report.abandoned_partitions().len(),
            "Harvest finished"
        );

        Ok(HarvestOutcome { records, report })
    }

    /// Runs every planned partition into `session`, in order.
    ///
    /// Stops early once the record maximum is met, and skips the catch-all
    /// once enough records are in hand. Partition failures are
    /// recorded in the partition reports and never stop the harvest.
    pub async fn harvest<E: QueryExecutor>(&self, session: &mut HarvestSession<E>) {
        for partition in self.planner.plan() {
            if !self.planner.should_run(&partition, session.len()) {
                if partition.is_catch_all() {
                    tracing::info!(collected = session.len(), "Enough records collected, skipping catch-all");
                } else {
                    tracing::info!(
                        partition = %partition,
                        collected = session.len(),
                        "Record maximum reached, skipping remaining partitions"
                    );
                }
                break;
            }

            let report = self.run_partition(session, &partition).await;
            audit::emit_partition_finished(&session.id().to_string(), &report);
            session.finish_partition(report);
        }
    }

    /// Paginates one partition to its end.
    async fn run_partition<E: QueryExecutor>(
        &self,
        session: &mut HarvestSession<E>,
        partition: &PartitionDescriptor,
    ) -> PartitionReport {
        let started = Instant::now();
        let mut report = PartitionReport::new(partition.key());

        if session.controller().begin_partition() {
            tracing::info!(partition = %partition, "Probing endpoint after session abort");
        }
        tracing::info!(partition = %partition, collected = session.len(), "Starting partition");

        let mut state = CursorState::start(partition);
        let end = loop {
            let outcome = self.cursor.advance(session.controller(), state).await;
            let page = match outcome {
                Ok(page) => page,
                Err(e) if e.is_session_abort() => {
                    audit::emit_session_aborted(&session.id().to_string(), &report.key, &e);
                    break PartitionEnd::SessionAborted;
                }
                Err(e) => {
                    tracing::warn!(
                        partition = %partition,
                        pages = report.pages,
                        error = %e,
                        "Abandoning partition"
                    );
                    break PartitionEnd::Failed {
                        error: e.to_string(),
                    };
                }
            };

            report.pages = page.state.pages_fetched;
            report.nodes += page.nodes.len() as u64;
            if page.result_count.is_some() {
                report.result_count = page.result_count;
            }
            session.note_nodes(page.nodes.len());

            for node in &page.nodes {
                if self.planner.target_reached(session.len()) {
                    break;
                }
                match self.parser.parse(node) {
                    Ok(record) => {
                        if session.offer(record) {
                            report.accepted += 1;
                        } else {
                            report.duplicates += 1;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(partition = %partition, error = %e, "Skipping node");
                        session.note_rejected();
                        report.rejected += 1;
                    }
                }
            }

            if self.planner.target_reached(session.len()) {
                break PartitionEnd::TargetReached;
            }
            if !page.has_more() {
                break page.state.end.unwrap_or(PartitionEnd::Exhausted);
            }
            state = page.state;
        };

        report.end = end;
        report.elapsed = started.elapsed();

        tracing::info!(
            partition = %partition,
            pages = report.pages,
            accepted = report.accepted,
            duplicates = report.duplicates,
            end = %report.end,
            "Finished partition"
        );

        report
    }

    /// Enriches the configured sample of the session's records.
    pub async fn enrich<E: QueryExecutor>(
        &self,
        session: &mut HarvestSession<E>,
    ) -> EnrichmentReport {
        let session_id = session.id().to_string();
        let sample = self.config.enrichment_sample;
        let (controller, records) = session.controller_and_records();

        controller.begin_partition();
        tracing::info!(sample, available = records.len(), "Starting enrichment");

        let report = EnrichmentMerger::new(&self.parser)
            .enrich(controller, records, sample)
            .await;

        audit::emit_enrichment_completed(&session_id, &report);
        session.set_enrichment(report);
        report
    }
}

impl std::fmt::Debug for Harvester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harvester")
            .field("executor", &self.executor.name())
            .field("config", &self.config)
            .field("backoff", &self.backoff)
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::{detail_response, search_page, teacher_node};
    use crate::backends::{MockExecutor, MockReply};
    use crate::output::MemoryStore;
    use serde_json::json;

    fn harvester(executor: Arc<MockExecutor>, config: HarvestConfig) -> Harvester {
        Harvester::builder()
            .with_arc_executor(executor)
            .with_config(config)
            .with_backoff(BackoffConfig::immediate())
            .build()
            .unwrap()
    }

    #[test]
    fn test_effective_max() {
        assert_eq!(HarvestConfig::new().effective_max(), None);
        assert_eq!(HarvestConfig::new().with_test_mode(true).effective_max(), Some(10));
        assert_eq!(
            HarvestConfig::new()
                .with_test_mode(true)
                .with_max_records(Some(4))
                .effective_max(),
            Some(4)
        );
        assert_eq!(
            HarvestConfig::new()
                .with_test_mode(true)
                .with_max_records(Some(40))
                .effective_max(),
            Some(10)
        );
    }

    #[test]
    fn test_page_size_defaults_by_style() {
        let config = HarvestConfig::new().with_pagination(PaginationStyle::Offset);
        assert_eq!(config.effective_page_size(), 50);
        assert_eq!(config.with_page_size(Some(20)).effective_page_size(), 20);
        assert_eq!(HarvestConfig::new().effective_page_size(), 100);
    }

    #[test]
    fn test_builder_validation() {
        let missing = Harvester::builder().build().unwrap_err();
        assert!(matches!(missing, HarvestError::Configuration { .. }));

        let bad = Harvester::builder()
            .with_executor(MockExecutor::new())
            .with_config(HarvestConfig::new().with_page_size(Some(0)))
            .build()
            .unwrap_err();
        assert!(bad.to_string().contains("page size"));
    }

    #[tokio::test]
    async fn test_parse_failures_are_skipped() {
        let bad = json!({ "firstName": "No", "lastName": "Id" });
        let executor = Arc::new(MockExecutor::new().with_pages(
            "A",
            [search_page(vec![bad, teacher_node(1, "Ada", "Lovelace")], false, None, 2)],
        ));
        let harvester = harvester(executor, HarvestConfig::new());

        let outcome = harvester.run().await.unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.report.rejected, 1);
        assert_eq!(outcome.report.partitions[0].rejected, 1);
        assert_eq!(outcome.report.partitions.len(), 27);
        assert!(outcome.report.catch_all_ran);
    }

    #[tokio::test]
    async fn test_hard_failure_abandons_partition() {
        let executor = Arc::new(
            MockExecutor::new()
                .with_reply("B", MockReply::Rejected("bad query".into()))
                .with_pages("C", [search_page(vec![teacher_node(3, "C", "C")], false, None, 1)]),
        );
        let harvester = harvester(Arc::clone(&executor), HarvestConfig::new());

        let outcome = harvester.run().await.unwrap();
        let b = &outcome.report.partitions[1];

        assert_eq!(b.key, "B");
        assert!(matches!(b.end, PartitionEnd::Failed { .. }));
        assert_eq!(executor.calls_for("B"), 1);
        assert_eq!(outcome.records.len(), 1);
    }

    #[tokio::test]
    async fn test_run_enriches_and_writes() {
        let mut detail = teacher_node(1, "Ada", "Lovelace");
        detail["teacherRatingTags"] = json!([{ "tagName": "Caring" }]);
        let id = detail["id"].as_str().unwrap().to_string();

        let executor = Arc::new(
            MockExecutor::new()
                .with_pages("A", [search_page(vec![teacher_node(1, "Ada", "Lovelace")], false, None, 1)])
                .with_reply(id, MockReply::Payload(detail_response(detail))),
        );
        let store = Arc::new(MemoryStore::new());
        let harvester = Harvester::builder()
            .with_arc_executor(executor)
            .with_config(HarvestConfig::new().with_enrichment_sample(5))
            .with_backoff(BackoffConfig::immediate())
            .with_arc_store(store.clone())
            .build()
            .unwrap();

        let outcome = harvester.run().await.unwrap();

        assert_eq!(outcome.records[0].tags, vec!["Caring".to_string()]);
        let enrichment = outcome.report.enrichment.unwrap();
        assert_eq!(enrichment.attempted, 1);
        assert_eq!(enrichment.enriched, 1);
        assert_eq!(outcome.report.records_written, Some(1));

        let rows = store.read().await.unwrap();
        assert_eq!(rows[0]["tags"], json!(["Caring"]));
    }
}
