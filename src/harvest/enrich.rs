//! Enrichment pass.
//!
//! For a bounded sample of collected records, fetch the instructor's detail
//! node and fold it into the record. Merging only ever adds information:
//! an empty collection from the detail never clears a populated one, and a
//! statistic the record already has is never overwritten.

use crate::backoff::BackoffController;
use crate::core::{EntityRecord, HarvestError, QueryDescriptor, QueryExecutor, RecordParser};

use serde::{Deserialize, Serialize};

/// Summary of one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentReport {
    /// Detail lookups attempted.
    pub attempted: usize,
    /// Records that received detail data.
    pub enriched: usize,
    /// Lookups that failed; those records were left unchanged.
    pub failed: usize,
}

/// Merges a parsed detail record into an existing record.
///
/// Non-empty `tags`, `courses` and `rating_distribution` replace the
/// record's; empty ones keep it. Absent statistics and an unknown department
/// are filled in. Returns `true` if anything changed.
pub fn merge_detail(record: &mut EntityRecord, detail: EntityRecord) -> bool {
    let before = record.clone();
    let fill_department = record.has_unknown_department() && !detail.has_unknown_department();

    if !detail.tags.is_empty() {
        record.tags = detail.tags;
    }
    if !detail.courses.is_empty() {
        record.courses = detail.courses;
    }
    if !detail.rating_distribution.is_empty() {
        record.rating_distribution = detail.rating_distribution;
    }

    if fill_department {
        record.department = detail.department;
    }
    record.aggregate_rating = record.aggregate_rating.or(detail.aggregate_rating);
    record.num_ratings = record.num_ratings.or(detail.num_ratings);
    record.would_take_again_percent = record
        .would_take_again_percent
        .or(detail.would_take_again_percent);
    record.difficulty_rating = record.difficulty_rating.or(detail.difficulty_rating);

    *record != before
}

/// Fetches detail nodes and merges them into records.
#[derive(Debug, Clone)]
pub struct EnrichmentMerger<'a> {
    parser: &'a RecordParser,
}

impl<'a> EnrichmentMerger<'a> {
    /// Creates a merger that parses detail nodes with `parser`.
    pub fn new(parser: &'a RecordParser) -> Self {
        Self { parser }
    }

    /// Enriches the first `sample_size` records, in order.
    ///
    /// Failures never propagate: the affected record is left unchanged and
    /// the pass continues.
    pub async fn enrich<E: QueryExecutor>(
        &self,
        controller: &BackoffController<E>,
        records: &mut [EntityRecord],
        sample_size: usize,
    ) -> EnrichmentReport {
        let mut report = EnrichmentReport::default();

        for record in records.iter_mut().take(sample_size) {
            report.attempted += 1;

            let outcome = self.fetch_detail(controller, record).await;
            match outcome {
                Ok(detail) => {
                    let changed = merge_detail(record, detail);
                    report.enriched += 1;
                    tracing::debug!(
                        numeric_id = record.numeric_id,
                        changed,
                        tags = record.tags.len(),
                        courses = record.courses.len(),
                        "Enriched record"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        numeric_id = record.numeric_id,
                        name = %record.full_name,
                        error = %e,
                        "Enrichment failed, keeping summary record"
                    );
                }
            }
        }

        report
    }

    async fn fetch_detail<E: QueryExecutor>(
        &self,
        controller: &BackoffController<E>,
        record: &EntityRecord,
    ) -> Result<EntityRecord, HarvestError> {
        let payload = controller.run(&QueryDescriptor::detail(&record.id)).await?;
        let endpoint = controller.name();

        let node = payload
            .get("data")
            .and_then(|d| d.get("node"))
            .filter(|n| !n.is_null())
            .ok_or_else(|| HarvestError::malformed(endpoint, "detail response has no node"))?;

        let detail = self
            .parser
            .parse(node)
            .map_err(|e| HarvestError::malformed(endpoint, format!("detail node: {e}")))?;

        if detail.numeric_id != record.numeric_id {
            return Err(HarvestError::malformed(
                endpoint,
                format!(
                    "detail node is for {} but {} was requested",
                    detail.numeric_id, record.numeric_id
                ),
            ));
        }

        Ok(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::{detail_response, teacher_node};
    use crate::backends::{MockExecutor, MockReply};
    use crate::backoff::BackoffConfig;
    use crate::core::{Course, RatingDistribution, StarBucket, UNKNOWN_DEPARTMENT};
    use serde_json::{json, Value};

    fn summary(numeric_id: u64) -> EntityRecord {
        RecordParser::new().parse(&teacher_node(numeric_id, "Ada", "Lovelace")).unwrap()
    }

    fn detail_node(numeric_id: u64) -> Value {
        let mut node = teacher_node(numeric_id, "Ada", "Lovelace");
        node["teacherRatingTags"] = json!([{ "tagName": "Tough grader" }, { "tagName": "Caring" }]);
        node["courseCodes"] = json!([{ "courseName": "MATH140", "courseCount": 12 }]);
        node["ratingsDistribution"] = json!({ "r1": 1, "r2": 0, "r3": 2, "r4": 3, "r5": 4 });
        node
    }

    #[test]
    fn test_merge_replaces_with_non_empty() {
        let mut record = summary(1);
        record.tags = vec!["Old".into()];
        let detail = RecordParser::new().parse(&detail_node(1)).unwrap();

        assert!(merge_detail(&mut record, detail));
        assert_eq!(record.tags, vec!["Tough grader", "Caring"]);
        assert_eq!(record.courses, vec![Course::new("MATH140", 12)]);
        assert_eq!(record.rating_distribution.get(StarBucket::Five), Some(4));
    }

    #[test]
    fn test_merge_keeps_existing_when_detail_empty() {
        let mut record = summary(1);
        record.tags = vec!["Existing".into()];
        record.courses = vec![Course::new("MATH141", 3)];
        record.rating_distribution = RatingDistribution::from_counts([0, 0, 0, 1, 1]);
        let expected = record.clone();

        let detail = summary(1);
        assert!(!merge_detail(&mut record, detail));
        assert_eq!(record, expected);
    }

    #[test]
    fn test_merge_fills_absent_statistics_only() {
        let mut record = RecordParser::new()
            .parse(&json!({ "legacyId": 1, "firstName": "Ada", "avgRating": 3.0 }))
            .unwrap();
        assert_eq!(record.department, UNKNOWN_DEPARTMENT);

        let detail = summary(1);
        assert!(merge_detail(&mut record, detail));

        assert_eq!(record.aggregate_rating, Some(3.0));
        assert_eq!(record.num_ratings, Some(10));
        assert_eq!(record.department, "Mathematics");
    }

    #[test]
    fn test_merge_fills_department_alongside_collections() {
        let mut record = RecordParser::new()
            .parse(&json!({ "legacyId": 1, "firstName": "Ada" }))
            .unwrap();
        assert_eq!(record.department, UNKNOWN_DEPARTMENT);

        let detail = RecordParser::new().parse(&detail_node(1)).unwrap();
        assert!(merge_detail(&mut record, detail));

        assert_eq!(record.department, "Mathematics");
        assert_eq!(record.tags, vec!["Tough grader", "Caring"]);
        assert_eq!(record.courses, vec![Course::new("MATH140", 12)]);
        assert_eq!(record.rating_distribution.get(StarBucket::One), Some(1));
    }

    #[tokio::test]
    async fn test_enrich_sample_in_order() {
        let parser = RecordParser::new();
        let mut records: Vec<_> = (1..=4).map(summary).collect();
        let mock = MockExecutor::new()
            .with_detail(records[0].id.clone(), detail_node(1))
            .with_reply(records[1].id.clone(), MockReply::Status(500))
            .with_reply(records[1].id.clone(), MockReply::Status(500))
            .with_reply(records[1].id.clone(), MockReply::Status(500))
            .with_detail(records[2].id.clone(), detail_node(3));
        let ctl = BackoffController::new(mock, BackoffConfig::immediate());

        let report = EnrichmentMerger::new(&parser).enrich(&ctl, &mut records, 3).await;

        assert_eq!(
            report,
            EnrichmentReport {
                attempted: 3,
                enriched: 2,
                failed: 1
            }
        );
        assert!(records[0].is_enriched());
        assert!(!records[1].is_enriched());
        assert!(records[2].is_enriched());
        assert!(!records[3].is_enriched());
        assert_eq!(ctl.inner().calls_for(&records[3].id), 0);
    }

    #[tokio::test]
    async fn test_missing_node_leaves_record_unchanged() {
        let parser = RecordParser::new();
        let mut records = vec![summary(5)];
        let before = records[0].clone();
        let mock = MockExecutor::new().with_reply(
            records[0].id.clone(),
            MockReply::Payload(detail_response(Value::Null)),
        );
        let ctl = BackoffController::new(mock, BackoffConfig::immediate());

        let report = EnrichmentMerger::new(&parser).enrich(&ctl, &mut records, 10).await;

        assert_eq!(report.failed, 1);
        assert_eq!(records[0], before);
    }

    #[tokio::test]
    async fn test_mismatched_node_is_rejected() {
        let parser = RecordParser::new();
        let mut records = vec![summary(5)];
        let mock = MockExecutor::new().with_detail(records[0].id.clone(), detail_node(6));
        let ctl = BackoffController::new(mock, BackoffConfig::immediate());

        let report = EnrichmentMerger::new(&parser).enrich(&ctl, &mut records, 1).await;

        assert_eq!(report.failed, 1);
        assert!(records[0].tags.is_empty());
    }
}
