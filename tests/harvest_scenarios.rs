//! End-to-end harvest scenarios against the scripted executor.

use roster_harvest::backends::mock::{search_page, teacher_node};
use roster_harvest::backends::{MockExecutor, MockReply};
use roster_harvest::core::query::TEACHER_TYPE;
use roster_harvest::core::{encode_global_id, QueryDescriptor};
use roster_harvest::harvest::{
    HarvestConfig, Harvester, PaginationStyle, PartitionEnd, ALPHABET, CATCH_ALL_DEFAULT_TARGET,
};
use roster_harvest::output::MemoryStore;
use roster_harvest::{BackoffConfig, RecordStore};

use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

fn harvester(executor: &Arc<MockExecutor>, config: HarvestConfig) -> Harvester {
    Harvester::builder()
        .with_arc_executor(executor.clone())
        .with_config(config)
        .with_backoff(BackoffConfig::immediate())
        .build()
        .unwrap()
}

fn single(numeric_id: u64, first: &str) -> serde_json::Value {
    search_page(vec![teacher_node(numeric_id, first, "Doe")], false, None, 1)
}

#[tokio::test]
async fn test_stops_at_maximum_without_catch_all() {
    let mut executor = MockExecutor::new();
    for (i, letter) in ALPHABET.enumerate() {
        let id = i as u64 + 1;
        executor = executor.with_pages(letter.to_string(), [single(id, &letter.to_string())]);
    }
    let executor = Arc::new(executor);
    let store = Arc::new(MemoryStore::new());

    let harvester = Harvester::builder()
        .with_arc_executor(executor.clone())
        .with_config(HarvestConfig::new().with_max_records(Some(15)))
        .with_backoff(BackoffConfig::immediate())
        .with_arc_store(store.clone())
        .build()
        .unwrap();

    let outcome = harvester.run().await.unwrap();

    assert_eq!(outcome.records.len(), 15);
    let ids: HashSet<u64> = outcome.records.iter().map(|r| r.numeric_id).collect();
    assert_eq!(ids.len(), 15);

    assert_eq!(outcome.report.partitions.len(), 15);
    assert_eq!(outcome.report.partitions[14].key, "O");
    assert_eq!(outcome.report.partitions[14].end, PartitionEnd::TargetReached);
    assert!(!outcome.report.catch_all_ran);
    assert_eq!(executor.calls_for("P"), 0);
    assert_eq!(executor.calls_for(""), 0);

    let rows = store.read().await.unwrap();
    assert_eq!(rows.len(), 15);
}

#[tokio::test]
async fn test_soft_failures_are_retried_within_page() {
    let first = search_page(
        vec![
            teacher_node(1, "Ann", "A"),
            teacher_node(2, "Ben", "A"),
            teacher_node(3, "Cal", "A"),
        ],
        true,
        Some("cursor-1"),
        4,
    );
    let second = search_page(vec![teacher_node(4, "Dee", "A")], false, None, 4);

    let executor = Arc::new(
        MockExecutor::new()
            .with_reply("A", MockReply::Timeout)
            .with_reply("A", MockReply::Status(503))
            .with_pages("A", [first, second]),
    );
    let harvester = harvester(&executor, HarvestConfig::new().with_max_records(Some(4)));

    let mut session = harvester.new_session();
    harvester.harvest(&mut session).await;

    assert_eq!(session.len(), 4);
    assert_eq!(session.controller().metrics().retries, 2);
    assert_eq!(session.controller().metrics().soft_failures, 2);
    assert_eq!(session.controller().current_retries(), 0);
    assert_eq!(executor.calls_for("A"), 4);
    assert_eq!(session.partitions()[0].pages, 2);

    // The second request echoed the first page's cursor.
    let afters: Vec<Option<String>> = executor
        .calls()
        .into_iter()
        .filter_map(|q| match q {
            QueryDescriptor::Search { text, after, .. } if text == "A" => Some(after),
            _ => None,
        })
        .collect();
    assert_eq!(afters.last().unwrap().as_deref(), Some("cursor-1"));
}

#[tokio::test]
async fn test_duplicate_across_partitions_keeps_first() {
    let executor = Arc::new(
        MockExecutor::new()
            .with_pages("A", [single(7, "Alpha")])
            .with_pages("B", [single(7, "Beta")]),
    );
    let harvester = harvester(&executor, HarvestConfig::new());

    let outcome = harvester.run().await.unwrap();

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].first_name, "Alpha");
    assert_eq!(outcome.report.duplicates, 1);
    assert_eq!(outcome.report.partitions[1].duplicates, 1);
    assert_eq!(outcome.report.nodes_observed, 2);
}

#[tokio::test]
async fn test_no_request_after_last_page() {
    let executor = Arc::new(
        MockExecutor::new().with_pages("A", [single(1, "Only"), single(2, "Never")]),
    );
    let harvester = harvester(&executor, HarvestConfig::new());

    let outcome = harvester.run().await.unwrap();

    assert_eq!(executor.calls_for("A"), 1);
    assert_eq!(executor.pending("A"), 1);
    assert_eq!(outcome.report.partitions[0].end, PartitionEnd::Exhausted);
    assert!(outcome.records.iter().all(|r| r.numeric_id != 2));
}

#[tokio::test]
async fn test_catch_all_reports_source_total() {
    let executor = Arc::new(
        MockExecutor::new()
            .with_pages("A", [single(1, "Ann")])
            .with_pages("", [search_page(vec![teacher_node(2, "Bo", "Z")], false, None, 120)]),
    );
    let harvester = harvester(&executor, HarvestConfig::new());

    let outcome = harvester.run().await.unwrap();

    assert!(outcome.report.catch_all_ran);
    assert_eq!(outcome.report.source_reported_total, Some(120));
    assert!(outcome.report.within_source_total());
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.report.partitions.len(), 27);
}

#[tokio::test]
async fn test_session_abort_unwinds_and_probe_recovers() {
    let executor = Arc::new(
        MockExecutor::new()
            .with_reply("A", MockReply::Rejected("bad".into()))
            .with_reply("B", MockReply::Rejected("bad".into()))
            .with_reply("C", MockReply::Rejected("bad".into()))
            .with_pages("D", [single(4, "Dee")]),
    );
    let harvester = harvester(&executor, HarvestConfig::new());

    let outcome = harvester.run().await.unwrap();
    let partitions = &outcome.report.partitions;

    assert!(matches!(partitions[0].end, PartitionEnd::Failed { .. }));
    assert!(matches!(partitions[1].end, PartitionEnd::Failed { .. }));
    assert_eq!(partitions[2].end, PartitionEnd::SessionAborted);
    assert_eq!(partitions[3].end, PartitionEnd::Exhausted);
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.report.controller.times_opened, 1);
    assert_eq!(outcome.report.abandoned_partitions().len(), 3);
}

#[tokio::test]
async fn test_exhausted_soft_failures_abandon_partition() {
    let executor = Arc::new(
        MockExecutor::new()
            .with_reply("A", MockReply::Timeout)
            .with_reply("A", MockReply::Timeout)
            .with_reply("A", MockReply::Timeout)
            .with_pages("B", [single(2, "Bee")]),
    );
    let harvester = harvester(&executor, HarvestConfig::new());

    let outcome = harvester.run().await.unwrap();

    assert_eq!(executor.calls_for("A"), 3);
    assert!(matches!(outcome.report.partitions[0].end, PartitionEnd::Failed { .. }));
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].numeric_id, 2);
}

#[tokio::test]
async fn test_offset_pagination_stops_at_result_count() {
    let executor = Arc::new(MockExecutor::new().with_pages(
        "A",
        [
            search_page(vec![teacher_node(1, "A", "A"), teacher_node(2, "B", "A")], true, None, 3),
            search_page(vec![teacher_node(3, "C", "A")], true, None, 3),
            search_page(vec![teacher_node(4, "D", "A")], true, None, 3),
        ],
    ));
    let config = HarvestConfig::new()
        .with_pagination(PaginationStyle::Offset)
        .with_page_size(Some(2));
    let harvester = harvester(&executor, config);

    let outcome = harvester.run().await.unwrap();

    assert_eq!(executor.calls_for("A"), 2);
    assert_eq!(outcome.report.partitions[0].end, PartitionEnd::ResultCountReached);

    let offsets: Vec<u32> = executor
        .calls()
        .into_iter()
        .filter_map(|q| match q {
            QueryDescriptor::OffsetSearch { text, offset, .. } if text == "A" => Some(offset),
            _ => None,
        })
        .collect();
    assert_eq!(offsets, vec![0, 2]);
}

#[tokio::test]
async fn test_test_mode_caps_at_ten() {
    let nodes: Vec<_> = (1..=25).map(|i| teacher_node(i, "T", "M")).collect();
    let executor = Arc::new(
        MockExecutor::new().with_pages("A", [search_page(nodes, false, None, 25)]),
    );
    let harvester = harvester(&executor, HarvestConfig::new().with_test_mode(true));

    let outcome = harvester.run().await.unwrap();

    assert_eq!(outcome.records.len(), 10);
    assert_eq!(outcome.report.partitions.len(), 1);
    assert_eq!(outcome.report.partitions[0].end, PartitionEnd::TargetReached);
}

#[tokio::test]
async fn test_catch_all_skipped_without_maximum_once_enough_collected() {
    let nodes: Vec<_> = (1..=150).map(|i| teacher_node(i, "Many", "A")).collect();
    let executor = Arc::new(
        MockExecutor::new()
            .with_pages("A", [search_page(nodes, false, None, 150)])
            .with_pages("", [single(999, "Late")]),
    );
    let harvester = harvester(&executor, HarvestConfig::new());

    let outcome = harvester.run().await.unwrap();

    assert!(outcome.records.len() >= CATCH_ALL_DEFAULT_TARGET);
    assert_eq!(outcome.records.len(), 150);
    assert!(!outcome.report.catch_all_ran);
    assert_eq!(outcome.report.partitions.len(), 26);
    assert_eq!(executor.calls_for(""), 0);
    assert_eq!(executor.pending(""), 1);
}

#[tokio::test]
async fn test_offset_pages_keep_tags_through_enrichment() {
    let mut node = teacher_node(1, "Tagged", "A");
    node["teacherRatingTags"] = json!([{ "tagName": "Clear grading", "tagCount": 4 }]);
    node["courseCodes"] = json!([{ "courseName": "CMPSC131", "courseCount": 9 }]);

    let executor = Arc::new(
        MockExecutor::new()
            .with_pages("A", [search_page(vec![node], true, None, 1)])
            .with_detail(encode_global_id(TEACHER_TYPE, 1), teacher_node(1, "Tagged", "A")),
    );
    let config = HarvestConfig::new()
        .with_max_records(Some(1))
        .with_pagination(PaginationStyle::Offset)
        .with_enrichment_sample(1);
    let harvester = harvester(&executor, config);

    let outcome = harvester.run().await.unwrap();
    let record = &outcome.records[0];

    assert_eq!(record.tags, vec!["Clear grading"]);
    assert_eq!(record.courses.len(), 1);
    assert_eq!(record.courses[0].name, "CMPSC131");
    assert_eq!(outcome.report.enrichment.map(|e| e.attempted), Some(1));

    let requested = executor
        .calls()
        .into_iter()
        .find(|q| matches!(q, QueryDescriptor::OffsetSearch { .. }))
        .map(|q| q.document());
    assert!(requested.unwrap().contains("teacherRatingTags"));
}

#[tokio::test]
async fn test_malformed_search_pages_abort_session() {
    let empty = || MockReply::Payload(json!({ "data": {} }));
    let executor = Arc::new(
        MockExecutor::new()
            .with_reply("A", empty())
            .with_reply("B", empty())
            .with_reply("C", empty())
            .with_pages("D", [single(4, "Dee")]),
    );
    let harvester = harvester(&executor, HarvestConfig::new());

    let outcome = harvester.run().await.unwrap();
    let partitions = &outcome.report.partitions;

    assert!(matches!(partitions[0].end, PartitionEnd::Failed { .. }));
    assert!(matches!(partitions[1].end, PartitionEnd::Failed { .. }));
    assert_eq!(partitions[2].end, PartitionEnd::SessionAborted);
    assert_eq!(partitions[3].end, PartitionEnd::Exhausted);
    assert_eq!(outcome.report.controller.times_opened, 1);
    assert_eq!(outcome.records.len(), 1);
}
