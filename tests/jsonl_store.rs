//! JSONL store tests on a temporary directory.

use roster_harvest::backends::mock::teacher_node;
use roster_harvest::core::{EntityRecord, OutputError, RecordParser};
use roster_harvest::output::{JsonlStore, RecordStore, WriteMode};

use serde_json::json;
use tempfile::TempDir;

fn records(ids: &[u64]) -> Vec<EntityRecord> {
    let parser = RecordParser::new();
    ids.iter()
        .map(|&id| parser.parse(&teacher_node(id, "Grace", "Hopper")).unwrap())
        .collect()
}

#[tokio::test]
async fn test_write_creates_parent_dirs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("out.jsonl");
    let store = JsonlStore::new(&path);

    let written = store.write(&records(&[1, 2, 3]), WriteMode::Overwrite).await.unwrap();

    assert_eq!(written, 3);
    assert!(path.exists());
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 3);
}

#[tokio::test]
async fn test_read_back_fields() {
    let dir = TempDir::new().unwrap();
    let store = JsonlStore::new(dir.path().join("out.jsonl"));
    store.write(&records(&[42]), WriteMode::Overwrite).await.unwrap();

    let rows = store.read().await.unwrap();
    let row = &rows[0];

    assert_eq!(row["numeric_id"], 42);
    assert_eq!(row["full_name"], "Grace Hopper");
    assert_eq!(row["department"], "Mathematics");
    assert_eq!(row["school"], "Penn State University");
    assert_eq!(row["aggregate_rating"], json!(4.0));
    assert_eq!(row["profile_url"], "https://www.ratemyprofessors.com/professor/42");
    assert!(row["rating_distribution"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn test_append_and_overwrite() {
    let dir = TempDir::new().unwrap();
    let store = JsonlStore::new(dir.path().join("out.jsonl"));

    store.write(&records(&[1, 2]), WriteMode::Overwrite).await.unwrap();
    store.write(&records(&[3]), WriteMode::Append).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 3);

    store.write(&records(&[4]), WriteMode::Overwrite).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_missing_file_reads_empty() {
    let dir = TempDir::new().unwrap();
    let store = JsonlStore::new(dir.path().join("absent.jsonl"));

    assert!(store.read().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_blank_lines_skipped_and_bad_lines_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hand.jsonl");

    std::fs::write(&path, "{\"numeric_id\":1}\n\n  \n{\"numeric_id\":2}\n").unwrap();
    let store = JsonlStore::new(&path);
    assert_eq!(store.read().await.unwrap().len(), 2);

    std::fs::write(&path, "{\"numeric_id\":1}\n\"just a string\"\n").unwrap();
    let err = store.read().await.unwrap_err();
    assert!(matches!(err, OutputError::MalformedLine { line: 2, .. }));
}
