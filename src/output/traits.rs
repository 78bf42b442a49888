//! Record store trait definition.

use crate::core::{EntityRecord, OutputError, OutputResult};

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt::Debug;

/// How a write treats existing content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace whatever the store held.
    #[default]
    Overwrite,
    /// Add after existing content.
    Append,
}

/// Trait for line-delimited record storage.
///
/// Each record is stored as one compact JSON object per line. Reading back
/// yields generic JSON objects so that files written by older versions (or
/// edited by hand) can still be inspected.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use roster_harvest::output::{RecordStore, WriteMode};
/// use roster_harvest::core::{EntityRecord, OutputResult};
/// use async_trait::async_trait;
/// use serde_json::{Map, Value};
///
/// #[derive(Debug)]
/// struct BucketStore {
///     // Your storage implementation
/// }
///
/// #[async_trait]
/// impl RecordStore for BucketStore {
///     async fn write(&self, records: &[EntityRecord], mode: WriteMode) -> OutputResult<usize> {
///         // Persist the records
///         todo!()
///     }
///
///     async fn read(&self) -> OutputResult<Vec<Map<String, Value>>> {
///         // Load every stored line
///         todo!()
///     }
/// }
/// ```
#[async_trait]
pub trait RecordStore: Send + Sync + Debug {
    /// Persists records.
    ///
    /// # Returns
    ///
    /// The number of records written.
    async fn write(&self, records: &[EntityRecord], mode: WriteMode) -> OutputResult<usize>;

    /// Reads every stored record. A store that has never been written reads
    /// as empty.
    async fn read(&self) -> OutputResult<Vec<Map<String, Value>>>;

    /// Returns the number of stored records.
    async fn count(&self) -> OutputResult<usize> {
        Ok(self.read().await?.len())
    }
}

/// Serializes records as JSONL, one line per record with a trailing newline.
pub(crate) fn encode_lines(records: &[EntityRecord]) -> OutputResult<String> {
    let mut out = String::new();
    for record in records {
        let line = serde_json::to_string(record).map_err(|source| OutputError::Serialize {
            numeric_id: record.numeric_id,
            source,
        })?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

/// Parses JSONL content, skipping blank lines.
pub(crate) fn decode_lines(path: &str, content: &str) -> OutputResult<Vec<Map<String, Value>>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(OutputError::MalformedLine {
                path: path.to_string(),
                line: i + 1,
                details: format!("expected object, found {}", json_kind(&other)),
            }),
            Err(e) => Err(OutputError::MalformedLine {
                path: path.to_string(),
                line: i + 1,
                details: e.to_string(),
            }),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
