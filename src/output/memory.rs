//! In-memory record store.

use crate::core::{EntityRecord, OutputResult};
use crate::output::traits::{decode_lines, encode_lines, RecordStore, WriteMode};

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::RwLock;

/// Keeps JSONL content in memory.
///
/// Useful for testing or when output should not touch the filesystem.
#[derive(Debug, Default)]
pub struct MemoryStore {
    content: RwLock<String>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw JSONL content.
    pub fn contents(&self) -> String {
        self.content
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn write(&self, records: &[EntityRecord], mode: WriteMode) -> OutputResult<usize> {
        let lines = encode_lines(records)?;
        let mut content = self
            .content
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if mode == WriteMode::Overwrite {
            content.clear();
        }
        content.push_str(&lines);

        Ok(records.len())
    }

    async fn read(&self) -> OutputResult<Vec<Map<String, Value>>> {
        decode_lines("memory", &self.contents())
    }
}
