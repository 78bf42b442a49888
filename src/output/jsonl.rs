//! File-backed JSONL record store.

use crate::core::{EntityRecord, OutputError, OutputResult};
use crate::output::traits::{decode_lines, encode_lines, RecordStore, WriteMode};

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Default output path.
pub const DEFAULT_OUTPUT_PATH: &str = "data/professors.jsonl";

/// Stores records in a line-delimited JSON file.
///
/// Parent directories are created on first write.
#[derive(Debug, Clone)]
pub struct JsonlStore {
    path: PathBuf,
}

impl JsonlStore {
    /// Creates a store for the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    fn write_error(&self, source: std::io::Error) -> OutputError {
        OutputError::WriteFailed {
            path: self.display_path(),
            source,
        }
    }

    async fn ensure_parent(&self) -> OutputResult<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_error(e)),
            _ => Ok(()),
        }
    }
}

impl Default for JsonlStore {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_PATH)
    }
}

#[async_trait]
impl RecordStore for JsonlStore {
    async fn write(&self, records: &[EntityRecord], mode: WriteMode) -> OutputResult<usize> {
        let content = encode_lines(records)?;
        self.ensure_parent().await?;

        match mode {
            WriteMode::Overwrite => {
                tokio::fs::write(&self.path, content.as_bytes())
                    .await
                    .map_err(|e| self.write_error(e))?;
            }
            WriteMode::Append => {
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .await
                    .map_err(|e| self.write_error(e))?;
                file.write_all(content.as_bytes())
                    .await
                    .map_err(|e| self.write_error(e))?;
                file.flush().await.map_err(|e| self.write_error(e))?;
            }
        }

        tracing::info!(
            path = %self.path.display(),
            count = records.len(),
            mode = ?mode,
            "Wrote records"
        );

        Ok(records.len())
    }

    async fn read(&self) -> OutputResult<Vec<Map<String, Value>>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(OutputError::ReadFailed {
                    path: self.display_path(),
                    source,
                })
            }
        };

        decode_lines(&self.display_path(), &content)
    }
}
