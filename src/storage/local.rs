//! Local filesystem table store.
//!
//! Appends go straight to the end of the file and are flushed per row. A
//! last line without a line break (hand-edited list, torn write) is
//! terminated before the new row so the two never merge.
//! Rewrites (compaction) go through a temp file and a rename so a crash
//! never leaves a half-written table behind.

use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::error::{AppError, Result};
use crate::storage::table::{self, Table};
use crate::storage::{OutcomeStore, read_table};
use crate::utils::url::canonical_key;

/// A headered delimited table on local disk.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

/// Result of compacting a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactReport {
    /// Rows kept (first occurrence of each key)
    pub unique: usize,
    /// Duplicate keys dropped, in file order
    pub removed: Vec<String>,
    /// Rows without a usable key, kept untouched
    pub malformed: usize,
}

impl CsvStore {
    /// Create a store backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn err(&self, e: impl std::fmt::Display) -> AppError {
        AppError::store(self.path.display().to_string(), e)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.err(e))?;
            }
        }
        Ok(())
    }

    /// True if the file is missing or has zero length.
    async fn is_blank(&self) -> Result<bool> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.len() == 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(self.err(e)),
        }
    }

    /// True if the file is empty or its last byte is a line break.
    async fn ends_with_newline(&self, file: &mut tokio::fs::File) -> Result<bool> {
        let len = file.metadata().await.map_err(|e| self.err(e))?.len();
        if len == 0 {
            return Ok(true);
        }
        file.seek(SeekFrom::End(-1))
            .await
            .map_err(|e| self.err(e))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)
            .await
            .map_err(|e| self.err(e))?;
        Ok(last[0] == b'\n')
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_atomic(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| self.err(e))?;
        file.write_all(bytes).await.map_err(|e| self.err(e))?;
        file.flush().await.map_err(|e| self.err(e))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.err(e))?;
        Ok(())
    }

    /// Rewrite the table keeping the header and the first row for each key.
    ///
    /// Keys are compared after canonicalisation. A missing table is an error
    /// here since there is nothing to compact.
    pub async fn compact(&self, key_column: usize) -> Result<CompactReport> {
        let table = read_table(&self.path)
            .await?
            .ok_or_else(|| self.err("file not found"))?;

        let mut seen = HashSet::new();
        let mut report = CompactReport::default();
        let mut kept: Vec<&Vec<String>> = Vec::with_capacity(table.rows.len());

        for row in &table.rows {
            match table::field(row, key_column) {
                Some(raw) => {
                    let key = canonical_key(raw);
                    if seen.insert(key.clone()) {
                        kept.push(row);
                    } else {
                        report.removed.push(key);
                    }
                }
                None => {
                    report.malformed += 1;
                    kept.push(row);
                }
            }
        }
        report.unique = seen.len();

        if !report.removed.is_empty() {
            let mut out = String::new();
            if let Some(header) = &table.header {
                out.push_str(&table::encode_row(header.as_slice()));
                out.push('\n');
            }
            for row in kept {
                out.push_str(&table::encode_row(row.as_slice()));
                out.push('\n');
            }
            self.write_atomic(out.as_bytes()).await?;
        }

        Ok(report)
    }

    /// Read the table, or `None` if it does not exist.
    pub async fn read(&self) -> Result<Option<Table>> {
        read_table(&self.path).await
    }
}

#[async_trait]
impl OutcomeStore for CsvStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn ensure_header(&mut self, header: &[String]) -> Result<()> {
        if !self.is_blank().await? {
            return Ok(());
        }
        let mut line = table::encode_row(header);
        line.push('\n');
        self.write_atomic(line.as_bytes()).await
    }

    async fn load_keys(&mut self) -> Result<Vec<String>> {
        let Some(table) = self.read().await? else {
            return Ok(Vec::new());
        };

        let mut keys = Vec::with_capacity(table.rows.len());
        for (index, row) in table.rows.iter().enumerate() {
            match table::field(row, 0) {
                Some(key) => keys.push(canonical_key(key)),
                None => log::warn!(
                    "Skipping malformed row {} in {}",
                    index + 2,
                    self.path.display()
                ),
            }
        }
        Ok(keys)
    }

    async fn append(&mut self, key: &str) -> Result<()> {
        self.ensure_dir().await?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.err(e))?;

        let mut line = String::new();
        if !self.ends_with_newline(&mut file).await? {
            log::warn!("{} did not end with a line break, terminating it", self.path.display());
            line.push('\n');
        }
        line.push_str(&table::encode_row(&[key]));
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.err(e))?;
        file.flush().await.map_err(|e| self.err(e))?;
        Ok(())
    }
}
