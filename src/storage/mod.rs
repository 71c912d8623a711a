//! Storage abstractions for outcome persistence.
//!
//! Every persisted list is a headered, append-only table whose key column
//! (column 0 for outputs) holds the job identity key.
//!
//! ## Directory Structure
//!
//! ```text
//! Already_applied_folder/
//! ├── already_applied.csv      # Applied before (on site or by hand)
//! ├── company_sites.csv        # Redirects to the company's own site
//! ├── company_list.csv         # Company names blocked by name
//! ├── do_manually_apply.csv    # Apply failed or timed out
//! ├── expired_jobs.csv         # Posting expired
//! └── success_applied.csv      # Applied by this tool
//! ```

pub mod local;
pub mod table;

use std::path::Path;

use async_trait::async_trait;

use crate::error::{AppError, Result};

// Re-export for convenience
pub use local::CsvStore;
pub use table::Table;

/// Backing store for one outcome sink.
///
/// A store is owned by exactly one sink worker, which is its only writer.
#[async_trait]
pub trait OutcomeStore: Send + 'static {
    /// Human-readable location for logs and errors.
    fn location(&self) -> String;

    /// Write the header row if the store is absent or empty.
    async fn ensure_header(&mut self, header: &[String]) -> Result<()>;

    /// Read every key currently persisted (column 0 of data rows).
    async fn load_keys(&mut self) -> Result<Vec<String>>;

    /// Append one key as a new row and flush it.
    async fn append(&mut self, key: &str) -> Result<()>;
}

/// Read a whole table, returning `None` if the file does not exist.
pub async fn read_table(path: &Path) -> Result<Option<Table>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let content = String::from_utf8_lossy(&bytes);
            Ok(Some(Table::parse(&content)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::store(path.display().to_string(), e)),
    }
}
