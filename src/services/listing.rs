// src/services/listing.rs

//! Listing pages read from a scraped table.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::JobRecord;
use crate::services::JobSource;
use crate::storage::{read_table, table};

const COMPANY: &str = "Company Name";
const EXPERIENCE: &str = "Experience Required";
const LOCATION: &str = "Location";
const LINK: &str = "Link";
const TITLE: &str = "Title";

/// Serves a listing table in fixed-size pages.
///
/// The table needs a `Link` column; `Company Name`, `Experience Required`,
/// `Location` and `Title` are picked up when present.
#[derive(Debug)]
pub struct ListingFileSource {
    path: PathBuf,
    page_size: usize,
    records: Option<VecDeque<JobRecord>>,
}

impl ListingFileSource {
    pub fn new(path: impl Into<PathBuf>, page_size: usize) -> Self {
        Self {
            path: path.into(),
            page_size: page_size.max(1),
            records: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<VecDeque<JobRecord>> {
        let Some(table) = read_table(&self.path).await? else {
            return Err(AppError::collaborator(
                "listing source",
                format!("{} not found", self.path.display()),
            ));
        };

        let link = table.column(LINK).ok_or_else(|| {
            AppError::validation(format!("{} has no '{}' column", self.path.display(), LINK))
        })?;
        let company = table.column(COMPANY);
        let experience = table.column(EXPERIENCE);
        let location = table.column(LOCATION);
        let title = table.column(TITLE);
        let optional = |row: &[String], col: Option<usize>| {
            col.and_then(|c| table::field(row, c)).map(str::to_string)
        };

        let mut records = VecDeque::with_capacity(table.rows.len());
        for (i, row) in table.rows.iter().enumerate() {
            let Some(url) = table::field(row, link) else {
                log::warn!("{}: row {} has no link, skipped", self.path.display(), i + 2);
                continue;
            };
            let mut record = JobRecord::new(url);
            record.company = optional(row.as_slice(), company);
            record.experience = optional(row.as_slice(), experience);
            record.location = optional(row.as_slice(), location);
            record.title = optional(row.as_slice(), title);
            records.push_back(record);
        }

        log::info!(
            "Loaded {} listings from {}",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }
}

#[async_trait]
impl JobSource for ListingFileSource {
    async fn next_page(&mut self) -> Result<Option<Vec<JobRecord>>> {
        if self.records.is_none() {
            self.records = Some(self.load().await?);
        }
        let Some(records) = self.records.as_mut() else {
            return Ok(None);
        };
        if records.is_empty() {
            return Ok(None);
        }
        let take = self.page_size.min(records.len());
        Ok(Some(records.drain(..take).collect()))
    }
}
