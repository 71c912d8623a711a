//! Collaborators the pipeline talks to.
//!
//! - [`JobSource`]: yields listing pages (`ListingFileSource`, `BridgeListing`)
//! - [`JobBrowser`]: probes and applies to one posting (`BridgeClient`)

mod bridge;
mod listing;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ApplyResult, JobRecord, ProbeResult};

pub use bridge::{BridgeClient, BridgeListing};
pub use listing::ListingFileSource;

/// A live, authenticated browsing session.
#[async_trait]
pub trait JobBrowser: Send + Sync {
    /// Open the posting and report what kind of page it is.
    async fn probe(&self, record: &JobRecord) -> Result<ProbeResult>;

    /// Attempt the in-site application flow.
    async fn apply(&self, record: &JobRecord) -> Result<ApplyResult>;
}

/// A paged listing of job records.
#[async_trait]
pub trait JobSource: Send {
    /// Next page of records, or `None` once the listing is exhausted.
    async fn next_page(&mut self) -> Result<Option<Vec<JobRecord>>>;
}
