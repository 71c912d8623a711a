//! Deduplication and outcome routing.
//!
//! - `identity`: merged already-seen index and company block
//! - `sink`: durable, deduplicating outcome writers
//! - `router`: per-record classification
//! - `cursor`: adaptive pagination and stop condition
//! - `run`: the pipeline that ties them together

pub mod cursor;
pub mod identity;
pub mod router;
pub mod run;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use cursor::{CursorState, PageCursor, StopPolicy};
pub use identity::{CompanyBlock, IdentitySet, IdentitySource, SourceReport};
pub use router::{OutcomeRouter, RoutingContext};
pub use run::{Pipeline, RunStats, RunStop, RunSummary};
pub use sink::{DrainReport, OutcomeSink, SinkFailure, SinkReport, SinkSet};
