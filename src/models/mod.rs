// src/models/mod.rs

//! Domain models for the job router.
//!
//! This module contains the data structures shared by the pipeline, the
//! storage layer and the collaborator services.

mod config;
mod job;
mod outcome;

// Re-export all public types
pub use config::{BridgeConfig, Config, RunConfig, SourceConfig, StorageConfig, TimeoutConfig};
pub use job::JobRecord;
pub use outcome::{ApplyResult, Outcome, OutcomeCategory, ProbeResult, SourceLabel};
