// src/lib.rs

//! Job Router Library
//!
//! Deduplicates scraped job listings against every previously recorded
//! outcome, routes each new job into exactly one outcome table, and pages
//! through a listing until its stop condition is met.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
