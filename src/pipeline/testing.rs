//! In-memory collaborators for pipeline tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{ApplyResult, JobRecord, ProbeResult};
use crate::services::{JobBrowser, JobSource};
use crate::storage::OutcomeStore;

pub type SharedRows = Arc<Mutex<Vec<String>>>;

/// Store that keeps rows in memory.
#[derive(Default, Clone)]
pub struct MemoryStore {
    rows: SharedRows,
}

impl MemoryStore {
    pub fn with_rows(rows: &[&str]) -> Self {
        Self {
            rows: Arc::new(Mutex::new(rows.iter().map(|r| r.to_string()).collect())),
        }
    }

    pub fn rows(&self) -> SharedRows {
        Arc::clone(&self.rows)
    }
}

#[async_trait]
impl OutcomeStore for MemoryStore {
    fn location(&self) -> String {
        "memory".into()
    }

    async fn ensure_header(&mut self, _header: &[String]) -> Result<()> {
        Ok(())
    }

    async fn load_keys(&mut self) -> Result<Vec<String>> {
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn append(&mut self, key: &str) -> Result<()> {
        self.rows.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

/// Store whose first `failures` appends fail.
pub struct FlakyStore {
    failures: usize,
    rows: SharedRows,
}

impl FlakyStore {
    pub fn failing_times(failures: usize) -> Self {
        Self {
            failures,
            rows: SharedRows::default(),
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_times(usize::MAX)
    }

    pub fn rows(&self) -> SharedRows {
        Arc::clone(&self.rows)
    }
}

#[async_trait]
impl OutcomeStore for FlakyStore {
    fn location(&self) -> String {
        "flaky".into()
    }

    async fn ensure_header(&mut self, _header: &[String]) -> Result<()> {
        Ok(())
    }

    async fn load_keys(&mut self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn append(&mut self, key: &str) -> Result<()> {
        if self.failures > 0 {
            self.failures = self.failures.saturating_sub(1);
            return Err(AppError::store("flaky", "simulated write failure"));
        }
        self.rows.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Behavior<T> {
    Return(T),
    Error,
    Hang,
}

/// Scripted browser session. Unscripted keys probe as actionable and apply
/// successfully.
#[derive(Default)]
pub struct FakeBrowser {
    probes: HashMap<String, Behavior<ProbeResult>>,
    applies: HashMap<String, Behavior<ApplyResult>>,
    probe_calls: AtomicUsize,
    apply_calls: AtomicUsize,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(mut self, key: &str, result: ProbeResult) -> Self {
        self.probes.insert(key.into(), Behavior::Return(result));
        self
    }

    pub fn probe_error(mut self, key: &str) -> Self {
        self.probes.insert(key.into(), Behavior::Error);
        self
    }

    pub fn apply(mut self, key: &str, result: ApplyResult) -> Self {
        self.applies.insert(key.into(), Behavior::Return(result));
        self
    }

    pub fn apply_error(mut self, key: &str) -> Self {
        self.applies.insert(key.into(), Behavior::Error);
        self
    }

    pub fn apply_hangs(mut self, key: &str) -> Self {
        self.applies.insert(key.into(), Behavior::Hang);
        self
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    async fn act<T: Copy>(behavior: Option<&Behavior<T>>, default: T, what: &str) -> Result<T> {
        match behavior.copied().unwrap_or(Behavior::Return(default)) {
            Behavior::Return(value) => Ok(value),
            Behavior::Error => Err(AppError::collaborator(what, "session lost")),
            Behavior::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl JobBrowser for FakeBrowser {
    async fn probe(&self, record: &JobRecord) -> Result<ProbeResult> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        Self::act(self.probes.get(record.key()), ProbeResult::Actionable, "probe").await
    }

    async fn apply(&self, record: &JobRecord) -> Result<ApplyResult> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        Self::act(self.applies.get(record.key()), ApplyResult::Success, "apply").await
    }
}

/// Source serving a fixed list of pages.
pub struct FakeSource {
    pages: VecDeque<Vec<JobRecord>>,
    served: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn new(pages: Vec<Vec<JobRecord>>) -> Self {
        Self {
            pages: pages.into(),
            served: Arc::default(),
        }
    }

    /// Pages of plain keys.
    pub fn from_keys(pages: &[&[&str]]) -> Self {
        Self::new(
            pages
                .iter()
                .map(|page| page.iter().map(|k| JobRecord::new(*k)).collect())
                .collect(),
        )
    }

    pub fn served(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.served)
    }
}

#[async_trait]
impl JobSource for FakeSource {
    async fn next_page(&mut self) -> Result<Option<Vec<JobRecord>>> {
        let page = self.pages.pop_front();
        if page.is_some() {
            self.served.fetch_add(1, Ordering::SeqCst);
        }
        Ok(page)
    }
}
