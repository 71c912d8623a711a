//! Durable, deduplicating outcome sinks.
//!
//! Each sink owns one store and one background worker. Callers hand keys
//! over with [`OutcomeSink::enqueue`], which never waits on disk; the worker
//! drains its queue in order, drops keys the store already holds, and
//! appends the rest. [`OutcomeSink::close`] sends a stop message and waits
//! until everything enqueued before it has been written.
//!
//! A worker that gives up on a key stops writing but keeps draining its
//! queue until closed, so every key it never persisted is returned in the
//! [`AppError::SinkFailed`] from `close`.

use std::collections::{BTreeMap, HashSet};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::models::{OutcomeCategory, StorageConfig};
use crate::storage::{CsvStore, OutcomeStore};

/// Attempts per key before the worker gives up.
const MAX_ATTEMPTS: usize = 2;

/// Header for every outcome table.
pub const URL_HEADER: &str = "URL";

/// Header for the company list.
pub const COMPANY_HEADER: &str = "Company Name";

enum SinkMessage {
    Append(String),
    Stop,
}

/// Raised by a worker as soon as it gives up on a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkFailure {
    pub sink: String,
    pub key: String,
    pub message: String,
}

/// What a worker did before it stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkReport {
    pub name: String,
    pub location: String,
    /// Rows appended this run
    pub written: usize,
    /// Keys dropped because the store already held them
    pub duplicates: usize,
    /// Appends that succeeded only on the second attempt
    pub retried: usize,
}

/// Append-only writer for one outcome category.
pub struct OutcomeSink {
    name: String,
    tx: mpsc::UnboundedSender<SinkMessage>,
    worker: JoinHandle<Result<SinkReport>>,
}

impl OutcomeSink {
    /// Open `store`, write its header if needed, load its keys and start the
    /// worker. `failures` receives an event if the worker dies.
    pub async fn open<S: OutcomeStore>(
        name: impl Into<String>,
        mut store: S,
        header: &[String],
        failures: Option<mpsc::UnboundedSender<SinkFailure>>,
    ) -> Result<Self> {
        let name = name.into();
        store.ensure_header(header).await?;
        let replica: HashSet<String> = store.load_keys().await?.into_iter().collect();

        log::debug!(
            "Opened sink '{}' at {} with {} existing keys",
            name,
            store.location(),
            replica.len()
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(
            name.clone(),
            Mutex::new(store),
            replica,
            rx,
            failures,
        ));

        Ok(Self { name, tx, worker })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hand a key to the worker. Returns immediately.
    ///
    /// Fails only if the worker has already stopped.
    pub fn enqueue(&self, key: impl Into<String>) -> Result<()> {
        let key = key.into();
        self.tx
            .send(SinkMessage::Append(key.clone()))
            .map_err(|_| AppError::SinkFailed {
                category: self.name.clone(),
                keys: vec![key],
                message: "sink worker has stopped".into(),
            })
    }

    /// Stop the worker after it drains everything enqueued so far.
    pub async fn close(self) -> Result<SinkReport> {
        // A dead worker already dropped its receiver; the join below reports why.
        let _ = self.tx.send(SinkMessage::Stop);
        match self.worker.await {
            Ok(result) => result,
            Err(e) => Err(AppError::SinkFailed {
                category: self.name,
                keys: Vec::new(),
                message: format!("worker aborted: {e}"),
            }),
        }
    }
}

async fn run_worker<S: OutcomeStore>(
    name: String,
    store: Mutex<S>,
    mut replica: HashSet<String>,
    mut rx: mpsc::UnboundedReceiver<SinkMessage>,
    failures: Option<mpsc::UnboundedSender<SinkFailure>>,
) -> Result<SinkReport> {
    let mut report = SinkReport {
        name: name.clone(),
        location: store.lock().await.location(),
        ..SinkReport::default()
    };
    // Set once the worker gives up: keys it will never write, and why.
    let mut unwritten: Option<(Vec<String>, String)> = None;

    while let Some(message) = rx.recv().await {
        let key = match message {
            SinkMessage::Append(key) => key,
            SinkMessage::Stop => break,
        };

        if replica.contains(&key) {
            report.duplicates += 1;
            continue;
        }

        if let Some((keys, _)) = unwritten.as_mut() {
            if !keys.contains(&key) {
                keys.push(key);
            }
            continue;
        }

        match append_with_retry(&name, &store, &key).await {
            Ok(attempts) => {
                if attempts > 1 {
                    report.retried += 1;
                }
                replica.insert(key);
                report.written += 1;
            }
            Err(e) => {
                log::error!(
                    "Sink '{}' giving up on {} after {} attempts: {}",
                    name,
                    key,
                    MAX_ATTEMPTS,
                    e
                );
                if let Some(tx) = &failures {
                    let _ = tx.send(SinkFailure {
                        sink: name.clone(),
                        key: key.clone(),
                        message: e.to_string(),
                    });
                }
                unwritten = Some((vec![key], e.to_string()));
            }
        }
    }

    if let Some((keys, message)) = unwritten {
        log::error!("Sink '{}' stopped with {} unwritten keys", name, keys.len());
        return Err(AppError::SinkFailed {
            category: name,
            keys,
            message,
        });
    }

    log::debug!(
        "Sink '{}' drained: {} written, {} duplicates",
        name,
        report.written,
        report.duplicates
    );
    Ok(report)
}

/// Append `key`, retrying once. Returns the number of attempts used.
async fn append_with_retry<S: OutcomeStore>(
    name: &str,
    store: &Mutex<S>,
    key: &str,
) -> Result<usize> {
    let mut attempt = 1;
    loop {
        let result = store.lock().await.append(key).await;
        match result {
            Ok(()) => return Ok(attempt),
            Err(e) if attempt < MAX_ATTEMPTS => {
                log::warn!("Sink '{}' append failed for {}, retrying: {}", name, key, e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Outcome of closing every sink.
#[derive(Debug, Default)]
pub struct DrainReport {
    pub reports: Vec<SinkReport>,
    pub failures: Vec<AppError>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One sink per outcome category plus the company list.
pub struct SinkSet {
    sinks: BTreeMap<OutcomeCategory, OutcomeSink>,
    companies: Option<OutcomeSink>,
    failure_tx: mpsc::UnboundedSender<SinkFailure>,
    failure_rx: mpsc::UnboundedReceiver<SinkFailure>,
}

impl SinkSet {
    /// An empty set; attach sinks with [`SinkSet::open_category`].
    pub fn new() -> Self {
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();
        Self {
            sinks: BTreeMap::new(),
            companies: None,
            failure_tx,
            failure_rx,
        }
    }

    /// Open every category table and the company list under the storage dir.
    pub async fn open_local(storage: &StorageConfig) -> Result<Self> {
        let mut set = Self::new();
        for category in OutcomeCategory::ALL {
            set.open_category(category, CsvStore::new(storage.output_path(category)))
                .await?;
        }
        set.open_companies(CsvStore::new(storage.company_list_path()))
            .await?;
        Ok(set)
    }

    pub async fn open_category<S: OutcomeStore>(
        &mut self,
        category: OutcomeCategory,
        store: S,
    ) -> Result<()> {
        let sink = OutcomeSink::open(
            category.as_str(),
            store,
            &[URL_HEADER.to_string()],
            Some(self.failure_tx.clone()),
        )
        .await?;
        self.sinks.insert(category, sink);
        Ok(())
    }

    pub async fn open_companies<S: OutcomeStore>(&mut self, store: S) -> Result<()> {
        let sink = OutcomeSink::open(
            "company-list",
            store,
            &[COMPANY_HEADER.to_string()],
            Some(self.failure_tx.clone()),
        )
        .await?;
        self.companies = Some(sink);
        Ok(())
    }

    /// Queue `key` on the category's sink.
    pub fn enqueue(&self, category: OutcomeCategory, key: &str) -> Result<()> {
        self.sinks
            .get(&category)
            .ok_or_else(|| AppError::config(format!("no sink open for '{category}'")))?
            .enqueue(key)
    }

    /// Queue a newly blocked company name. No-op without a company sink.
    pub fn enqueue_company(&self, name: &str) -> Result<()> {
        match &self.companies {
            Some(sink) => sink.enqueue(name),
            None => Ok(()),
        }
    }

    /// First worker failure reported since the last poll, if any.
    pub fn poll_failure(&mut self) -> Option<SinkFailure> {
        self.failure_rx.try_recv().ok()
    }

    /// Close every sink, letting each drain, and collect their results.
    pub async fn close_all(self) -> DrainReport {
        let mut drain = DrainReport::default();
        let sinks = self.sinks.into_values().chain(self.companies);
        for sink in sinks {
            let name = sink.name().to_string();
            match sink.close().await {
                Ok(report) => drain.reports.push(report),
                Err(e) => {
                    log::error!("Sink '{}' closed with failure: {}", name, e);
                    drain.failures.push(e);
                }
            }
        }
        drain
    }
}

impl Default for SinkSet {
    fn default() -> Self {
        Self::new()
    }
}
