// src/pipeline/run.rs

//! Run orchestration: load known keys, open sinks, walk pages, drain.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Config, Outcome};
use crate::pipeline::cursor::{CursorState, PageCursor, StopPolicy};
use crate::pipeline::identity::{CompanyBlock, IdentitySet, IdentitySource, SourceReport};
use crate::pipeline::router::{OutcomeRouter, RoutingContext};
use crate::pipeline::sink::{SinkReport, SinkSet};
use crate::services::{JobBrowser, JobSource};
use crate::utils::report;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStop {
    /// The source ran out of pages
    Exhausted,
    /// Page limit or target count met
    LimitReached,
    /// A sink could not persist an outcome
    SinkFailure,
}

/// Everything a finished run reports.
#[derive(Debug)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stop: RunStop,
    pub pages_visited: u32,
    pub page_limit: Option<u32>,
    pub processed: usize,
    pub tally: BTreeMap<Outcome, usize>,
    pub sources: Vec<SourceReport>,
    pub sinks: Vec<SinkReport>,
    pub sink_failures: Vec<AppError>,
    pub source_error: Option<String>,
}

/// Serializable snapshot of a run, written next to the stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stop: RunStop,
    pub pages_visited: u32,
    pub processed: usize,
    pub outcomes: BTreeMap<String, usize>,
    pub rows_written: BTreeMap<String, usize>,
    pub sink_failures: Vec<String>,
    /// Keys routed this run that no store holds, per sink
    pub unwritten: BTreeMap<String, Vec<String>>,
}

impl RunSummary {
    /// Count for one outcome.
    pub fn count(&self, outcome: Outcome) -> usize {
        self.tally.get(&outcome).copied().unwrap_or(0)
    }

    /// Total records routed.
    pub fn routed(&self) -> usize {
        self.tally.values().sum()
    }

    /// Rows a sink appended this run.
    pub fn written(&self, sink: &str) -> usize {
        self.sinks
            .iter()
            .find(|r| r.name == sink)
            .map_or(0, |r| r.written)
    }

    /// Keys a failed sink never persisted, per sink.
    pub fn unwritten(&self) -> BTreeMap<String, Vec<String>> {
        self.sink_failures
            .iter()
            .filter_map(|e| match e {
                AppError::SinkFailed { category, keys, .. } => Some((category.clone(), keys.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            started_at: self.started_at,
            finished_at: self.finished_at,
            stop: self.stop,
            pages_visited: self.pages_visited,
            processed: self.processed,
            outcomes: self
                .tally
                .iter()
                .map(|(outcome, count)| (outcome.to_string(), *count))
                .collect(),
            rows_written: self
                .sinks
                .iter()
                .map(|r| (r.name.clone(), r.written))
                .collect(),
            sink_failures: self.sink_failures.iter().map(|e| e.to_string()).collect(),
            unwritten: self.unwritten(),
        }
    }

    /// Write [`RunStats`] as pretty JSON.
    pub async fn write_stats(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.stats())?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    /// Log the per-outcome tally.
    pub fn log(&self) {
        let mut items = vec![
            ("stopped".to_string(), format!("{:?}", self.stop)),
            ("pages visited".to_string(), self.pages_visited.to_string()),
        ];
        if let Some(limit) = self.page_limit {
            items.push(("page limit".to_string(), limit.to_string()));
        }
        items.push(("records routed".to_string(), self.routed().to_string()));
        for (outcome, count) in &self.tally {
            items.push((outcome.to_string(), count.to_string()));
        }
        for sink in &self.sinks {
            items.push((
                format!("{} rows", sink.name),
                format!("{} new, {} duplicate", sink.written, sink.duplicates),
            ));
        }
        report::summary("Run complete", &items);

        for failure in &self.sink_failures {
            log::error!("{}", failure);
        }
        for (sink, keys) in self.unwritten() {
            for key in keys {
                log::error!("Not recorded in '{}': {}", sink, key);
            }
        }
    }

    /// `Err` if the run must exit non-zero.
    ///
    /// That is any sink failure, or a source that failed before yielding a
    /// single page.
    pub fn into_result(mut self) -> Result<Self> {
        if !self.sink_failures.is_empty() {
            return Err(self.sink_failures.remove(0));
        }
        if self.pages_visited == 0 {
            if let Some(message) = self.source_error.take() {
                return Err(AppError::collaborator("listing source", message));
            }
        }
        Ok(self)
    }
}

/// One configured run over a single browsing session.
pub struct Pipeline {
    router: OutcomeRouter,
    policy: StopPolicy,
    skip_threshold: usize,
    ctx: RoutingContext,
    sources: Vec<SourceReport>,
}

impl Pipeline {
    /// Load identity sources and the company list, and open every sink.
    pub async fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        let policy = config.run.stop_policy()?;

        let (identity, sources) = IdentitySet::load(&IdentitySource::from_config(config)).await?;
        log::info!("{} known jobs across {} sources", identity.len(), sources.len());

        let companies = CompanyBlock::load(&config.storage.company_list_path()).await?;
        let sinks = SinkSet::open_local(&config.storage).await?;

        let ctx = RoutingContext {
            identity,
            companies,
            sinks,
        };
        let mut pipeline = Self::new(
            OutcomeRouter::from_config(&config.timeouts),
            policy,
            config.run.skip_threshold,
            ctx,
        );
        pipeline.sources = sources;
        Ok(pipeline)
    }

    /// Assemble a pipeline from already-built parts.
    pub fn new(
        router: OutcomeRouter,
        policy: StopPolicy,
        skip_threshold: usize,
        ctx: RoutingContext,
    ) -> Self {
        Self {
            router,
            policy,
            skip_threshold,
            ctx,
            sources: Vec::new(),
        }
    }

    /// Drive the source to a terminal state, then drain every sink.
    pub async fn run(mut self, source: &mut dyn JobSource, browser: &dyn JobBrowser) -> RunSummary {
        let started_at = Utc::now();
        let mut cursor = PageCursor::new(self.policy, self.skip_threshold);
        let mut tally: BTreeMap<Outcome, usize> = BTreeMap::new();
        let mut source_error = None;
        let mut sink_failed = false;
        let mut line_no = 0usize;

        report::header("Routing jobs");

        while cursor.state().wants_page() {
            let records = match source.next_page().await {
                Ok(Some(records)) => records,
                Ok(None) => {
                    log::info!("No more pages after {}", cursor.pages_visited());
                    cursor.exhaust();
                    break;
                }
                Err(e) => {
                    log::error!("Listing source failed: {}", e);
                    source_error = Some(e.to_string());
                    cursor.exhaust();
                    break;
                }
            };

            cursor.begin_page();
            log::debug!(
                "Page {}: {} records",
                cursor.pages_visited() + 1,
                records.len()
            );

            for record in &records {
                // Let sink workers catch up so a dead sink is seen before the
                // next live probe or apply.
                tokio::task::yield_now().await;
                if let Some(failure) = self.ctx.sinks.poll_failure() {
                    log::error!(
                        "Stopping: sink '{}' failed on {}: {}",
                        failure.sink,
                        failure.key,
                        failure.message
                    );
                    sink_failed = true;
                    break;
                }

                let outcome = match self.router.route(&mut self.ctx, record, browser).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        log::error!("Stopping: {}", e);
                        sink_failed = true;
                        break;
                    }
                };

                line_no += 1;
                let count = tally.entry(outcome).or_insert(0);
                *count += 1;
                log::info!("{} {} ({}) - {}", line_no, outcome, count, record.label());

                if !cursor.record(&outcome) {
                    break;
                }
            }

            if cursor.end_page() == CursorState::LimitReached && !sink_failed {
                log::info!("Stop limit reached after {} pages", cursor.pages_visited());
            }
            if sink_failed {
                break;
            }
        }

        let drain = self.ctx.sinks.close_all().await;

        let stop = if sink_failed || !drain.is_clean() {
            RunStop::SinkFailure
        } else if cursor.state() == CursorState::LimitReached {
            RunStop::LimitReached
        } else {
            RunStop::Exhausted
        };

        RunSummary {
            started_at,
            finished_at: Utc::now(),
            stop,
            pages_visited: cursor.pages_visited(),
            page_limit: cursor.page_limit(),
            processed: cursor.processed(),
            tally,
            sources: self.sources,
            sinks: drain.reports,
            sink_failures: drain.failures,
            source_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::models::{JobRecord, OutcomeCategory, ProbeResult, SourceLabel};
    use crate::pipeline::testing::{FakeBrowser, FakeSource, FlakyStore, MemoryStore, SharedRows};
    use crate::storage::CsvStore;
    use tempfile::TempDir;

    fn router() -> OutcomeRouter {
        OutcomeRouter::new(Duration::from_secs(1), Duration::from_secs(1))
    }

    async fn memory_context(identity: IdentitySet) -> (RoutingContext, BTreeMap<OutcomeCategory, SharedRows>) {
        let mut sinks = SinkSet::new();
        let mut rows = BTreeMap::new();
        for category in OutcomeCategory::ALL {
            let store = MemoryStore::default();
            rows.insert(category, store.rows());
            sinks.open_category(category, store).await.unwrap();
        }
        let ctx = RoutingContext {
            identity,
            companies: CompanyBlock::new(),
            sinks,
        };
        (ctx, rows)
    }

    #[tokio::test]
    async fn test_noisy_first_page_extends_run() {
        let mut identity = IdentitySet::new();
        let known: Vec<String> = (0..20).map(|i| format!("known-{i}")).collect();
        for key in &known {
            identity.insert(key, SourceLabel::AlreadyApplied);
        }
        let (ctx, _) = memory_context(identity).await;

        let page1: Vec<&str> = known.iter().map(String::as_str).collect();
        let mut source = FakeSource::from_keys(&[&page1, &["new-1"], &["new-2"], &["new-3"]]);
        let served = source.served();
        let browser = FakeBrowser::new();

        let summary = Pipeline::new(router(), StopPolicy::PageLimit(2), 20, ctx)
            .run(&mut source, &browser)
            .await;

        assert_eq!(summary.stop, RunStop::LimitReached);
        assert_eq!(summary.pages_visited, 3);
        assert_eq!(summary.page_limit, Some(3));
        assert_eq!(served.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert_eq!(summary.count(Outcome::AppliedSuccess), 2);
        assert_eq!(
            summary.count(Outcome::AlreadyKnownSkip(SourceLabel::AlreadyApplied)),
            20
        );
    }

    #[tokio::test]
    async fn test_exhausted_source_ends_cleanly() {
        let (ctx, rows) = memory_context(IdentitySet::new()).await;
        let mut source = FakeSource::from_keys(&[&["u1", "u2", "u1"]]);
        let browser = FakeBrowser::new().probe("u2", ProbeResult::Expired);

        let summary = Pipeline::new(router(), StopPolicy::PageLimit(10), 20, ctx)
            .run(&mut source, &browser)
            .await;

        assert_eq!(summary.stop, RunStop::Exhausted);
        assert_eq!(summary.count(Outcome::AppliedSuccess), 1);
        assert_eq!(summary.count(Outcome::Expired), 1);
        assert_eq!(summary.count(Outcome::AlreadyKnownSkip(SourceLabel::Success)), 1);
        assert_eq!(
            *rows[&OutcomeCategory::Success].lock().unwrap(),
            vec!["u1".to_string()]
        );
        assert!(summary.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_target_count_stops_before_page_ends() {
        let (ctx, _) = memory_context(IdentitySet::new()).await;
        let mut source = FakeSource::from_keys(&[&["a", "b", "c", "d"], &["e"]]);
        let browser = FakeBrowser::new();

        let summary = Pipeline::new(router(), StopPolicy::TargetCount(2), 20, ctx)
            .run(&mut source, &browser)
            .await;

        assert_eq!(summary.stop, RunStop::LimitReached);
        assert_eq!(summary.routed(), 2);
        assert_eq!(browser.apply_calls(), 2);
    }

    fn listing(keys: &[(&str, &str)]) -> Vec<JobRecord> {
        keys.iter()
            .map(|(url, company)| JobRecord::new(*url).with_company(*company))
            .collect()
    }

    #[tokio::test]
    async fn test_rerun_produces_no_new_applications() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.dir = tmp.path().to_path_buf();
        config.run.page_limit = Some(5);

        let pages = || {
            vec![
                listing(&[
                    ("https://example.com/job/1", "Globex"),
                    ("https://example.com/job/2", "Initech"),
                ]),
                listing(&[("https://example.com/job/3", "Acme")]),
            ]
        };
        let browser = FakeBrowser::new().probe("https://example.com/job/3", ProbeResult::CompanySite);

        let first = Pipeline::open(&config)
            .await
            .unwrap()
            .run(&mut FakeSource::new(pages()), &browser)
            .await;
        assert_eq!(first.count(Outcome::AppliedSuccess), 2);
        assert_eq!(first.count(Outcome::CompanySiteRedirect), 1);
        assert_eq!(first.written("success"), 2);
        assert_eq!(first.written("company-list"), 1);

        // A new posting from the redirecting company shows up on the rerun.
        let mut second_pages = pages();
        second_pages.push(listing(&[("https://example.com/job/4", " acme ")]));

        let second = Pipeline::open(&config)
            .await
            .unwrap()
            .run(&mut FakeSource::new(second_pages), &browser)
            .await;
        assert_eq!(second.count(Outcome::AppliedSuccess), 0);
        assert_eq!(second.count(Outcome::AlreadyKnownSkip(SourceLabel::Success)), 2);
        assert_eq!(second.count(Outcome::CompanyBlockSkip), 2);
        assert_eq!(second.written("success"), 0);
        assert_eq!(second.written("company-site"), 1);
        assert_eq!(browser.apply_calls(), 2);
        assert_eq!(browser.probe_calls(), 3);

        let success = tokio::fs::read_to_string(tmp.path().join("success_applied.csv"))
            .await
            .unwrap();
        assert_eq!(
            success,
            "URL\nhttps://example.com/job/1\nhttps://example.com/job/2\n"
        );
        let companies = tokio::fs::read_to_string(tmp.path().join("company_list.csv"))
            .await
            .unwrap();
        assert_eq!(companies, "Company Name\nAcme\n");
    }

    #[tokio::test]
    async fn test_dead_sink_stops_live_actions() {
        let mut sinks = SinkSet::new();
        sinks
            .open_category(OutcomeCategory::Success, FlakyStore::always_failing())
            .await
            .unwrap();
        let ctx = RoutingContext {
            identity: IdentitySet::new(),
            companies: CompanyBlock::new(),
            sinks,
        };
        let mut source = FakeSource::from_keys(&[&["s1", "s2", "s3"]]);
        let browser = FakeBrowser::new();

        let summary = Pipeline::new(router(), StopPolicy::PageLimit(5), 20, ctx)
            .run(&mut source, &browser)
            .await;

        assert_eq!(browser.apply_calls(), 1);
        assert_eq!(summary.stop, RunStop::SinkFailure);
        assert_eq!(summary.pages_visited, 1);
        assert_eq!(summary.routed(), 1);
        assert_eq!(
            summary.unwritten().get("success"),
            Some(&vec!["s1".to_string()])
        );
        assert_eq!(summary.stats().unwritten.len(), 1);
    }

    #[tokio::test]
    async fn test_sink_failure_drains_others_and_fails_run() {
        let tmp = TempDir::new().unwrap();
        let mut sinks = SinkSet::new();
        sinks
            .open_category(OutcomeCategory::Success, FlakyStore::always_failing())
            .await
            .unwrap();
        let expired_path = tmp.path().join("expired.csv");
        sinks
            .open_category(OutcomeCategory::Expired, CsvStore::new(&expired_path))
            .await
            .unwrap();

        let ctx = RoutingContext {
            identity: IdentitySet::new(),
            companies: CompanyBlock::new(),
            sinks,
        };

        let expired: Vec<String> = (0..30).map(|i| format!("e{i}")).collect();
        let mut browser = FakeBrowser::new();
        for key in &expired {
            browser = browser.probe(key, ProbeResult::Expired);
        }
        let mut page: Vec<JobRecord> = expired.iter().map(|k| JobRecord::new(k)).collect();
        page.push(JobRecord::new("s1"));
        let mut source = FakeSource::new(vec![page]);

        let summary = Pipeline::new(router(), StopPolicy::PageLimit(1), 20, ctx)
            .run(&mut source, &browser)
            .await;

        assert_eq!(summary.stop, RunStop::SinkFailure);
        assert_eq!(summary.sink_failures.len(), 1);
        assert_eq!(summary.pages_visited, 1);
        assert_eq!(summary.written("expired"), 30);
        assert_eq!(summary.unwritten().get("success"), Some(&vec!["s1".to_string()]));

        let content = tokio::fs::read_to_string(&expired_path).await.unwrap();
        assert_eq!(content.lines().count(), 31);
        assert!(matches!(
            summary.into_result(),
            Err(AppError::SinkFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_stats_serialize() {
        let (ctx, _) = memory_context(IdentitySet::new()).await;
        let mut source = FakeSource::from_keys(&[&["u1"]]);
        let summary = Pipeline::new(router(), StopPolicy::PageLimit(1), 20, ctx)
            .run(&mut source, &FakeBrowser::new())
            .await;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run_stats.json");
        summary.write_stats(&path).await.unwrap();

        let stats: RunStats =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(stats.stop, RunStop::LimitReached);
        assert_eq!(stats.outcomes.get("applied"), Some(&1));
        assert_eq!(stats.rows_written.get("success"), Some(&1));
    }
}
