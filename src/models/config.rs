//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{OutcomeCategory, SourceLabel};
use crate::pipeline::StopPolicy;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Stop policy and pagination behavior
    #[serde(default)]
    pub run: RunConfig,

    /// Bounded waits on the live session
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Store directory and output file names
    #[serde(default)]
    pub storage: StorageConfig,

    /// Identity sources in priority order (first wins)
    #[serde(default = "defaults::sources")]
    pub sources: Vec<SourceConfig>,

    /// Session bridge connection settings
    #[serde(default)]
    pub bridge: BridgeConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        self.run.stop_policy()?;
        if self.run.skip_threshold == 0 {
            return Err(AppError::validation("run.skip_threshold must be > 0"));
        }
        if self.run.page_size == 0 {
            return Err(AppError::validation("run.page_size must be > 0"));
        }
        if self.timeouts.probe_secs == 0 {
            return Err(AppError::validation("timeouts.probe_secs must be > 0"));
        }
        if self.timeouts.apply_secs == 0 {
            return Err(AppError::validation("timeouts.apply_secs must be > 0"));
        }
        if self.bridge.user_agent.trim().is_empty() {
            return Err(AppError::validation("bridge.user_agent is empty"));
        }
        if self.bridge.timeout_secs == 0 {
            return Err(AppError::validation("bridge.timeout_secs must be > 0"));
        }
        for source in &self.sources {
            if source.path.as_os_str().is_empty() {
                return Err(AppError::validation(format!(
                    "source '{}' has an empty path",
                    source.label
                )));
            }
        }
        Ok(())
    }

    /// Resolve a store path against the storage directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.storage.dir.join(path)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            timeouts: TimeoutConfig::default(),
            storage: StorageConfig::default(),
            sources: defaults::sources(),
            bridge: BridgeConfig::default(),
        }
    }
}

/// Stop policy and pagination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Stop once this many records were processed (exclusive with `page_limit`)
    #[serde(default)]
    pub target_count: Option<usize>,

    /// Stop after this many pages (exclusive with `target_count`)
    #[serde(default)]
    pub page_limit: Option<u32>,

    /// A page with at least this many skips does not count against the page limit
    #[serde(default = "defaults::skip_threshold")]
    pub skip_threshold: usize,

    /// Records per page when paging a listing file
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,
}

impl RunConfig {
    /// Resolve the configured stop policy.
    ///
    /// With neither option set a single page is visited.
    pub fn stop_policy(&self) -> Result<StopPolicy> {
        match (self.target_count, self.page_limit) {
            (Some(_), Some(_)) => Err(AppError::validation(
                "run.target_count and run.page_limit are mutually exclusive",
            )),
            (Some(0), None) => Err(AppError::validation("run.target_count must be > 0")),
            (None, Some(0)) => Err(AppError::validation("run.page_limit must be > 0")),
            (Some(target), None) => Ok(StopPolicy::TargetCount(target)),
            (None, Some(pages)) => Ok(StopPolicy::PageLimit(pages)),
            (None, None) => Ok(StopPolicy::PageLimit(defaults::page_limit())),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target_count: None,
            page_limit: None,
            skip_threshold: defaults::skip_threshold(),
            page_size: defaults::page_size(),
        }
    }
}

/// Upper bounds on each wait against the live session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "defaults::probe_secs")]
    pub probe_secs: u64,

    #[serde(default = "defaults::apply_secs")]
    pub apply_secs: u64,
}

impl TimeoutConfig {
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn apply(&self) -> Duration {
        Duration::from_secs(self.apply_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            probe_secs: defaults::probe_secs(),
            apply_secs: defaults::apply_secs(),
        }
    }
}

/// Store directory and the output table for each outcome category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding every persisted table
    #[serde(default = "defaults::storage_dir")]
    pub dir: PathBuf,

    #[serde(default = "defaults::expired_file")]
    pub expired: String,

    #[serde(default = "defaults::already_applied_file")]
    pub already_applied: String,

    #[serde(default = "defaults::company_site_file")]
    pub company_site: String,

    #[serde(default = "defaults::success_file")]
    pub success: String,

    #[serde(default = "defaults::manual_required_file")]
    pub manual_required: String,

    /// Company names that redirect to their own site
    #[serde(default = "defaults::company_list_file")]
    pub company_list: String,
}

impl StorageConfig {
    /// Output table for a category.
    pub fn output_path(&self, category: OutcomeCategory) -> PathBuf {
        let file = match category {
            OutcomeCategory::Expired => &self.expired,
            OutcomeCategory::AlreadyApplied => &self.already_applied,
            OutcomeCategory::CompanySite => &self.company_site,
            OutcomeCategory::Success => &self.success,
            OutcomeCategory::ManualRequired => &self.manual_required,
        };
        self.dir.join(file)
    }

    pub fn company_list_path(&self) -> PathBuf {
        self.dir.join(&self.company_list)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: defaults::storage_dir(),
            expired: defaults::expired_file(),
            already_applied: defaults::already_applied_file(),
            company_site: defaults::company_site_file(),
            success: defaults::success_file(),
            manual_required: defaults::manual_required_file(),
            company_list: defaults::company_list_file(),
        }
    }
}

/// One identity source. Column `key_column` of every data row is the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Table path, relative to the storage directory unless absolute
    pub path: PathBuf,

    /// Label recorded for keys first seen in this source
    pub label: SourceLabel,

    #[serde(default)]
    pub key_column: usize,

    /// Fail setup when the table is missing
    #[serde(default)]
    pub required: bool,
}

/// Session bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "defaults::bridge_url")]
    pub base_url: String,

    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Transport-level timeout for bridge requests
    #[serde(default = "defaults::bridge_timeout")]
    pub timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::bridge_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::bridge_timeout(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::SourceConfig;
    use crate::models::SourceLabel;

    // Run defaults
    pub fn skip_threshold() -> usize {
        20
    }
    pub fn page_size() -> usize {
        20
    }
    pub fn page_limit() -> u32 {
        1
    }

    // Timeout defaults
    pub fn probe_secs() -> u64 {
        10
    }
    pub fn apply_secs() -> u64 {
        10
    }

    // Storage defaults
    pub fn storage_dir() -> PathBuf {
        PathBuf::from("Already_applied_folder")
    }
    pub fn expired_file() -> String {
        "expired_jobs.csv".into()
    }
    pub fn already_applied_file() -> String {
        "already_applied.csv".into()
    }
    pub fn company_site_file() -> String {
        "company_sites.csv".into()
    }
    pub fn success_file() -> String {
        "success_applied.csv".into()
    }
    pub fn manual_required_file() -> String {
        "do_manually_apply.csv".into()
    }
    pub fn company_list_file() -> String {
        "company_list.csv".into()
    }

    /// Curated lists first, then freshly derived classifications.
    pub fn sources() -> Vec<SourceConfig> {
        [
            (already_applied_file(), SourceLabel::AlreadyApplied),
            (company_site_file(), SourceLabel::CompanySite),
            (manual_required_file(), SourceLabel::ManualRequired),
            (expired_file(), SourceLabel::Expired),
            (success_file(), SourceLabel::Success),
        ]
        .into_iter()
        .map(|(file, label)| SourceConfig {
            path: PathBuf::from(file),
            label,
            key_column: 0,
            required: false,
        })
        .collect()
    }

    // Bridge defaults
    pub fn bridge_url() -> String {
        "http://127.0.0.1:4780".into()
    }
    pub fn user_agent() -> String {
        "job-router/0.1".into()
    }
    pub fn bridge_timeout() -> u64 {
        30
    }
}
