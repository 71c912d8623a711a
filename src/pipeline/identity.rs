//! Already-seen index merged from every persisted source.
//!
//! Sources are read once at startup in priority order. The first source to
//! mention a key owns its label; later sources only confirm the key is known.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::models::{Config, SourceLabel};
use crate::storage::{read_table, table};
use crate::utils::url::canonical_key;

/// One input table for the identity index.
#[derive(Debug, Clone)]
pub struct IdentitySource {
    pub path: PathBuf,
    pub label: SourceLabel,
    pub key_column: usize,
    pub required: bool,
}

impl IdentitySource {
    pub fn new(path: impl Into<PathBuf>, label: SourceLabel) -> Self {
        Self {
            path: path.into(),
            label,
            key_column: 0,
            required: false,
        }
    }

    /// Configured sources with paths resolved, in priority order.
    pub fn from_config(config: &Config) -> Vec<Self> {
        config
            .sources
            .iter()
            .map(|source| Self {
                path: config.resolve(&source.path),
                label: source.label,
                key_column: source.key_column,
                required: source.required,
            })
            .collect()
    }
}

/// Per-source load statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub label: SourceLabel,
    pub path: PathBuf,
    pub found: bool,
    pub rows: usize,
    /// Keys this source introduced
    pub inserted: usize,
    /// Keys already owned by a higher-priority source
    pub shadowed: usize,
    /// Rows without a key in the configured column
    pub malformed: usize,
}

/// Key → source label index. First writer wins.
#[derive(Debug, Clone, Default)]
pub struct IdentitySet {
    entries: HashMap<String, SourceLabel>,
}

impl IdentitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from `sources`, earliest first.
    ///
    /// A missing or empty table contributes zero entries unless the source is
    /// marked required, in which case setup fails.
    pub async fn load(sources: &[IdentitySource]) -> Result<(Self, Vec<SourceReport>)> {
        let mut set = Self::new();
        let mut reports = Vec::with_capacity(sources.len());

        for source in sources {
            let mut report = SourceReport {
                label: source.label,
                path: source.path.clone(),
                found: false,
                rows: 0,
                inserted: 0,
                shadowed: 0,
                malformed: 0,
            };

            let Some(table) = read_table(&source.path).await? else {
                if source.required {
                    return Err(AppError::config(format!(
                        "required source '{}' not found at {}",
                        source.label,
                        source.path.display()
                    )));
                }
                log::debug!(
                    "Source '{}' not found at {}, treating as empty",
                    source.label,
                    source.path.display()
                );
                reports.push(report);
                continue;
            };

            report.found = true;
            report.rows = table.rows.len();
            for (index, row) in table.rows.iter().enumerate() {
                match table::field(row, source.key_column) {
                    Some(key) => {
                        if set.insert(key, source.label) {
                            report.inserted += 1;
                        } else {
                            report.shadowed += 1;
                        }
                    }
                    None => {
                        report.malformed += 1;
                        log::warn!(
                            "Skipping malformed row {} in {} (no column {})",
                            index + 2,
                            source.path.display(),
                            source.key_column
                        );
                    }
                }
            }

            log::info!(
                "Loaded source '{}': {} new keys, {} shadowed, {} malformed",
                source.label,
                report.inserted,
                report.shadowed,
                report.malformed
            );
            reports.push(report);
        }

        Ok((set, reports))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&canonical_key(key))
    }

    pub fn label_of(&self, key: &str) -> Option<SourceLabel> {
        self.entries.get(&canonical_key(key)).copied()
    }

    /// Record `key` under `label`. No-op returning `false` if already known.
    pub fn insert(&mut self, key: &str, label: SourceLabel) -> bool {
        let key = canonical_key(key);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, label);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Company names whose postings redirect to the company's own site.
///
/// Grows during a run, never shrinks.
#[derive(Debug, Clone, Default)]
pub struct CompanyBlock {
    names: HashSet<String>,
}

impl CompanyBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load names from column 0 of a headered table; missing means empty.
    pub async fn load(path: &std::path::Path) -> Result<Self> {
        let mut block = Self::new();
        if let Some(table) = read_table(path).await? {
            for row in &table.rows {
                if let Some(name) = table::field(row, 0) {
                    block.insert(name);
                }
            }
        }
        log::info!("Loaded {} blocked companies", block.len());
        Ok(block)
    }

    fn normalize(name: &str) -> String {
        name.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&Self::normalize(name))
    }

    /// Returns `true` if the name was not blocked before.
    pub fn insert(&mut self, name: &str) -> bool {
        self.names.insert(Self::normalize(name))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
