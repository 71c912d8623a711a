//! Job record data structure.

use serde::{Deserialize, Serialize};

use crate::utils::url::canonical_key;

/// A job posting observed on a listing page.
///
/// Only `url` is required; it is the natural key. Two records with the same
/// key are the same job even if their descriptive fields differ.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobRecord {
    /// Canonical URL of the posting
    pub url: String,

    /// Company display name
    #[serde(default)]
    pub company: Option<String>,

    /// Experience requirement as shown on the listing
    #[serde(default)]
    pub experience: Option<String>,

    /// Location text
    #[serde(default)]
    pub location: Option<String>,

    /// Display title
    #[serde(default)]
    pub title: Option<String>,
}

impl JobRecord {
    /// Create a record with only the identity key set.
    pub fn new(url: impl AsRef<str>) -> Self {
        Self {
            url: canonical_key(url.as_ref()),
            company: None,
            experience: None,
            location: None,
            title: None,
        }
    }

    /// Builder-style company setter.
    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    /// Builder-style title setter.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Identity key of this record.
    pub fn key(&self) -> &str {
        &self.url
    }

    /// Trimmed company name, if it carries one worth matching on.
    ///
    /// Listings print "Not Available" when the company is hidden; those never
    /// take part in company blocking.
    pub fn company_name(&self) -> Option<&str> {
        self.company
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty() && !name.eq_ignore_ascii_case("not available"))
    }

    /// Re-apply key canonicalisation, e.g. after deserializing from a bridge.
    pub fn canonicalize(mut self) -> Self {
        self.url = canonical_key(&self.url);
        self
    }

    /// Short human label for log lines.
    pub fn label(&self) -> &str {
        self.title
            .as_deref()
            .or(self.company_name())
            .unwrap_or(&self.url)
    }
}
