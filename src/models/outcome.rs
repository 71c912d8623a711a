//! Source labels, outcome categories and routing outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Named list that first established a key's status.
///
/// The set is fixed; priority between them is decided by the configured
/// source order, not by this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceLabel {
    AlreadyApplied,
    CompanySite,
    ManualRequired,
    Expired,
    Success,
    InProgressOutput,
}

impl SourceLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceLabel::AlreadyApplied => "already-applied",
            SourceLabel::CompanySite => "company-site",
            SourceLabel::ManualRequired => "manual-required",
            SourceLabel::Expired => "expired",
            SourceLabel::Success => "success",
            SourceLabel::InProgressOutput => "in-progress-output",
        }
    }
}

impl fmt::Display for SourceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted outcome bucket. Each one is backed by exactly one sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeCategory {
    Expired,
    AlreadyApplied,
    CompanySite,
    Success,
    ManualRequired,
}

impl OutcomeCategory {
    pub const ALL: [OutcomeCategory; 5] = [
        OutcomeCategory::Expired,
        OutcomeCategory::AlreadyApplied,
        OutcomeCategory::CompanySite,
        OutcomeCategory::Success,
        OutcomeCategory::ManualRequired,
    ];

    /// Label recorded in the identity index for keys routed here.
    pub fn source_label(&self) -> SourceLabel {
        match self {
            OutcomeCategory::Expired => SourceLabel::Expired,
            OutcomeCategory::AlreadyApplied => SourceLabel::AlreadyApplied,
            OutcomeCategory::CompanySite => SourceLabel::CompanySite,
            OutcomeCategory::Success => SourceLabel::Success,
            OutcomeCategory::ManualRequired => SourceLabel::ManualRequired,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.source_label().as_str()
    }
}

impl fmt::Display for OutcomeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one observed job. Exactly one per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Outcome {
    /// Key already in the identity index; carries the label that put it there
    AlreadyKnownSkip(SourceLabel),
    /// Company previously redirected to its own site
    CompanyBlockSkip,
    Expired,
    AlreadyAppliedOnSite,
    CompanySiteRedirect,
    AppliedSuccess,
    RequiresManualApply,
}

impl Outcome {
    /// Sink this outcome is persisted to, if any.
    pub fn category(&self) -> Option<OutcomeCategory> {
        match self {
            Outcome::AlreadyKnownSkip(_) => None,
            Outcome::CompanyBlockSkip | Outcome::CompanySiteRedirect => {
                Some(OutcomeCategory::CompanySite)
            }
            Outcome::Expired => Some(OutcomeCategory::Expired),
            Outcome::AlreadyAppliedOnSite => Some(OutcomeCategory::AlreadyApplied),
            Outcome::AppliedSuccess => Some(OutcomeCategory::Success),
            Outcome::RequiresManualApply => Some(OutcomeCategory::ManualRequired),
        }
    }

    /// Skips never reach the live session; they count toward page noise.
    pub fn is_skip(&self) -> bool {
        matches!(self, Outcome::AlreadyKnownSkip(_) | Outcome::CompanyBlockSkip)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::AlreadyKnownSkip(label) => write!(f, "already known ({label})"),
            Outcome::CompanyBlockSkip => f.write_str("company blocked"),
            Outcome::Expired => f.write_str("expired"),
            Outcome::AlreadyAppliedOnSite => f.write_str("already applied on site"),
            Outcome::CompanySiteRedirect => f.write_str("company site"),
            Outcome::AppliedSuccess => f.write_str("applied"),
            Outcome::RequiresManualApply => f.write_str("manual apply required"),
        }
    }
}

/// Current state of a posting as read by the live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeResult {
    Expired,
    AlreadyApplied,
    CompanySite,
    Actionable,
}

/// Result of an apply attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyResult {
    Success,
    Timeout,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_outcomes_have_expected_categories() {
        assert!(Outcome::AlreadyKnownSkip(SourceLabel::Success).is_skip());
        assert_eq!(Outcome::AlreadyKnownSkip(SourceLabel::Success).category(), None);
        assert!(Outcome::CompanyBlockSkip.is_skip());
        assert_eq!(
            Outcome::CompanyBlockSkip.category(),
            Some(OutcomeCategory::CompanySite)
        );
        assert!(!Outcome::RequiresManualApply.is_skip());
    }

    #[test]
    fn test_source_label_serde_names() {
        let label: SourceLabel = serde_json::from_str("\"in-progress-output\"").unwrap();
        assert_eq!(label, SourceLabel::InProgressOutput);
        assert_eq!(label.to_string(), "in-progress-output");
    }

    #[test]
    fn test_probe_result_wire_names() {
        let probe: ProbeResult = serde_json::from_str("\"company_site\"").unwrap();
        assert_eq!(probe, ProbeResult::CompanySite);
    }
}
