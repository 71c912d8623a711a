//! Per-record classification and outcome routing.

use std::time::Duration;

use tokio::time::timeout;

use crate::error::{AppError, Result};
use crate::models::{ApplyResult, JobRecord, Outcome, ProbeResult, TimeoutConfig};
use crate::pipeline::identity::{CompanyBlock, IdentitySet};
use crate::pipeline::sink::SinkSet;
use crate::services::JobBrowser;

/// State shared by every routing decision in a run.
pub struct RoutingContext {
    pub identity: IdentitySet,
    pub companies: CompanyBlock,
    pub sinks: SinkSet,
}

/// Classifies records and records each classification.
#[derive(Debug, Clone)]
pub struct OutcomeRouter {
    probe_timeout: Duration,
    apply_timeout: Duration,
}

impl OutcomeRouter {
    pub fn new(probe_timeout: Duration, apply_timeout: Duration) -> Self {
        Self {
            probe_timeout,
            apply_timeout,
        }
    }

    pub fn from_config(timeouts: &TimeoutConfig) -> Self {
        Self::new(timeouts.probe(), timeouts.apply())
    }

    /// Classify `record` and persist the result before returning.
    ///
    /// The identity index and the sink queue are both updated before this
    /// returns, so a crash after it never re-processes the record. The only
    /// error is a sink that can no longer accept keys.
    pub async fn route(
        &self,
        ctx: &mut RoutingContext,
        record: &JobRecord,
        browser: &dyn JobBrowser,
    ) -> Result<Outcome> {
        let outcome = self.classify(ctx, record, browser).await;
        self.commit(ctx, record, outcome)?;
        Ok(outcome)
    }

    /// Decide the outcome for one record. Never fails: collaborator errors
    /// and timeouts become [`Outcome::RequiresManualApply`].
    pub async fn classify(
        &self,
        ctx: &RoutingContext,
        record: &JobRecord,
        browser: &dyn JobBrowser,
    ) -> Outcome {
        if record
            .company_name()
            .is_some_and(|name| ctx.companies.contains(name))
        {
            return Outcome::CompanyBlockSkip;
        }

        if let Some(label) = ctx.identity.label_of(record.key()) {
            return Outcome::AlreadyKnownSkip(label);
        }

        let probe = match timeout(self.probe_timeout, browser.probe(record)).await {
            Ok(Ok(probe)) => probe,
            Ok(Err(e)) => {
                log::warn!("Probe failed for {}: {}", record.key(), e);
                return Outcome::RequiresManualApply;
            }
            Err(_) => {
                let e = AppError::timeout(format!("probe {}", record.key()), self.probe_timeout.as_secs());
                log::warn!("{}", e);
                return Outcome::RequiresManualApply;
            }
        };

        match probe {
            ProbeResult::Expired => Outcome::Expired,
            ProbeResult::AlreadyApplied => Outcome::AlreadyAppliedOnSite,
            ProbeResult::CompanySite => Outcome::CompanySiteRedirect,
            ProbeResult::Actionable => self.apply(record, browser).await,
        }
    }

    async fn apply(&self, record: &JobRecord, browser: &dyn JobBrowser) -> Outcome {
        match timeout(self.apply_timeout, browser.apply(record)).await {
            Ok(Ok(ApplyResult::Success)) => Outcome::AppliedSuccess,
            Ok(Ok(result)) => {
                log::warn!("Apply for {} ended with {:?}", record.key(), result);
                Outcome::RequiresManualApply
            }
            Ok(Err(e)) => {
                log::warn!("Apply failed for {}: {}", record.key(), e);
                Outcome::RequiresManualApply
            }
            Err(_) => {
                let e = AppError::timeout(format!("apply {}", record.key()), self.apply_timeout.as_secs());
                log::warn!("{}", e);
                Outcome::RequiresManualApply
            }
        }
    }

    /// Update the identity index, company block and sinks for `outcome`.
    pub fn commit(
        &self,
        ctx: &mut RoutingContext,
        record: &JobRecord,
        outcome: Outcome,
    ) -> Result<()> {
        let Some(category) = outcome.category() else {
            return Ok(());
        };

        ctx.identity.insert(record.key(), category.source_label());
        ctx.sinks.enqueue(category, record.key())?;

        if outcome == Outcome::CompanySiteRedirect {
            if let Some(name) = record.company_name() {
                if ctx.companies.insert(name) {
                    ctx.sinks.enqueue_company(name)?;
                }
            }
        }
        Ok(())
    }
}
