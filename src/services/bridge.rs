// src/services/bridge.rs

//! HTTP client for the browser session bridge.
//!
//! The bridge owns the authenticated browser. Every call is a JSON POST:
//!
//! | endpoint   | request                 | response                          |
//! |------------|-------------------------|-----------------------------------|
//! | `/probe`   | `{"url"}`               | `{"state": "expired" \| ...}`     |
//! | `/apply`   | `{"url"}`               | `{"status": "success" \| ...}`    |
//! | `/listing` | `{"location", "page"}`  | `{"jobs": [...]}` or `{"jobs": null}` |

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{ApplyResult, BridgeConfig, JobRecord, ProbeResult};
use crate::services::{JobBrowser, JobSource};
use crate::utils::http;

#[derive(Debug, Serialize)]
struct UrlRequest<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct ListingRequest<'a> {
    location: &'a str,
    page: u32,
}

#[derive(Debug, Deserialize)]
struct ProbeResponse {
    state: ProbeResult,
}

#[derive(Debug, Deserialize)]
struct ApplyResponse {
    status: ApplyResult,
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    #[serde(default)]
    jobs: Option<Vec<JobRecord>>,
}

/// Browser session reached over HTTP.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    client: Client,
    base_url: String,
}

impl BridgeClient {
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_client(config)?,
            base_url: config.base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = http::endpoint(&self.base_url, path)?;
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::collaborator(format!("bridge {}", path), e))?;
        Ok(response.json::<T>().await?)
    }

    /// Fetch one listing page. `None` once the bridge has no more results.
    pub async fn listing(&self, location: &str, page: u32) -> Result<Option<Vec<JobRecord>>> {
        let response: ListingResponse = self
            .post("listing", &ListingRequest { location, page })
            .await?;
        Ok(response.jobs.map(|jobs| {
            jobs.into_iter()
                .map(JobRecord::canonicalize)
                .filter(|job| !job.key().is_empty())
                .collect()
        }))
    }
}

#[async_trait]
impl JobBrowser for BridgeClient {
    async fn probe(&self, record: &JobRecord) -> Result<ProbeResult> {
        let response: ProbeResponse = self
            .post("probe", &UrlRequest { url: record.key() })
            .await?;
        Ok(response.state)
    }

    async fn apply(&self, record: &JobRecord) -> Result<ApplyResult> {
        let response: ApplyResponse = self
            .post("apply", &UrlRequest { url: record.key() })
            .await?;
        Ok(response.status)
    }
}

/// Listing pages for one location, served by the bridge.
///
/// An empty page also ends the listing.
#[derive(Debug)]
pub struct BridgeListing {
    client: BridgeClient,
    location: String,
    next: u32,
}

impl BridgeListing {
    pub fn new(client: BridgeClient, location: impl Into<String>) -> Self {
        Self {
            client,
            location: location.into(),
            next: 1,
        }
    }
}

#[async_trait]
impl JobSource for BridgeListing {
    async fn next_page(&mut self) -> Result<Option<Vec<JobRecord>>> {
        let page = self.next;
        let jobs = self.client.listing(&self.location, page).await?;
        self.next += 1;
        Ok(jobs.filter(|jobs| !jobs.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_response_states() {
        let cases = [
            ("expired", ProbeResult::Expired),
            ("already_applied", ProbeResult::AlreadyApplied),
            ("company_site", ProbeResult::CompanySite),
            ("actionable", ProbeResult::Actionable),
        ];
        for (state, expected) in cases {
            let json = format!(r#"{{"state":"{state}"}}"#);
            let response: ProbeResponse = serde_json::from_str(&json).unwrap();
            assert_eq!(response.state, expected);
        }
        assert!(serde_json::from_str::<ProbeResponse>(r#"{"state":"unknown"}"#).is_err());
    }

    #[test]
    fn test_apply_response_status() {
        let response: ApplyResponse = serde_json::from_str(r#"{"status":"timeout"}"#).unwrap();
        assert_eq!(response.status, ApplyResult::Timeout);
    }

    #[test]
    fn test_listing_response_null_and_jobs() {
        let done: ListingResponse = serde_json::from_str(r#"{"jobs":null}"#).unwrap();
        assert!(done.jobs.is_none());

        let page: ListingResponse = serde_json::from_str(
            r#"{"jobs":[{"url":" https://example.com/job/1#top ","company":"Acme"}]}"#,
        )
        .unwrap();
        let jobs = page.jobs.unwrap();
        let job = jobs[0].clone().canonicalize();
        assert_eq!(job.key(), "https://example.com/job/1");
        assert_eq!(job.company_name(), Some("Acme"));
    }

    #[test]
    fn test_request_shapes() {
        let body = serde_json::to_value(ListingRequest {
            location: "Pune",
            page: 3,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"location": "Pune", "page": 3}));

        let body = serde_json::to_value(UrlRequest { url: "https://x/1" }).unwrap();
        assert_eq!(body, serde_json::json!({"url": "https://x/1"}));
    }

    #[test]
    fn test_client_keeps_base_url() {
        let client = BridgeClient::new(&BridgeConfig::default()).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:4780");
    }
}
