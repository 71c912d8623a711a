// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::BridgeConfig;

/// Create a configured asynchronous HTTP client for the session bridge.
pub fn create_client(config: &BridgeConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Join an endpoint path onto the bridge base URL.
pub fn endpoint(base_url: &str, path: &str) -> Result<url::Url> {
    let base = url::Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;
    Ok(base.join(path.trim_start_matches('/'))?)
}
