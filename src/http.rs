//! HTTP plumbing shared by the embedding and chat providers.
//!
//! Each provider supplies the [`Error`] constructor its failures map to, so
//! the same transport code yields `EmbeddingService` for embedders and
//! `Generation` for chat models.

use std::time::Duration;

use anyhow::Context;

use easyserve_core::{Error, Result};

/// Build a client whose every request is bounded by `timeout_secs`.
pub fn client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Read the API key from the configured (or default) environment variable.
pub fn api_key(api_key_env: Option<&str>, default_env: &str) -> anyhow::Result<String> {
    let var = api_key_env.unwrap_or(default_env);
    std::env::var(var).with_context(|| format!("{} environment variable not set", var))
}

/// Send one request and decode a JSON body. Transport errors, non-2xx
/// statuses and undecodable bodies all go through `map_err`.
pub async fn send_json(
    provider: &str,
    request: reqwest::RequestBuilder,
    map_err: impl Fn(String) -> Error,
) -> Result<serde_json::Value> {
    let response = request
        .send()
        .await
        .map_err(|e| map_err(format!("{} request failed: {}", provider, e)))?;
    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(map_err(format!(
            "{} API error {}: {}",
            provider, status, body_text
        )));
    }
    response
        .json()
        .await
        .map_err(|e| map_err(format!("{} returned invalid JSON: {}", provider, e)))
}
