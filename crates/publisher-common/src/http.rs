//! HTTP metadata client backed by reqwest.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::traits::{MetadataClient, MetadataResponse};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches metadata documents over HTTP with a bounded per-request timeout.
///
/// Retries live in the orchestrator, not here: a timeout or non-200 is
/// reported as-is and the caller re-submits the task.
pub struct HttpMetadataClient {
    client: reqwest::Client,
}

impl HttpMetadataClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MetadataClient for HttpMetadataClient {
    async fn get(&self, url: &str) -> Result<MetadataResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed to read body from {url}"))?;

        Ok(MetadataResponse { status, body })
    }
}
