//! Store API client
//!
//! Delivers one batch of labelled samples per request to
//! `POST {base_url}/processed_agent_data/`.
//!
//! Delivery is best effort: a failed request is logged and reported as
//! `false`, never retried or buffered. The batch is reversed before it goes on
//! the wire, so the store receives the newest sample first.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use roadwatch_core::ProcessedAgentData;

use crate::error::{Error, Result};

/// Request timeout applied when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Destination for labelled batches
#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// Save a batch; `true` once the store has acknowledged it
    async fn save_data(&self, batch: Vec<ProcessedAgentData>) -> bool;
}

/// HTTP client for the Roadwatch store API
pub struct StoreApiAdapter {
    /// Base URL (e.g., "http://localhost:8000")
    base_url: String,

    /// Reqwest HTTP client
    client: reqwest::Client,
}

impl StoreApiAdapter {
    /// Create an adapter with the default request timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create an adapter whose requests give up after `timeout`
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();

        if base_url.is_empty() {
            return Err(Error::ConnectionError(
                "Store API base_url cannot be empty".to_string(),
            ));
        }

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::ConnectionError(format!(
                "Store API base_url must start with http:// or https://, got: {}",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::ConnectionError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Ingestion endpoint URL
    pub fn endpoint(&self) -> String {
        format!("{}/processed_agent_data/", self.base_url)
    }

    async fn post_batch(&self, batch: &[ProcessedAgentData]) -> Result<()> {
        let body = serde_json::to_vec(batch)?;

        self.client
            .post(self.endpoint())
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, "roadwatch-agent/1.0")
            .body(body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

#[async_trait]
impl StoreGateway for StoreApiAdapter {
    async fn save_data(&self, mut batch: Vec<ProcessedAgentData>) -> bool {
        if batch.is_empty() {
            tracing::warn!(url = %self.endpoint(), "Refusing to send an empty batch");
            return false;
        }

        batch.reverse();

        match self.post_batch(&batch).await {
            Ok(()) => {
                tracing::debug!(
                    url = %self.endpoint(),
                    records = batch.len(),
                    "Batch delivered to store API"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    url = %self.endpoint(),
                    records = batch.len(),
                    error = %e,
                    "Error while saving data to the store API"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_base_url() {
        assert!(matches!(
            StoreApiAdapter::new(""),
            Err(Error::ConnectionError(_))
        ));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let err = StoreApiAdapter::new("ftp://store").err().unwrap();
        assert!(err.to_string().contains("must start with http://"));
    }

    #[test]
    fn test_endpoint_normalizes_trailing_slash() {
        let adapter = StoreApiAdapter::new("http://localhost:8000/").unwrap();
        assert_eq!(
            adapter.endpoint(),
            "http://localhost:8000/processed_agent_data/"
        );
    }

    #[tokio::test]
    async fn test_empty_batch_not_sent() {
        let adapter = StoreApiAdapter::new("http://127.0.0.1:9").unwrap();
        assert!(!adapter.save_data(Vec::new()).await);
    }
}
