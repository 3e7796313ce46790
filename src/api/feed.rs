use reqwest::Client;
use serde::Deserialize;

use super::{check_status, ApiError};

/// Client for the market feed routes of the dashboard backend
#[derive(Debug, Clone)]
pub struct FeedApi {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct FeedStatusResponse {
    running: bool,
}

impl FeedApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Begin server-side streaming for a pair
    pub async fn start_feed(&self, pair: &str) -> Result<(), ApiError> {
        let url = format!("{}/start/{}", self.base_url, pair);
        let resp = self.client.post(&url).send().await?;
        check_status(resp)?;
        Ok(())
    }

    /// End server-side streaming for a pair
    pub async fn stop_feed(&self, pair: &str) -> Result<(), ApiError> {
        let url = format!("{}/stop/{}", self.base_url, pair);
        let resp = self.client.post(&url).send().await?;
        check_status(resp)?;
        Ok(())
    }

    /// Probe whether the server-side feed is running for a pair
    pub async fn feed_running(&self, pair: &str) -> Result<bool, ApiError> {
        let url = format!("{}/feed/status/{}", self.base_url, pair);
        let resp = check_status(self.client.get(&url).send().await?)?;
        let status: FeedStatusResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Payload(e.to_string()))?;
        Ok(status.running)
    }

    /// Probe the upstream exchange connectivity (health badge)
    pub async fn exchange_healthy(&self) -> Result<bool, ApiError> {
        let url = format!("{}/kc/health", self.base_url);
        let resp = self.client.get(&url).send().await?;
        Ok(resp.status().is_success())
    }
}
