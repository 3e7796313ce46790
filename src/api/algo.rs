use reqwest::Client;
use serde::Deserialize;

use super::{check_status, ApiError};
use crate::models::{AlgoHealth, AlgoStatus, TradeSide};

/// Client for the trading algorithm routes of the dashboard backend
#[derive(Debug, Clone)]
pub struct AlgoApi {
    client: Client,
    base_url: String,
}

/// One executed trade, as reported by the trade history route.
/// Time is epoch seconds, matching the chart's time axis.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TradeRecord {
    pub time: i64,
    pub price: f64,
    #[serde(rename = "type")]
    pub side: TradeSide,
}

#[derive(Debug, Deserialize)]
struct ActiveOrdersResponse {
    has_active_orders: bool,
}

impl AlgoApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Begin automated trading
    pub async fn start(&self) -> Result<(), ApiError> {
        let resp = self
            .client
            .post(format!("{}/algo/start", self.base_url))
            .send()
            .await?;
        check_status(resp)?;
        Ok(())
    }

    /// End automated trading
    pub async fn stop(&self) -> Result<(), ApiError> {
        let resp = self
            .client
            .post(format!("{}/algo/stop", self.base_url))
            .send()
            .await?;
        check_status(resp)?;
        Ok(())
    }

    /// Begin liquidation: sell-only mode, shut down once flat
    pub async fn close(&self) -> Result<(), ApiError> {
        let resp = self
            .client
            .post(format!("{}/algo/close", self.base_url))
            .send()
            .await?;
        check_status(resp)?;
        Ok(())
    }

    /// Probe the algorithm's running state and session stats
    pub async fn status(&self) -> Result<AlgoStatus, ApiError> {
        let resp = check_status(
            self.client
                .get(format!("{}/algo/status", self.base_url))
                .send()
                .await?,
        )?;
        resp.json()
            .await
            .map_err(|e| ApiError::Payload(e.to_string()))
    }

    /// Fetch the full executed-trade history
    pub async fn trades(&self) -> Result<Vec<TradeRecord>, ApiError> {
        let resp = check_status(
            self.client
                .get(format!("{}/algo/trades", self.base_url))
                .send()
                .await?,
        )?;
        resp.json()
            .await
            .map_err(|e| ApiError::Payload(e.to_string()))
    }

    /// Probe whether any exchange orders are still active
    pub async fn active_orders(&self) -> Result<bool, ApiError> {
        let resp = check_status(
            self.client
                .get(format!("{}/kc/orders/active_status", self.base_url))
                .send()
                .await?,
        )?;
        let body: ActiveOrdersResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Payload(e.to_string()))?;
        Ok(body.has_active_orders)
    }

    /// Probe the algorithm service's health (health badge)
    pub async fn health(&self) -> Result<AlgoHealth, ApiError> {
        let resp = check_status(
            self.client
                .get(format!("{}/algo/health", self.base_url))
                .send()
                .await?,
        )?;
        resp.json()
            .await
            .map_err(|e| ApiError::Payload(e.to_string()))
    }
}
