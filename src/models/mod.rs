use serde::{Deserialize, Serialize};

/// One streamed price update off the live channel.
///
/// Ticks are ephemeral - they drive the chart series and the last-price
/// badges and are not retained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub timestamp_nanos: i64,
    pub price: f64,
}

impl Tick {
    /// Tick time in whole seconds, the unit the chart and markers use
    pub fn time_secs(&self) -> i64 {
        self.timestamp_nanos / 1_000_000_000
    }
}

/// Side of an executed trade
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Where a marker is drawn relative to the price line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerPosition {
    BelowBar,
    AboveBar,
}

/// Read-only projection of an executed trade, plotted on the chart.
/// Recomputed wholesale on every marker refresh - never merged incrementally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeMarker {
    pub time_secs: i64,
    pub side: TradeSide,
}

impl TradeMarker {
    /// Buys are drawn below the price line, sells above
    pub fn position(&self) -> MarkerPosition {
        match self.side {
            TradeSide::Buy => MarkerPosition::BelowBar,
            TradeSide::Sell => MarkerPosition::AboveBar,
        }
    }
}

/// Snapshot of authoritative remote state. The reconciler trusts this over
/// any locally cached belief.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteTruth {
    pub feed_running: bool,
    pub algo_running: bool,
    pub has_active_orders: bool,
}

/// Status payload reported by the algorithm service.
///
/// The reconciler only consults `running`; the rest rides along to the
/// stats panel.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AlgoStatus {
    pub running: bool,
    #[serde(default)]
    pub trades_taken: u64,
    #[serde(rename = "net_PnL", default)]
    pub net_pnl: f64,
    #[serde(default)]
    pub wins: u64,
    #[serde(default)]
    pub losses: u64,
    #[serde(default)]
    pub prediction_high: Option<f64>,
    #[serde(default)]
    pub prediction_low: Option<f64>,
}

/// Health payload reported by the algorithm service
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct AlgoHealth {
    pub models_loaded: bool,
    pub task_running: bool,
    pub healthy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_time_conversion() {
        let tick = Tick {
            timestamp_nanos: 1_700_000_000_123_456_789,
            price: 1.25,
        };
        assert_eq!(tick.time_secs(), 1_700_000_000);
    }

    #[test]
    fn test_marker_side_encoding() {
        let buy = TradeMarker {
            time_secs: 100,
            side: TradeSide::Buy,
        };
        let sell = TradeMarker {
            time_secs: 101,
            side: TradeSide::Sell,
        };

        assert_eq!(buy.position(), MarkerPosition::BelowBar);
        assert_eq!(sell.position(), MarkerPosition::AboveBar);
    }

    #[test]
    fn test_algo_status_deserializes_service_payload() {
        let json = r#"{
            "running": true,
            "trades_taken": 7,
            "current_DV": 12.5,
            "net_PnL": -3.25,
            "wins": 4,
            "losses": 3,
            "prediction_high": 0.52,
            "prediction_low": 0.48
        }"#;

        let status: AlgoStatus = serde_json::from_str(json).unwrap();
        assert!(status.running);
        assert_eq!(status.trades_taken, 7);
        assert_eq!(status.net_pnl, -3.25);
        assert_eq!(status.prediction_high, Some(0.52));
    }

    #[test]
    fn test_algo_status_tolerates_missing_stats() {
        let status: AlgoStatus = serde_json::from_str(r#"{"running": false}"#).unwrap();
        assert!(!status.running);
        assert_eq!(status.trades_taken, 0);
        assert_eq!(status.prediction_high, None);
    }
}
