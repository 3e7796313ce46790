use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::AlgoApi;
use crate::feed::FeedManager;
use crate::models::TradeMarker;
use crate::ui::DashboardSink;

/// Fetches executed trades and projects them onto the chart as markers,
/// windowed to the current channel session via the first-tick anchor.
pub struct TradeMarkerSource {
    algo: AlgoApi,
    feed: Arc<FeedManager>,
    sink: Arc<dyn DashboardSink>,
}

impl TradeMarkerSource {
    pub fn new(algo: AlgoApi, feed: Arc<FeedManager>, sink: Arc<dyn DashboardSink>) -> Self {
        Self { algo, feed, sink }
    }

    /// Recompute the marker set. A no-op before the first tick of the
    /// session (nothing to anchor against, and no fetch is issued). A fetch
    /// failure leaves the previously rendered markers untouched.
    pub async fn refresh(&self) {
        let anchor = match self.feed.anchor() {
            Some(a) => a,
            None => {
                debug!("marker refresh skipped, no tick seen yet");
                return;
            }
        };

        match self.algo.trades().await {
            Ok(trades) => {
                let markers: Vec<TradeMarker> = trades
                    .into_iter()
                    .filter(|t| t.time >= anchor)
                    .map(|t| TradeMarker {
                        time_secs: t.time,
                        side: t.side,
                    })
                    .collect();
                debug!(count = markers.len(), anchor, "trade markers refreshed");
                self.sink.set_markers(&markers);
            }
            Err(e) => {
                // Keep whatever is on screen rather than blanking it
                warn!("trade history fetch failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Tick, TradeSide};
    use crate::ui::RecordingSink;

    fn fixture(base_url: &str) -> (TradeMarkerSource, Arc<FeedManager>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let feed = Arc::new(FeedManager::new(
            "ws://127.0.0.1:1",
            Arc::clone(&sink) as Arc<dyn DashboardSink>,
        ));
        let source = TradeMarkerSource::new(
            AlgoApi::new(base_url),
            Arc::clone(&feed),
            Arc::clone(&sink) as Arc<dyn DashboardSink>,
        );
        (source, feed, sink)
    }

    fn seed_tick(feed: &Arc<FeedManager>, secs: i64) {
        feed.test_tick(Tick {
            timestamp_nanos: secs * 1_000_000_000,
            price: 1.0,
        });
    }

    #[tokio::test]
    async fn test_refresh_before_any_tick_issues_no_fetch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/algo/trades")
            .expect(0)
            .create_async()
            .await;

        let (source, _feed, sink) = fixture(&server.url());
        source.refresh().await;

        mock.assert_async().await;
        assert_eq!(sink.recorded().markers, None);
    }

    #[tokio::test]
    async fn test_refresh_windows_trades_to_anchor() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/algo/trades")
            .with_status(200)
            .with_body(
                r#"[{"time":99,"price":1.0,"type":"sell"},
                    {"time":101,"price":1.1,"type":"buy"},
                    {"time":112,"price":1.2,"type":"sell"}]"#,
            )
            .create_async()
            .await;

        let (source, feed, sink) = fixture(&server.url());
        seed_tick(&feed, 100);
        source.refresh().await;

        let markers = sink.recorded().markers.unwrap();
        assert_eq!(
            markers,
            vec![
                TradeMarker {
                    time_secs: 101,
                    side: TradeSide::Buy
                },
                TradeMarker {
                    time_secs: 112,
                    side: TradeSide::Sell
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_prior_markers() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/algo/trades")
            .with_status(200)
            .with_body(r#"[{"time":101,"price":1.1,"type":"buy"}]"#)
            .expect(1)
            .create_async()
            .await;

        let (source, feed, sink) = fixture(&server.url());
        seed_tick(&feed, 100);
        source.refresh().await;
        ok.remove_async().await;

        server
            .mock("GET", "/algo/trades")
            .with_status(500)
            .create_async()
            .await;
        source.refresh().await;

        // The failed refresh must not blank the marker set
        let markers = sink.recorded().markers.unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].time_secs, 101);
    }

    #[tokio::test]
    async fn test_refresh_includes_trade_at_anchor() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/algo/trades")
            .with_status(200)
            .with_body(r#"[{"time":100,"price":1.0,"type":"buy"}]"#)
            .create_async()
            .await;

        let (source, feed, sink) = fixture(&server.url());
        seed_tick(&feed, 100);
        source.refresh().await;

        assert_eq!(sink.recorded().markers.unwrap().len(), 1);
    }
}
