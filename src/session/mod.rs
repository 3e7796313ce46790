use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::api::{AlgoApi, FeedApi};
use crate::close::{CloseSequencer, LiquidationStep};
use crate::feed::FeedManager;
use crate::models::RemoteTruth;
use crate::ui::{AffordanceState, CloseLabel, DashboardSink, HealthService, HealthState};

/// Reconciles local session state against the backend's authoritative view.
///
/// The remote services are the single source of truth for what is running;
/// the controller never trusts a locally accumulated belief across a sync.
pub struct SessionController {
    feed_api: FeedApi,
    algo_api: AlgoApi,
    feed: Arc<FeedManager>,
    sink: Arc<dyn DashboardSink>,
    closer: CloseSequencer,
    pair: String,
    order_poll_interval: Duration,
    /// Ticket counter for syncs in flight
    sync_seq: AtomicU64,
    /// Highest sync ticket whose results have landed
    sync_applied: AtomicU64,
}

impl SessionController {
    pub fn new(
        feed_api: FeedApi,
        algo_api: AlgoApi,
        feed: Arc<FeedManager>,
        sink: Arc<dyn DashboardSink>,
        pair: impl Into<String>,
        order_poll_interval: Duration,
    ) -> Self {
        Self {
            feed_api,
            algo_api,
            feed,
            sink,
            closer: CloseSequencer::new(),
            pair: pair.into(),
            order_poll_interval,
            sync_seq: AtomicU64::new(0),
            sync_applied: AtomicU64::new(0),
        }
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    /// Probe both services. A failed probe contributes `false` for its leg
    /// and never propagates; the other leg still counts.
    pub async fn probe(&self) -> RemoteTruth {
        let feed_running = match self.feed_api.feed_running(&self.pair).await {
            Ok(running) => running,
            Err(e) => {
                warn!("feed status probe failed, assuming stopped: {}", e);
                false
            }
        };

        let algo_running = match self.algo_api.status().await {
            Ok(status) => {
                self.sink.set_algo_stats(&status);
                status.running
            }
            Err(e) => {
                warn!("algo status probe failed, assuming stopped: {}", e);
                false
            }
        };

        RemoteTruth {
            feed_running,
            algo_running,
            has_active_orders: false,
        }
    }

    /// Align the channel and the affordances with remote truth. Idempotent,
    /// and safe to run while another sync is still in flight: a sync that
    /// finishes after a newer one has already landed discards its results.
    pub async fn sync(&self) {
        let seq = self.sync_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let truth = self.probe().await;
        self.apply(seq, truth).await;
    }

    async fn apply(&self, seq: u64, truth: RemoteTruth) {
        let mut applied = self.sync_applied.load(Ordering::SeqCst);
        loop {
            if seq <= applied {
                info!(seq, "discarding stale sync result");
                return;
            }
            match self.sync_applied.compare_exchange(
                applied,
                seq,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(current) => applied = current,
            }
        }

        if truth.feed_running {
            if let Err(e) = self.feed.open(&self.pair).await {
                // The next sync retries; affordances still reflect truth
                error!("channel open during sync failed: {}", e);
            }
        } else {
            self.feed.close().await;
        }

        self.sink
            .set_affordances(AffordanceState::from_truth(
                truth.feed_running,
                truth.algo_running,
            ));
    }

    /// Start the session: server-side feed first, channel only once the
    /// server accepted, then the algorithm. The two remote legs are not
    /// transactional - either may fail without rolling the other back, and
    /// the closing sync reports whatever stuck.
    pub async fn start(&self) {
        match self.feed_api.start_feed(&self.pair).await {
            Ok(()) => {
                info!("server-side feed started for {}", self.pair);
                if let Err(e) = self.feed.open(&self.pair).await {
                    error!("price channel failed to open: {}", e);
                }
            }
            Err(e) => error!("feed start rejected, skipping channel open: {}", e),
        }

        match self.algo_api.start().await {
            Ok(()) => info!("🚀 trading algorithm started"),
            Err(e) => error!("algorithm start failed: {}", e),
        }

        self.closer.reset();
        self.sink.set_close_label(CloseLabel::Close);
        self.sync().await;
    }

    /// Stop the session. The channel goes down first so no tick lands after
    /// the operator asked for quiet; the two remote stops then run
    /// independently, neither rolling the other back.
    pub async fn stop(&self) {
        self.feed.close().await;

        if let Err(e) = self.feed_api.stop_feed(&self.pair).await {
            warn!("feed stop failed: {}", e);
        }
        if let Err(e) = self.algo_api.stop().await {
            warn!("algorithm stop failed: {}", e);
        }

        self.sync().await;
    }

    /// Liquidate the open position and wind the session down. Polls the
    /// exchange until no orders remain, then tears the channel down.
    pub async fn close_position(&self) {
        if !self.closer.begin() {
            return;
        }

        if let Err(e) = self.algo_api.close().await {
            error!("close request rejected: {}", e);
            self.closer.abort_entry();
            return;
        }

        info!("close accepted, waiting for orders to drain");
        self.sink.set_close_enabled(false);
        self.sink.set_close_label(CloseLabel::Closing);
        self.closer.mark_liquidating();

        let mut ticker = tokio::time::interval(self.order_poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let probe = self.algo_api.active_orders().await;
            if self.closer.on_poll(probe) == LiquidationStep::Done {
                break;
            }
        }

        self.feed.close().await;
        self.sink.set_close_label(CloseLabel::Closed);
        self.sync().await;
    }

    /// Refresh the two health badges. Probe failure renders an explicit
    /// error badge; it never takes the session down.
    pub async fn refresh_health(&self) {
        let exchange = match self.feed_api.exchange_healthy().await {
            Ok(true) => HealthState::Ok,
            Ok(false) => HealthState::Degraded,
            Err(e) => {
                warn!("exchange health probe failed: {}", e);
                HealthState::Error
            }
        };
        self.sink.set_health(HealthService::Exchange, exchange);

        let algo = match self.algo_api.health().await {
            Ok(h) if h.healthy => HealthState::Ok,
            Ok(_) => HealthState::Degraded,
            Err(e) => {
                warn!("algo health probe failed: {}", e);
                HealthState::Error
            }
        };
        self.sink.set_health(HealthService::Algo, algo);
    }

    /// Release everything held on behalf of the operator's session. The
    /// recurring timers are owned by the binary; this closes what they drove.
    pub async fn shutdown(&self) {
        self.feed.close().await;
        info!("session controller shut down");
    }
}
