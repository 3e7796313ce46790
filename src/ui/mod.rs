use std::sync::Mutex;

use crate::models::{AlgoStatus, TradeMarker};

/// Enabled state of the three session buttons. Fully determined by the
/// reconciler from remote truth, never from locally accumulated belief.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffordanceState {
    pub start_enabled: bool,
    pub stop_enabled: bool,
    pub close_enabled: bool,
}

impl AffordanceState {
    /// Nothing running: only start is available
    pub fn idle() -> Self {
        Self {
            start_enabled: true,
            stop_enabled: false,
            close_enabled: false,
        }
    }

    /// A channel session just opened: lock out start, allow stop/close
    pub fn session_active() -> Self {
        Self {
            start_enabled: false,
            stop_enabled: true,
            close_enabled: true,
        }
    }

    /// Derive button state from the two remote probes.
    /// Start is disabled whenever either leg runs; stop enabled whenever
    /// either runs; close only when the algorithm runs.
    pub fn from_truth(feed_running: bool, algo_running: bool) -> Self {
        Self {
            start_enabled: !feed_running && !algo_running,
            stop_enabled: feed_running || algo_running,
            close_enabled: algo_running,
        }
    }
}

/// Label shown on the close button as the close sequence advances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseLabel {
    Close,
    Closing,
    Closed,
}

/// Which backing service a health badge reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthService {
    Exchange,
    Algo,
}

/// Badge state. `Error` is the only user-visible failure indicator the
/// controller ever renders - an outright probe failure, not a session
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Ok,
    Degraded,
    Error,
}

/// Sink for everything the controller renders. The real dashboard is a
/// one-way consumer; modeling it as a trait keeps the controller testable
/// without one.
pub trait DashboardSink: Send + Sync {
    fn clear_series(&self);
    fn push_point(&self, time_secs: i64, price: f64);
    fn set_markers(&self, markers: &[TradeMarker]);

    fn set_last_price(&self, price: f64);
    fn set_last_tick_time(&self, time_secs: i64);

    fn set_affordances(&self, affordances: AffordanceState);
    fn set_close_enabled(&self, enabled: bool);
    fn set_close_label(&self, label: CloseLabel);
    fn set_pair_locked(&self, locked: bool);

    fn set_algo_stats(&self, stats: &AlgoStatus);
    fn set_health(&self, service: HealthService, state: HealthState);
}

/// Sink that renders to the log. Used by the headless binary.
#[derive(Debug, Default)]
pub struct LogSink;

impl DashboardSink for LogSink {
    fn clear_series(&self) {
        tracing::debug!("chart series cleared");
    }

    fn push_point(&self, time_secs: i64, price: f64) {
        tracing::debug!(time_secs, price, "chart point");
    }

    fn set_markers(&self, markers: &[TradeMarker]) {
        tracing::debug!(count = markers.len(), "trade markers replaced");
    }

    fn set_last_price(&self, price: f64) {
        tracing::info!("last price: {:.6}", price);
    }

    fn set_last_tick_time(&self, time_secs: i64) {
        let stamp = chrono::DateTime::from_timestamp(time_secs, 0)
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| time_secs.to_string());
        tracing::debug!(time_secs, %stamp, "last tick time");
    }

    fn set_affordances(&self, affordances: AffordanceState) {
        tracing::info!(
            start = affordances.start_enabled,
            stop = affordances.stop_enabled,
            close = affordances.close_enabled,
            "affordances"
        );
    }

    fn set_close_enabled(&self, enabled: bool) {
        tracing::info!(enabled, "close button");
    }

    fn set_close_label(&self, label: CloseLabel) {
        tracing::info!(?label, "close label");
    }

    fn set_pair_locked(&self, locked: bool) {
        tracing::info!(locked, "pair selector");
    }

    fn set_algo_stats(&self, stats: &AlgoStatus) {
        tracing::info!(
            running = stats.running,
            trades = stats.trades_taken,
            net_pnl = stats.net_pnl,
            wins = stats.wins,
            losses = stats.losses,
            "algo stats"
        );
    }

    fn set_health(&self, service: HealthService, state: HealthState) {
        tracing::info!(?service, ?state, "health badge");
    }
}

/// Sink that records everything it is handed. Test double for the
/// controller's unit and integration tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    inner: Mutex<Recorded>,
}

#[derive(Debug, Default, Clone)]
pub struct Recorded {
    pub series: Vec<(i64, f64)>,
    pub series_cleared: u32,
    pub markers: Option<Vec<TradeMarker>>,
    pub last_price: Option<f64>,
    pub last_tick_time: Option<i64>,
    pub affordances: Option<AffordanceState>,
    pub close_enabled: Option<bool>,
    pub close_label: Option<CloseLabel>,
    pub pair_locked: Option<bool>,
    pub algo_stats: Option<AlgoStatus>,
    pub health: Vec<(HealthService, HealthState)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn recorded(&self) -> Recorded {
        self.inner.lock().unwrap().clone()
    }
}

impl DashboardSink for RecordingSink {
    fn clear_series(&self) {
        let mut r = self.inner.lock().unwrap();
        r.series.clear();
        r.series_cleared += 1;
    }

    fn push_point(&self, time_secs: i64, price: f64) {
        self.inner.lock().unwrap().series.push((time_secs, price));
    }

    fn set_markers(&self, markers: &[TradeMarker]) {
        self.inner.lock().unwrap().markers = Some(markers.to_vec());
    }

    fn set_last_price(&self, price: f64) {
        self.inner.lock().unwrap().last_price = Some(price);
    }

    fn set_last_tick_time(&self, time_secs: i64) {
        self.inner.lock().unwrap().last_tick_time = Some(time_secs);
    }

    fn set_affordances(&self, affordances: AffordanceState) {
        self.inner.lock().unwrap().affordances = Some(affordances);
    }

    fn set_close_enabled(&self, enabled: bool) {
        self.inner.lock().unwrap().close_enabled = Some(enabled);
    }

    fn set_close_label(&self, label: CloseLabel) {
        self.inner.lock().unwrap().close_label = Some(label);
    }

    fn set_pair_locked(&self, locked: bool) {
        self.inner.lock().unwrap().pair_locked = Some(locked);
    }

    fn set_algo_stats(&self, stats: &AlgoStatus) {
        self.inner.lock().unwrap().algo_stats = Some(stats.clone());
    }

    fn set_health(&self, service: HealthService, state: HealthState) {
        self.inner.lock().unwrap().health.push((service, state));
    }
}
