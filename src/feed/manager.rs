use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::state::{self, ChannelEvent, ChannelState};
use crate::models::Tick;
use crate::ui::{AffordanceState, DashboardSink};

/// Parse one channel frame: comma-separated `timestampNanos,price[,size]`.
/// A frame missing either leading field, or carrying an unparseable number,
/// yields `None` and is dropped by the caller.
pub fn parse_frame(frame: &str) -> Option<Tick> {
    let mut fields = frame.trim().split(',');
    let ts = fields.next()?.trim();
    let price = fields.next()?.trim();
    if ts.is_empty() || price.is_empty() {
        return None;
    }
    Some(Tick {
        timestamp_nanos: ts.parse().ok()?,
        price: price.parse().ok()?,
    })
}

struct ChannelSession {
    task: tokio::task::JoinHandle<()>,
    shutdown: Arc<Notify>,
    detached: Arc<AtomicBool>,
}

struct Inner {
    state: ChannelState,
    pair: Option<String>,
    /// Bumped on every establishment so callbacks from a previous channel
    /// session can be recognized as stale and ignored
    epoch: u64,
    session: Option<ChannelSession>,
}

/// Owner of the one live price channel and of the first-tick anchor.
///
/// All other components go through `open`/`close`/`anchor`; nothing else
/// may touch the socket or reset the anchor.
pub struct FeedManager {
    ws_base: String,
    sink: Arc<dyn DashboardSink>,
    inner: Mutex<Inner>,
    anchor: Mutex<Option<i64>>,
}

impl FeedManager {
    pub fn new(ws_base: impl Into<String>, sink: Arc<dyn DashboardSink>) -> Self {
        Self {
            ws_base: ws_base.into(),
            sink,
            inner: Mutex::new(Inner {
                state: ChannelState::Idle,
                pair: None,
                epoch: 0,
                session: None,
            }),
            anchor: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ChannelState {
        self.inner.lock().unwrap().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    pub fn pair(&self) -> Option<String> {
        self.inner.lock().unwrap().pair.clone()
    }

    /// Timestamp (seconds) of the first tick of the current channel
    /// session, or `None` if no tick has been seen yet
    pub fn anchor(&self) -> Option<i64> {
        *self.anchor.lock().unwrap()
    }

    /// Open the streaming channel for a pair. A no-op while a channel is
    /// already open or connecting, for any pair.
    pub async fn open(self: &Arc<Self>, pair: &str) -> crate::Result<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.state != ChannelState::Idle {
                debug!(state = ?inner.state, "open requested but channel not idle, ignoring");
                return Ok(());
            }
            inner.state = state::step(inner.state, ChannelEvent::OpenRequested);
            inner.pair = Some(pair.to_string());
        }

        let url = format!("{}/ws/{}", self.ws_base, pair);
        info!("opening price channel for {}", pair);

        let ws = match connect_async(&url).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                let mut inner = self.inner.lock().unwrap();
                inner.state = state::step(inner.state, ChannelEvent::ConnectFailed);
                inner.pair = None;
                return Err(format!("channel connect failed for {}: {}", pair, e).into());
            }
        };

        {
            let mut inner = self.inner.lock().unwrap();
            if inner.state != ChannelState::Connecting {
                // close() raced the handshake; dropping the socket is enough
                debug!("channel torn down while connecting, dropping fresh socket");
                return Ok(());
            }

            // Fresh-session view goes in before the reader task exists, so
            // a frame already buffered on the socket cannot land on the old
            // anchor or series
            *self.anchor.lock().unwrap() = None;
            self.sink.clear_series();
            self.sink.set_pair_locked(true);
            self.sink.set_affordances(AffordanceState::session_active());

            inner.state = state::step(inner.state, ChannelEvent::Established);
            inner.epoch += 1;
            let epoch = inner.epoch;

            let shutdown = Arc::new(Notify::new());
            let detached = Arc::new(AtomicBool::new(false));
            let task = tokio::spawn(run_channel(
                ws,
                Arc::downgrade(self),
                Arc::clone(&detached),
                Arc::clone(&shutdown),
                epoch,
            ));
            inner.session = Some(ChannelSession {
                task,
                shutdown,
                detached,
            });
        }

        info!("price channel open for {}", pair);
        Ok(())
    }

    /// Close the channel. Idempotent: safe to call when already closed.
    pub async fn close(&self) {
        let session = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state == ChannelState::Idle {
                return;
            }
            inner.state = state::step(inner.state, ChannelEvent::CloseRequested);
            inner.pair = None;
            inner.session.take()
        };

        if let Some(session) = session {
            // Detach first so a frame already in flight can't touch the UI
            // after teardown has begun
            session.detached.store(true, Ordering::Release);
            session.shutdown.notify_one();

            let abort = session.task.abort_handle();
            if tokio::time::timeout(Duration::from_secs(5), session.task)
                .await
                .is_err()
            {
                warn!("channel task hung during close, aborting");
                abort.abort();
            }
        }

        self.reset_view();
        info!("price channel closed");
    }

    /// Peer-initiated closure observed by the channel task. Runs the same
    /// teardown as an explicit close, unless the event is stale.
    fn handle_remote_close(&self, epoch: u64) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.epoch != epoch || inner.state != ChannelState::Open {
                return;
            }
            inner.state = state::step(inner.state, ChannelEvent::RemoteClosed);
            inner.pair = None;
            inner.session = None;
        }
        info!("price channel closed by peer");
        self.reset_view();
    }

    fn handle_tick(&self, tick: &Tick) {
        {
            let mut anchor = self.anchor.lock().unwrap();
            if anchor.is_none() {
                debug!(time_secs = tick.time_secs(), "first tick of channel session");
                *anchor = Some(tick.time_secs());
            }
        }
        self.sink.push_point(tick.time_secs(), tick.price);
        self.sink.set_last_price(tick.price);
        self.sink.set_last_tick_time(tick.time_secs());
    }

    /// Feed a tick in directly, bypassing the socket. Test-only.
    #[cfg(test)]
    pub fn test_tick(&self, tick: Tick) {
        self.handle_tick(&tick);
    }

    fn reset_view(&self) {
        *self.anchor.lock().unwrap() = None;
        self.sink.clear_series();
        self.sink.set_pair_locked(false);
        self.sink.set_affordances(AffordanceState::idle());
    }
}

async fn run_channel(
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    manager: Weak<FeedManager>,
    detached: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    epoch: u64,
) {
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if detached.load(Ordering::Acquire) {
                        continue;
                    }
                    // Malformed frames are dropped without comment
                    if let Some(tick) = parse_frame(&text) {
                        match manager.upgrade() {
                            Some(m) => m.handle_tick(&tick),
                            None => break,
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = write.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    if !detached.load(Ordering::Acquire) {
                        if let Some(m) = manager.upgrade() {
                            m.handle_remote_close(epoch);
                        }
                    }
                    break;
                }
                Some(Err(e)) => {
                    // Not fatal by itself; the closure event that follows
                    // drives teardown
                    warn!("price channel error: {}", e);
                }
                Some(Ok(_)) => {}
            },
            _ = shutdown.notified() => {
                let _ = write
                    .send(Message::Close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "session closed by operator".into(),
                    })))
                    .await;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::RecordingSink;

    #[test]
    fn test_parse_frame_full() {
        let tick = parse_frame("1700000000123456789,2.5,0.01").unwrap();
        assert_eq!(tick.timestamp_nanos, 1_700_000_000_123_456_789);
        assert_eq!(tick.price, 2.5);
    }

    #[test]
    fn test_parse_frame_without_size() {
        let tick = parse_frame("100000000000,1.25").unwrap();
        assert_eq!(tick.price, 1.25);
    }

    #[test]
    fn test_parse_frame_missing_price() {
        assert!(parse_frame("100000000000").is_none());
        assert!(parse_frame("100000000000,").is_none());
    }

    #[test]
    fn test_parse_frame_garbage() {
        assert!(parse_frame("").is_none());
        assert!(parse_frame(",2.5").is_none());
        assert!(parse_frame("abc,def").is_none());
        assert!(parse_frame("{\"not\":\"csv\"}").is_none());
    }

    fn manager_with_sink() -> (Arc<FeedManager>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let manager = Arc::new(FeedManager::new(
            "ws://127.0.0.1:1",
            Arc::clone(&sink) as Arc<dyn DashboardSink>,
        ));
        (manager, sink)
    }

    #[test]
    fn test_anchor_set_by_first_tick_only() {
        let (manager, sink) = manager_with_sink();
        assert_eq!(manager.anchor(), None);

        manager.handle_tick(&Tick {
            timestamp_nanos: 100_000_000_000,
            price: 1.0,
        });
        manager.handle_tick(&Tick {
            timestamp_nanos: 105_000_000_000,
            price: 1.1,
        });

        assert_eq!(manager.anchor(), Some(100));
        let recorded = sink.recorded();
        assert_eq!(recorded.series, vec![(100, 1.0), (105, 1.1)]);
        assert_eq!(recorded.last_price, Some(1.1));
        assert_eq!(recorded.last_tick_time, Some(105));
    }

    #[tokio::test]
    async fn test_close_when_idle_is_noop() {
        let (manager, sink) = manager_with_sink();
        manager.close().await;
        manager.close().await;

        assert_eq!(manager.state(), ChannelState::Idle);
        // Idle close never touches the view
        assert_eq!(sink.recorded().series_cleared, 0);
    }

    #[tokio::test]
    async fn test_open_failure_returns_to_idle() {
        // Nothing listens on port 1, so the handshake fails fast
        let (manager, _sink) = manager_with_sink();
        assert!(manager.open("KCS-USDT").await.is_err());
        assert_eq!(manager.state(), ChannelState::Idle);
        assert_eq!(manager.pair(), None);
    }

    #[test]
    fn test_stale_remote_close_ignored() {
        let (manager, sink) = manager_with_sink();
        // Epoch 5 never existed; the callback must not reset anything
        manager.handle_tick(&Tick {
            timestamp_nanos: 100_000_000_000,
            price: 1.0,
        });
        manager.handle_remote_close(5);
        assert_eq!(manager.anchor(), Some(100));
        assert_eq!(sink.recorded().series_cleared, 0);
    }
}
