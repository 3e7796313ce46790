//! Shared harness for the channel integration tests: a mock streaming
//! server that plays a scripted sequence of tick frames to each client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// What the mock server does with each accepted connection
#[derive(Clone)]
pub struct Script {
    /// Text frames sent in order after the handshake
    pub frames: Vec<String>,
    /// Pause between frames
    pub frame_gap: Duration,
    /// Close the connection server-side once the frames are sent
    pub close_after: bool,
}

impl Script {
    pub fn ticks(frames: &[&str]) -> Self {
        Self {
            frames: frames.iter().map(|f| f.to_string()).collect(),
            frame_gap: Duration::from_millis(10),
            close_after: false,
        }
    }

    pub fn then_close(mut self) -> Self {
        self.close_after = true;
        self
    }
}

pub struct MockFeedServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl MockFeedServer {
    pub async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = Arc::clone(&shutdown);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let script = script.clone();
                                tokio::spawn(async move {
                                    handle_connection(stream, script).await;
                                });
                            }
                            Err(_) => break,
                        }
                    }
                    _ = shutdown_clone.notified() => break,
                }
            }
        });

        Self { addr, shutdown }
    }

    /// Base URL for the client; the manager appends `/ws/{pair}` itself
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockFeedServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn handle_connection(stream: TcpStream, script: Script) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(_) => return,
    };
    let (mut write, mut read) = ws_stream.split();

    for frame in &script.frames {
        tokio::time::sleep(script.frame_gap).await;
        if write.send(Message::Text(frame.clone())).await.is_err() {
            return;
        }
    }

    if script.close_after {
        let _ = write.send(Message::Close(None)).await;
        return;
    }

    // Stay connected, answering pings, until the client hangs up
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Ping(payload)) => {
                if write.send(Message::Pong(payload)).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }
}
