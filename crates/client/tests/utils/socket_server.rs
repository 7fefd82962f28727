//! Minimal Socket.IO server speaking the websocket transport.
#![allow(dead_code)] // Test utilities may not all be used in every test

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub const HANDSHAKE: &str =
    r#"0{"sid":"engine-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

/// Outbound side of the connection currently being served
struct Live {
    frames: UnboundedSender<Message>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Shared {
    live: Mutex<Option<Live>>,
    connections: AtomicUsize,
}

// ============================================================================
// Fake Server
// ============================================================================

pub struct FakeSocketServer {
    port: u16,
    shared: Arc<Shared>,
    received: tokio::sync::Mutex<UnboundedReceiver<String>>,
    _accept: JoinHandle<()>,
}

impl FakeSocketServer {
    /// Start a server that accepts every namespace CONNECT.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let shared = Arc::new(Shared::default());
        let (received_tx, received_rx) = unbounded_channel();

        let accept_shared = shared.clone();
        let accept = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = accept_async(stream).await else {
                    continue;
                };
                accept_shared.connections.fetch_add(1, Ordering::SeqCst);

                let (frames_tx, mut frames_rx) = unbounded_channel::<Message>();
                let received_tx = received_tx.clone();
                let task = tokio::spawn(async move {
                    let (mut write, mut read) = ws.split();
                    if write.send(Message::Text(HANDSHAKE.into())).await.is_err() {
                        return;
                    }
                    loop {
                        tokio::select! {
                            frame = frames_rx.recv() => match frame {
                                Some(frame) => {
                                    if write.send(frame).await.is_err() {
                                        return;
                                    }
                                }
                                None => return,
                            },
                            msg = read.next() => match msg {
                                Some(Ok(Message::Text(text))) => {
                                    let text = text.as_str().to_string();
                                    if text == "40" {
                                        let ack = Message::Text(r#"40{"sid":"socket-sid"}"#.into());
                                        if write.send(ack).await.is_err() {
                                            return;
                                        }
                                    } else {
                                        let _ = received_tx.send(text);
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                                Some(Ok(_)) => {}
                            },
                        }
                    }
                });

                let previous = accept_shared
                    .live
                    .lock()
                    .unwrap()
                    .replace(Live { frames: frames_tx, task });
                if let Some(previous) = previous {
                    previous.task.abort();
                }
            }
        });

        Self {
            port,
            shared,
            received: tokio::sync::Mutex::new(received_rx),
            _accept: accept,
        }
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Number of websocket connections accepted so far
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Send a raw Engine.IO frame to the connected client.
    pub fn push(&self, frame: &str) {
        let live = self.shared.live.lock().unwrap();
        let live = live.as_ref().expect("no client connected");
        live.frames.send(Message::Text(frame.into())).unwrap();
    }

    /// Emit a Socket.IO event to the connected client.
    pub fn emit(&self, event: &str, payload: Value) {
        self.push(&format!("42{}", json!([event, payload])));
    }

    /// Kill the current connection without a close handshake.
    pub fn drop_connection(&self) {
        if let Some(live) = self.shared.live.lock().unwrap().take() {
            live.task.abort();
        }
    }

    /// Next frame the client sent, other than the namespace CONNECT.
    pub async fn next_received(&self) -> Option<String> {
        let mut received = self.received.lock().await;
        timeout(Duration::from_secs(5), received.recv())
            .await
            .ok()
            .flatten()
    }

    /// Assert nothing else arrives within `wait`.
    pub async fn assert_nothing_received(&self, wait: Duration) {
        let mut received = self.received.lock().await;
        if let Ok(Some(frame)) = timeout(wait, received.recv()).await {
            panic!("unexpected frame from client: {frame}");
        }
    }
}

/// Address of a port with nothing listening on it.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}
