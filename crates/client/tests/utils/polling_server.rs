//! Minimal Socket.IO server that only offers HTTP long-polling.
#![allow(dead_code)] // Test utilities may not all be used in every test

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

use super::socket_server::HANDSHAKE;

const SEPARATOR: char = '\u{1e}';

struct PollState {
    outbound_tx: UnboundedSender<String>,
    outbound_rx: Mutex<UnboundedReceiver<String>>,
    received_tx: UnboundedSender<String>,
    handshakes: AtomicUsize,
}

pub struct FakePollingServer {
    port: u16,
    state: Arc<PollState>,
    received: Mutex<UnboundedReceiver<String>>,
    _server: JoinHandle<()>,
}

impl FakePollingServer {
    pub async fn start() -> Self {
        let (outbound_tx, outbound_rx) = unbounded_channel();
        let (received_tx, received_rx) = unbounded_channel();
        let state = Arc::new(PollState {
            outbound_tx,
            outbound_rx: Mutex::new(outbound_rx),
            received_tx,
            handshakes: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/socket.io/", get(poll).post(send))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            port,
            state,
            received: Mutex::new(received_rx),
            _server: server,
        }
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Number of Engine.IO sessions opened (websocket attempts included)
    pub fn handshakes(&self) -> usize {
        self.state.handshakes.load(Ordering::SeqCst)
    }

    /// Queue a Socket.IO event for the next poll.
    pub fn emit(&self, event: &str, payload: Value) {
        self.state
            .outbound_tx
            .send(format!("42{}", json!([event, payload])))
            .unwrap();
    }

    /// Next packet the client posted, other than the namespace CONNECT.
    pub async fn next_received(&self) -> Option<String> {
        let mut received = self.received.lock().await;
        timeout(Duration::from_secs(5), received.recv())
            .await
            .ok()
            .flatten()
    }
}

async fn poll(
    State(state): State<Arc<PollState>>,
    Query(query): Query<HashMap<String, String>>,
) -> String {
    if !query.contains_key("sid") {
        state.handshakes.fetch_add(1, Ordering::SeqCst);
        return HANDSHAKE.to_string();
    }

    let mut outbound = state.outbound_rx.lock().await;
    match timeout(Duration::from_millis(200), outbound.recv()).await {
        Ok(Some(first)) => {
            let mut packets = vec![first];
            while let Ok(next) = outbound.try_recv() {
                packets.push(next);
            }
            packets.join(&SEPARATOR.to_string())
        }
        _ => "6".to_string(),
    }
}

async fn send(State(state): State<Arc<PollState>>, body: String) -> &'static str {
    for packet in body.split(SEPARATOR) {
        if packet == "40" {
            let _ = state.outbound_tx.send(r#"40{"sid":"socket-sid"}"#.to_string());
        } else {
            let _ = state.received_tx.send(packet.to_string());
        }
    }
    "ok"
}
