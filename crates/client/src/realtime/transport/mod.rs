//! Engine.IO transports.
//!
//! Opening a transport performs the Engine.IO handshake and returns a
//! [`TransportLink`]: a reader task forwards decoded packets into a channel
//! and a writer task drains an outgoing channel, so the connection loop only
//! ever deals with packets.

mod polling;
mod websocket;

use std::fmt;
use std::time::Duration;

use stockmaster_shared::{EnginePacket, Handshake, ProtocolError, ENGINE_IO_VERSION, SOCKET_IO_PATH};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use url::Url;

/// How long a graceful close may take to flush before the link is dropped.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    WebSocket,
    Polling,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::WebSocket => "websocket",
            TransportKind::Polling => "polling",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),
    #[error("websocket error: {0}")]
    WebSocket(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("timed out")]
    Timeout,
    #[error("transport closed")]
    Closed,
    #[error("connection refused: {0}")]
    Refused(String),
    #[error("no transports configured")]
    NoTransports,
}

/// Build the Engine.IO endpoint for `base` (e.g. `http://localhost:5000`).
pub fn endpoint_url(base: &str, kind: TransportKind) -> Result<Url, TransportError> {
    let mut url = Url::parse(base).map_err(|e| TransportError::InvalidUrl(format!("{base}: {e}")))?;

    let scheme = match (kind, url.scheme()) {
        (TransportKind::WebSocket, "http" | "ws") => "ws",
        (TransportKind::WebSocket, "https" | "wss") => "wss",
        (TransportKind::Polling, "http" | "ws") => "http",
        (TransportKind::Polling, "https" | "wss") => "https",
        (_, other) => {
            return Err(TransportError::InvalidUrl(format!("unsupported scheme '{other}'")));
        }
    };
    if url.scheme() != scheme && url.set_scheme(scheme).is_err() {
        return Err(TransportError::InvalidUrl(format!("cannot use scheme '{scheme}'")));
    }

    let path = format!("{}{}", url.path().trim_end_matches('/'), SOCKET_IO_PATH);
    url.set_path(&path);
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", &ENGINE_IO_VERSION.to_string())
        .append_pair("transport", kind.as_str());
    Ok(url)
}

/// Open `kind` against the event server at `base`.
pub async fn open(
    kind: TransportKind,
    base: &str,
    http: &reqwest::Client,
    timeout: Duration,
) -> Result<TransportLink, TransportError> {
    let url = endpoint_url(base, kind)?;
    crate::log_debug!("Opening {} transport at {}", kind, url);
    match kind {
        TransportKind::WebSocket => websocket::open(url, timeout).await,
        TransportKind::Polling => polling::open(http.clone(), url, timeout).await,
    }
}

/// An open Engine.IO session over one transport.
pub struct TransportLink {
    kind: TransportKind,
    handshake: Handshake,
    outgoing: UnboundedSender<EnginePacket>,
    incoming: UnboundedReceiver<Result<EnginePacket, TransportError>>,
    reader: JoinHandle<()>,
    writer: Option<JoinHandle<()>>,
}

impl TransportLink {
    pub(crate) fn new(
        kind: TransportKind,
        handshake: Handshake,
        outgoing: UnboundedSender<EnginePacket>,
        incoming: UnboundedReceiver<Result<EnginePacket, TransportError>>,
        reader: JoinHandle<()>,
        writer: JoinHandle<()>,
    ) -> Self {
        Self {
            kind,
            handshake,
            outgoing,
            incoming,
            reader,
            writer: Some(writer),
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Queue a packet for the writer task.
    pub fn send(&self, packet: EnginePacket) -> Result<(), TransportError> {
        self.outgoing.send(packet).map_err(|_| TransportError::Closed)
    }

    /// Next packet from the server. `None` once the transport has closed.
    pub async fn recv(&mut self) -> Option<Result<EnginePacket, TransportError>> {
        self.incoming.recv().await
    }

    /// Send `packets` followed by an Engine.IO close, then wait briefly for the writer to flush.
    pub async fn close(mut self, packets: Vec<EnginePacket>) {
        for packet in packets {
            let _ = self.send(packet);
        }
        let _ = self.send(EnginePacket::Close);

        if let Some(writer) = self.writer.take() {
            if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, writer).await.is_err() {
                crate::log_debug!("{} transport did not flush before close", self.kind);
            }
        }
    }
}

impl Drop for TransportLink {
    fn drop(&mut self) {
        self.reader.abort();
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }
}
