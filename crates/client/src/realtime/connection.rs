//! Connection state, reconnect policy and the background connection loop.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_channel::mpsc::UnboundedReceiver;
use futures_util::StreamExt;
use serde_json::Value;
use stockmaster_shared::{events, EnginePacket, SocketPacket, DEFAULT_NAMESPACE};
use tokio::sync::watch;
use tokio::time::Instant;

use super::registry::HandlerRegistry;
use super::transport::{self, TransportError, TransportKind, TransportLink};
use crate::config::ClientConfig;

/// Connection state for the event client
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed { reason: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    pub enabled: bool,
    /// Reconnect attempts after the first failure before giving up
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            delay: Duration::from_millis(1000),
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnect attempt `attempt` (1-based). The delay is fixed.
    pub fn delay_for_attempt(&self, _attempt: u32) -> Duration {
        self.delay
    }

    /// Whether another attempt is allowed after `attempt` attempts have failed.
    pub fn allows(&self, attempt: u32) -> bool {
        self.enabled && attempt < self.max_attempts
    }
}

/// Settings for [`EventClient`](super::EventClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Event server base URL, e.g. `http://localhost:5000`
    pub url: String,
    /// Transports to try on every attempt, in order
    pub transports: Vec<TransportKind>,
    pub reconnect: ReconnectConfig,
    /// Bound on opening a transport and joining the namespace
    pub connect_timeout: Duration,
    /// Re-send the `connect` room key after an automatic reconnect
    pub rejoin_room_on_reconnect: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SOCKET_URL)
    }
}

impl RealtimeConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            transports: vec![TransportKind::WebSocket, TransportKind::Polling],
            reconnect: ReconnectConfig::default(),
            connect_timeout: Duration::from_secs(20),
            rejoin_room_on_reconnect: true,
        }
    }

    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self::new(config.socket_url.clone())
    }

    pub fn with_transports(mut self, transports: Vec<TransportKind>) -> Self {
        self.transports = transports;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_rejoin_room_on_reconnect(mut self, rejoin: bool) -> Self {
        self.rejoin_room_on_reconnect = rejoin;
        self
    }
}

/// Shared connection state with a generation guard.
///
/// Each `connect` starts a new generation; a connection loop only publishes
/// state and dispatches events while its generation is current, so a loop
/// that is still winding down after `disconnect` cannot overwrite the state
/// of its replacement.
#[derive(Clone)]
pub(crate) struct StateCell {
    inner: Arc<Mutex<u64>>,
    tx: Arc<watch::Sender<ConnectionState>>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Mutex::new(0)),
            tx: Arc::new(tx),
        }
    }

    /// Start a new generation and hand out its reporter.
    pub(crate) fn begin(&self) -> StateReporter {
        let mut generation = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *generation += 1;
        self.tx.send_replace(ConnectionState::Connecting);
        StateReporter {
            cell: self.clone(),
            generation: *generation,
        }
    }

    /// Retire the current generation and mark the client disconnected.
    pub(crate) fn invalidate(&self) {
        let mut generation = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *generation += 1;
        self.tx.send_replace(ConnectionState::Disconnected);
    }

    pub(crate) fn current(&self) -> ConnectionState {
        self.tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }
}

pub(crate) struct StateReporter {
    cell: StateCell,
    generation: u64,
}

impl StateReporter {
    fn is_current(&self) -> bool {
        *self.cell.inner.lock().unwrap_or_else(PoisonError::into_inner) == self.generation
    }

    fn set(&self, state: ConnectionState) {
        let generation = self.cell.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if *generation == self.generation {
            crate::log_debug!("Connection state -> {:?}", state);
            self.cell.tx.send_replace(state);
        }
    }
}

/// Commands from the client handle to the connection loop
#[derive(Debug)]
pub(crate) enum Command {
    Emit(SocketPacket),
    Close,
}

/// Why a connected session ended
#[derive(Debug, PartialEq)]
enum SessionEnd {
    ClosedByClient,
    ServerDisconnect,
    TransportLost(String),
}

enum Flow {
    Continue,
    End(SessionEnd),
}

/// The background connection loop owning one logical connection.
pub(crate) struct ConnectionLoop {
    config: RealtimeConfig,
    http: reqwest::Client,
    registry: Arc<HandlerRegistry>,
    state: StateReporter,
    commands: UnboundedReceiver<Command>,
    room: Option<String>,
    buffer: VecDeque<SocketPacket>,
    has_connected: bool,
}

impl ConnectionLoop {
    pub(crate) fn new(
        config: RealtimeConfig,
        http: reqwest::Client,
        registry: Arc<HandlerRegistry>,
        state: StateReporter,
        commands: UnboundedReceiver<Command>,
        room: Option<String>,
    ) -> Self {
        Self {
            config,
            http,
            registry,
            state,
            commands,
            room,
            buffer: VecDeque::new(),
            has_connected: false,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut attempt = 0u32;

        loop {
            if attempt == 0 {
                self.state.set(ConnectionState::Connecting);
            } else {
                self.state.set(ConnectionState::Reconnecting { attempt });
            }

            let Some(result) = self.connect_phase().await else {
                crate::log_info!("Connection attempt aborted by disconnect");
                return;
            };

            match result {
                Ok(link) => {
                    match self.run_session(link).await {
                        SessionEnd::ClosedByClient => return,
                        SessionEnd::ServerDisconnect => {
                            self.state.set(ConnectionState::Disconnected);
                            self.notify(events::DISCONNECT, Value::from("io server disconnect"));
                            return;
                        }
                        SessionEnd::TransportLost(reason) => {
                            crate::log_warn!("Socket disconnected: {}", reason);
                            self.notify(events::DISCONNECT, Value::from(reason));
                            if !self.config.reconnect.enabled {
                                self.state.set(ConnectionState::Disconnected);
                                return;
                            }
                            attempt = 1;
                            self.state.set(ConnectionState::Reconnecting { attempt });
                            if !self.pause(self.config.reconnect.delay_for_attempt(attempt)).await {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    crate::log_error!("Socket connection error: {}", e);
                    self.notify(events::CONNECT_ERROR, Value::from(e.to_string()));

                    if !self.config.reconnect.allows(attempt) {
                        let reason = if self.config.reconnect.enabled {
                            format!(
                                "Max reconnect attempts ({}) exceeded",
                                self.config.reconnect.max_attempts
                            )
                        } else {
                            e.to_string()
                        };
                        crate::log_error!("Giving up on event server: {}", reason);
                        if !self.buffer.is_empty() {
                            crate::log_warn!("Dropping {} unsent emits", self.buffer.len());
                        }
                        self.state.set(ConnectionState::Failed { reason });
                        if self.config.reconnect.enabled {
                            self.notify(events::RECONNECT_FAILED, Value::Null);
                        }
                        return;
                    }

                    attempt += 1;
                    let delay = self.config.reconnect.delay_for_attempt(attempt);
                    crate::log_info!("Reconnecting in {}ms (attempt {})", delay.as_millis(), attempt);
                    if !self.pause(delay).await {
                        return;
                    }
                }
            }
        }
    }

    /// Try every transport in order while buffering emits.
    ///
    /// Returns `None` if the client disconnected meanwhile.
    async fn connect_phase(&mut self) -> Option<Result<TransportLink, TransportError>> {
        let Self {
            config,
            http,
            commands,
            buffer,
            ..
        } = self;

        let connecting = establish(config, http);
        tokio::pin!(connecting);

        loop {
            tokio::select! {
                biased;
                cmd = commands.next() => match cmd {
                    Some(Command::Emit(packet)) => buffer.push_back(packet),
                    Some(Command::Close) | None => return None,
                },
                result = &mut connecting => return Some(result),
            }
        }
    }

    /// Sleep between attempts. Returns `false` if the client disconnected meanwhile.
    async fn pause(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                cmd = self.commands.next() => match cmd {
                    Some(Command::Emit(packet)) => self.buffer.push_back(packet),
                    Some(Command::Close) | None => return false,
                },
                _ = &mut sleep => return true,
            }
        }
    }

    async fn run_session(&mut self, link: TransportLink) -> SessionEnd {
        let reconnected = self.has_connected;
        self.has_connected = true;
        self.state.set(ConnectionState::Connected);
        crate::log_info!(
            "Socket connected: {} via {}",
            link.handshake().sid,
            link.kind()
        );
        self.notify(events::CONNECT, Value::Null);

        if let Some(room) = self.room.clone() {
            if !reconnected || self.config.rejoin_room_on_reconnect {
                self.buffer
                    .push_front(SocketPacket::event(events::JOIN_ROOM, Some(Value::from(room))));
            }
        }

        while let Some(packet) = self.buffer.pop_front() {
            if link.send(EnginePacket::socket(&packet)).is_err() {
                self.buffer.push_front(packet);
                return SessionEnd::TransportLost("transport closed".into());
            }
        }

        self.drive(link).await
    }

    async fn drive(&mut self, mut link: TransportLink) -> SessionEnd {
        let heartbeat = Duration::from_millis(link.handshake().heartbeat_deadline_ms());
        let mut deadline = Instant::now() + heartbeat;

        loop {
            tokio::select! {
                biased;
                cmd = self.commands.next() => match cmd {
                    Some(Command::Emit(packet)) => {
                        if link.send(EnginePacket::socket(&packet)).is_err() {
                            self.buffer.push_back(packet);
                            return SessionEnd::TransportLost("transport closed".into());
                        }
                    }
                    Some(Command::Close) | None => {
                        link.close(vec![EnginePacket::socket(&SocketPacket::disconnect())]).await;
                        return SessionEnd::ClosedByClient;
                    }
                },
                incoming = link.recv() => match incoming {
                    Some(Ok(packet)) => {
                        deadline = Instant::now() + heartbeat;
                        if let Flow::End(end) = self.handle_packet(&link, packet) {
                            return end;
                        }
                    }
                    Some(Err(e)) => return SessionEnd::TransportLost(e.to_string()),
                    None => return SessionEnd::TransportLost("transport closed".into()),
                },
                _ = tokio::time::sleep_until(deadline) => {
                    return SessionEnd::TransportLost("ping timeout".into());
                }
            }
        }
    }

    fn handle_packet(&self, link: &TransportLink, packet: EnginePacket) -> Flow {
        match packet {
            EnginePacket::Ping(data) => {
                if link.send(EnginePacket::Pong(data)).is_err() {
                    return Flow::End(SessionEnd::TransportLost("transport closed".into()));
                }
            }
            EnginePacket::Close => {
                return Flow::End(SessionEnd::TransportLost("transport close".into()));
            }
            EnginePacket::Message(text) => match SocketPacket::decode(&text) {
                Ok(packet) => return self.handle_socket_packet(packet),
                Err(e) => crate::log_warn!("Ignoring malformed packet '{}': {}", text, e),
            },
            EnginePacket::Open(_) | EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {}
        }
        Flow::Continue
    }

    fn handle_socket_packet(&self, packet: SocketPacket) -> Flow {
        if packet.namespace() != DEFAULT_NAMESPACE {
            crate::log_debug!("Ignoring packet for namespace {}", packet.namespace());
            return Flow::Continue;
        }

        match packet {
            SocketPacket::Event { id, name, args, .. } => {
                if id.is_some() {
                    crate::log_debug!("Event '{}' requested an ack; acks are not supported", name);
                }
                let payload = args.into_iter().next().unwrap_or(Value::Null);
                self.notify(&name, payload);
            }
            SocketPacket::Disconnect { .. } => return Flow::End(SessionEnd::ServerDisconnect),
            SocketPacket::ConnectError { .. } => {
                let reason = packet.error_message().unwrap_or_default();
                crate::log_error!("Socket connection error: {}", reason);
                self.notify(events::CONNECT_ERROR, Value::from(reason));
            }
            SocketPacket::Connect { .. } | SocketPacket::Ack { .. } => {}
        }
        Flow::Continue
    }

    /// Dispatch to registered handlers unless this loop has been superseded.
    fn notify(&self, event: &str, payload: Value) {
        if self.state.is_current() {
            self.registry.dispatch(event, &payload);
        }
    }
}

/// Open the first transport that works and join the default namespace.
async fn establish(
    config: &RealtimeConfig,
    http: &reqwest::Client,
) -> Result<TransportLink, TransportError> {
    let mut last_error = TransportError::NoTransports;

    for kind in &config.transports {
        match transport::open(*kind, &config.url, http, config.connect_timeout).await {
            Ok(mut link) => {
                return match tokio::time::timeout(config.connect_timeout, join_namespace(&mut link))
                    .await
                {
                    Ok(Ok(())) => Ok(link),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(TransportError::Timeout),
                };
            }
            Err(e) => {
                crate::log_warn!("{} transport unavailable: {}", kind, e);
                last_error = e;
            }
        }
    }

    Err(last_error)
}

/// Send CONNECT for the default namespace and wait for the server's answer.
async fn join_namespace(link: &mut TransportLink) -> Result<(), TransportError> {
    link.send(EnginePacket::socket(&SocketPacket::connect()))?;

    loop {
        match link.recv().await {
            Some(Ok(EnginePacket::Message(text))) => match SocketPacket::decode(&text)? {
                SocketPacket::Connect { .. } => return Ok(()),
                packet @ SocketPacket::ConnectError { .. } => {
                    return Err(TransportError::Refused(
                        packet.error_message().unwrap_or_default(),
                    ));
                }
                other => crate::log_debug!("Ignoring {:?} before namespace connect", other),
            },
            Some(Ok(EnginePacket::Ping(data))) => link.send(EnginePacket::Pong(data))?,
            Some(Ok(EnginePacket::Close)) | None => return Err(TransportError::Closed),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e),
        }
    }
}
