//! The real-time event client handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_channel::mpsc::{unbounded, UnboundedSender};
use serde::de::DeserializeOwned;
use serde_json::Value;
use stockmaster_shared::{events, SocketPacket};
use tokio::runtime::Handle;
use tokio::sync::watch;

use super::connection::{Command, ConnectionLoop, ConnectionState, RealtimeConfig, StateCell};
use super::registry::{Handler, HandlerRegistry, Subscription};
use crate::config::ClientConfig;

/// Sender half of the live connection loop
struct ActiveConnection {
    commands: UnboundedSender<Command>,
}

struct Inner {
    config: RealtimeConfig,
    http: reqwest::Client,
    registry: Arc<HandlerRegistry>,
    state: StateCell,
    connection: Mutex<Option<ActiveConnection>>,
}

impl Inner {
    fn connection(&self) -> MutexGuard<'_, Option<ActiveConnection>> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(active) = self.connection().take() {
            self.state.invalidate();
            let _ = active.commands.unbounded_send(Command::Close);
        }
    }
}

/// Client for the inventory event server.
///
/// Cheap to clone; clones share one connection and one handler registry.
/// Handlers registered with [`on`](Self::on) survive `disconnect` and
/// `connect` and are active for every connection the client makes.
#[derive(Clone)]
pub struct EventClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EventClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventClient")
            .field("url", &self.inner.config.url)
            .field("state", &self.inner.state.current())
            .field("registry", &self.inner.registry)
            .finish()
    }
}

impl EventClient {
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                http: reqwest::Client::new(),
                registry: Arc::new(HandlerRegistry::new()),
                state: StateCell::new(),
                connection: Mutex::new(None),
            }),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(RealtimeConfig::from_client_config(config))
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.inner.config
    }

    /// Open the connection, joining `room` once connected.
    ///
    /// Does nothing if already connected. A connection that is still being
    /// established is replaced, so at most one connection exists. Must be
    /// called from within a tokio runtime.
    pub fn connect(&self, room: Option<&str>) {
        if self.is_connected() {
            crate::log_info!("Socket already connected");
            return;
        }

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                crate::log_error!("Cannot connect without a tokio runtime: {}", e);
                return;
            }
        };

        let mut connection = self.inner.connection();
        if let Some(previous) = connection.take() {
            crate::log_debug!("Replacing pending connection");
            let _ = previous.commands.unbounded_send(Command::Close);
        }

        let (tx, rx) = unbounded();
        let reporter = self.inner.state.begin();
        crate::log_info!("Connecting to event server at {}", self.inner.config.url);

        let task = ConnectionLoop::new(
            self.inner.config.clone(),
            self.inner.http.clone(),
            self.inner.registry.clone(),
            reporter,
            rx,
            room.map(str::to_string),
        );
        runtime.spawn(task.run());

        *connection = Some(ActiveConnection { commands: tx });
    }

    /// Close the connection. Registered handlers are kept.
    pub fn disconnect(&self) {
        let was_connected = self.is_connected();

        let active = self.inner.connection().take();
        let Some(active) = active else {
            return;
        };

        self.inner.state.invalidate();
        let _ = active.commands.unbounded_send(Command::Close);
        crate::log_info!("Socket disconnected");

        if was_connected {
            self.inner
                .registry
                .dispatch(events::DISCONNECT, &Value::from("io client disconnect"));
        }
    }

    /// Register `handler` for `event`. Each call adds a new registration.
    pub fn on<F>(&self, event: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        self.inner.registry.add(event, handler)
    }

    /// Register a handler that receives the payload decoded as `T`.
    ///
    /// Payloads that do not decode are logged and skipped.
    pub fn on_event<T, F>(&self, event: &str, handler: F) -> Subscription
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let name = event.to_string();
        self.on(event, move |payload: &Value| {
            match serde_json::from_value::<T>(payload.clone()) {
                Ok(value) => handler(value),
                Err(e) => crate::log_warn!("Could not decode '{}' payload: {}", name, e),
            }
        })
    }

    /// Remove one registration, or every handler for `event` when `subscription` is `None`.
    ///
    /// Returns how many handlers were removed.
    pub fn off(&self, event: &str, subscription: Option<&Subscription>) -> usize {
        match subscription {
            Some(subscription) => usize::from(self.inner.registry.remove(event, subscription)),
            None => self.inner.registry.remove_all(event),
        }
    }

    /// Send `event` with an optional payload.
    ///
    /// While a connection is being established or re-established the event is
    /// queued and sent once connected. Without a connection it is dropped.
    pub fn emit(&self, event: &str, payload: Option<Value>) {
        if events::is_reserved(event) {
            crate::log_warn!("'{}' is a reserved event name and cannot be emitted", event);
            return;
        }

        let state = self.state();
        if !state.is_connected() && !state.is_connecting() {
            crate::log_warn!("Socket not connected. Cannot emit: {}", event);
            return;
        }

        let connection = self.inner.connection();
        let sent = connection.as_ref().is_some_and(|active| {
            active
                .commands
                .unbounded_send(Command::Emit(SocketPacket::event(event, payload)))
                .is_ok()
        });
        if !sent {
            crate::log_warn!("Socket not connected. Cannot emit: {}", event);
        }
    }

    pub fn join_room(&self, room: &str) {
        self.emit(events::JOIN_ROOM, Some(Value::from(room)));
    }

    pub fn leave_room(&self, room: &str) {
        self.emit(events::LEAVE_ROOM, Some(Value::from(room)));
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.current()
    }

    /// Watch connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.inner.registry
    }
}
