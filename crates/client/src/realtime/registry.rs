//! Handler registry: event name to an ordered list of subscribed handlers.
//!
//! The registry outlives every connection. A live connection dispatches
//! through it, so a handler added while connected is active at once and
//! every handler is active again after a reconnect.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

/// Callback invoked with an event's payload.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Token returned by `on`, identifying exactly one registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    event: String,
    id: u64,
}

impl Subscription {
    pub fn event(&self) -> &str {
        &self.event
    }
}

struct Entry {
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    handlers: HashMap<String, Vec<Entry>>,
}

#[derive(Default)]
pub struct HandlerRegistry {
    inner: Mutex<RegistryInner>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        let counts: HashMap<&str, usize> = inner
            .handlers
            .iter()
            .map(|(event, entries)| (event.as_str(), entries.len()))
            .collect();
        f.debug_struct("HandlerRegistry").field("handlers", &counts).finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        // Handlers never run under the lock, so a poisoned registry is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a handler for `event`.
    pub fn add(&self, event: &str, handler: Handler) -> Subscription {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner
            .handlers
            .entry(event.to_string())
            .or_default()
            .push(Entry { id, handler });
        Subscription {
            event: event.to_string(),
            id,
        }
    }

    /// Remove the registration identified by `subscription`.
    ///
    /// Returns `false` when it was already removed.
    pub fn remove(&self, event: &str, subscription: &Subscription) -> bool {
        if subscription.event != event {
            return false;
        }
        let mut inner = self.lock();
        let Some(entries) = inner.handlers.get_mut(event) else {
            return false;
        };
        let Some(index) = entries.iter().position(|e| e.id == subscription.id) else {
            return false;
        };
        entries.remove(index);
        if entries.is_empty() {
            inner.handlers.remove(event);
        }
        true
    }

    /// Remove every handler for `event`, returning how many were removed.
    pub fn remove_all(&self, event: &str) -> usize {
        self.lock()
            .handlers
            .remove(event)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    /// Handlers for `event` in registration order, detached from the live list.
    pub fn snapshot(&self, event: &str) -> Vec<Handler> {
        self.lock()
            .handlers
            .get(event)
            .map(|entries| entries.iter().map(|e| e.handler.clone()).collect())
            .unwrap_or_default()
    }

    /// Invoke every handler for `event` with `payload`, returning how many ran.
    ///
    /// Iterates over a snapshot taken before the first call, so handlers may
    /// subscribe or unsubscribe (including themselves) while being dispatched.
    /// A panicking handler is logged and does not stop the others.
    pub fn dispatch(&self, event: &str, payload: &Value) -> usize {
        let handlers = self.snapshot(event);
        for handler in &handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(payload))).is_err() {
                crate::log_error!("Handler for '{}' panicked", event);
            }
        }
        handlers.len()
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.lock().handlers.get(event).map(Vec::len).unwrap_or(0)
    }

    /// Event names with at least one handler.
    pub fn events(&self) -> Vec<String> {
        let mut events: Vec<String> = self.lock().handlers.keys().cloned().collect();
        events.sort();
        events
    }

    pub fn is_empty(&self) -> bool {
        self.lock().handlers.is_empty()
    }
}
