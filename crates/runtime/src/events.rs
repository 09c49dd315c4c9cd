//! Generic event plumbing for remote-object proxies.
//!
//! Two pieces: [`ListenerSet`] fans a typed payload out to local
//! subscribers, and [`EventRouter`] maps wire event method names to
//! decode-and-fan-out handlers per proxy kind, so adding an event type is a
//! local, additive change. Unknown method names are ignored for forward
//! compatibility; a malformed payload for a known method is an error.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::Result;

/// Handle to a registered listener, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A set of typed event listeners.
///
/// Subscription and unsubscription are safe concurrently with emission:
/// `emit` snapshots the subscriber list before invoking, so removing a
/// listener never affects an in-flight dispatch.
pub struct ListenerSet<T> {
    listeners: Mutex<Vec<(ListenerId, Listener<T>)>>,
    next_id: AtomicU64,
}

impl<T> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ListenerSet<T> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a listener and returns its id.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Removing an unknown id is a no-op.
    pub fn unsubscribe(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    /// Invokes every listener with the payload.
    pub fn emit(&self, payload: &T) {
        let snapshot: Vec<Listener<T>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(payload);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }
}

type Route = Box<dyn Fn(Value) -> Result<()> + Send + Sync>;

/// Maps wire event method names to typed decode+invoke handlers.
pub struct EventRouter {
    routes: HashMap<&'static str, Route>,
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Adds a handler for a method name. Builder-style.
    pub fn route(
        mut self,
        method: &'static str,
        handler: impl Fn(Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.routes.insert(method, Box::new(handler));
        self
    }

    /// Dispatches an event. Unknown methods are ignored, not fatal.
    pub fn dispatch(&self, method: &str, params: Value) -> Result<()> {
        match self.routes.get(method) {
            Some(handler) => handler(params),
            None => {
                tracing::debug!(method, "unrecognized event method (ignored)");
                Ok(())
            }
        }
    }
}
