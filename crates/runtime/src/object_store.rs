//! Connection-owned arena of remote objects keyed by GUID.
//!
//! Uses [`DashMap`] for lock-free concurrent access. Per-GUID [`Notify`]
//! ensures only relevant waiters wake up, and [`ObjectStore::wait_for`]
//! registers waiters before checking to prevent lost wakeups. Removed GUIDs
//! move to a retired set so late events for torn-down objects can be told
//! apart from events for objects that never existed.

use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::remote_object::RemoteObject;

/// Thread-safe registry of remote objects by GUID.
pub struct ObjectStore {
    objects: DashMap<Arc<str>, Arc<dyn RemoteObject>>,
    retired: DashSet<Arc<str>>,
    waiters: DashMap<Arc<str>, Arc<Notify>>,
    close_reason: Mutex<Option<String>>,
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            retired: DashSet::new(),
            waiters: DashMap::new(),
            close_reason: Mutex::new(None),
        }
    }

    /// Inserts an object and wakes any waiters for this GUID.
    pub fn insert(&self, guid: Arc<str>, object: Arc<dyn RemoteObject>) {
        self.objects.insert(guid.clone(), object);
        if let Some((_, notify)) = self.waiters.remove(&guid) {
            notify.notify_waiters();
        }
    }

    /// Removes an object, retiring its GUID.
    pub fn remove(&self, guid: &str) {
        let key: Arc<str> = Arc::from(guid);
        if self.objects.remove(&key).is_some() {
            self.retired.insert(key);
        }
    }

    /// Synchronous lookup.
    pub fn try_get(&self, guid: &str) -> Option<Arc<dyn RemoteObject>> {
        let key: Arc<str> = Arc::from(guid);
        self.objects.get(&key).map(|r| r.value().clone())
    }

    /// Returns true if this GUID was registered once and has since been
    /// removed.
    pub fn was_retired(&self, guid: &str) -> bool {
        let key: Arc<str> = Arc::from(guid);
        self.retired.contains(&key)
    }

    /// Fails all pending and future waits with [`Error::ConnectionClosed`].
    pub fn close(&self, reason: &str) {
        {
            let mut stored = self.close_reason.lock();
            if stored.is_none() {
                *stored = Some(reason.to_string());
            }
        }
        for entry in self.waiters.iter() {
            entry.value().notify_waiters();
        }
    }

    /// Waits for an object to be registered, with timeout.
    ///
    /// Registers the waiter before checking to prevent lost wakeups. Fails
    /// with [`Error::ConnectionClosed`] once the store is closed and
    /// [`Error::Timeout`] at the deadline.
    pub async fn wait_for(&self, guid: &str, timeout: Duration) -> Result<Arc<dyn RemoteObject>> {
        let key: Arc<str> = Arc::from(guid);
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let notify = self
                .waiters
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Notify::new()))
                .clone();
            let notified = notify.notified();

            if let Some(reason) = self.close_reason.lock().clone() {
                return Err(Error::ConnectionClosed { reason });
            }

            if let Some(object) = self.objects.get(&key) {
                return Ok(object.value().clone());
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout(format!("Timeout waiting for object: {key}")));
            }

            tokio::select! {
                biased;
                _ = notified => {}
                _ = tokio::time::sleep(remaining) => {
                    return Err(Error::Timeout(format!("Timeout waiting for object: {key}")));
                }
            }
        }
    }
}
