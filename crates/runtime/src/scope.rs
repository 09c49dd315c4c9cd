//! Hierarchical scopes for cascading teardown of the remote-object graph.
//!
//! Scopes form a tree rooted at the connection. Every proxy is registered
//! into the scope of its creation event's target (or the root when the
//! target is unknown); proxy kinds that own a subtree (a browser and its
//! pages) create a child scope. Tearing down a scope unregisters every
//! object and sub-scope beneath it and never fails: teardown of an
//! already-absent GUID is a no-op.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;

use crate::connection::{Connection, ConnectionHandle};
use crate::error::{Error, Result};
use crate::factory::ObjectInit;
use crate::remote_object::RemoteObject;

/// One node in the scope tree.
pub struct Scope {
    guid: Arc<str>,
    parent: Option<Weak<Scope>>,
    connection: Weak<Connection>,
    children: Mutex<HashMap<Arc<str>, Arc<Scope>>>,
    objects: Mutex<HashSet<Arc<str>>>,
    torn_down: AtomicBool,
}

impl Scope {
    /// Creates the root scope. Called once per connection.
    pub(crate) fn root(connection: Weak<Connection>) -> Arc<Self> {
        Arc::new(Self {
            guid: Arc::from(""),
            parent: None,
            connection,
            children: Mutex::new(HashMap::new()),
            objects: Mutex::new(HashSet::new()),
            torn_down: AtomicBool::new(false),
        })
    }

    /// Returns the GUID this scope is anchored to (empty at the root).
    pub fn guid(&self) -> &str {
        &self.guid
    }

    /// Returns the parent scope, absent at the root.
    pub fn parent(&self) -> Option<Arc<Scope>> {
        self.parent.as_ref().and_then(|p| p.upgrade())
    }

    /// Creates a sub-scope anchored to `guid`.
    pub fn create_child(self: &Arc<Self>, guid: Arc<str>) -> Arc<Scope> {
        let child = Arc::new(Scope {
            guid: guid.clone(),
            parent: Some(Arc::downgrade(self)),
            connection: self.connection.clone(),
            children: Mutex::new(HashMap::new()),
            objects: Mutex::new(HashSet::new()),
            torn_down: AtomicBool::new(false),
        });
        self.children.lock().insert(guid, child.clone());
        child
    }

    /// Instantiates a proxy announced by the driver and registers it in
    /// this scope and in the connection's registry, waking any caller
    /// waiting for the GUID to appear.
    pub fn create_remote_object(
        self: &Arc<Self>,
        type_tag: &str,
        guid: Arc<str>,
        initializer: Value,
    ) -> Result<Arc<dyn RemoteObject>> {
        let connection = self.connection.upgrade().ok_or_else(|| {
            Error::ConnectionClosed {
                reason: "connection dropped".to_string(),
            }
        })?;

        let init = ObjectInit {
            guid: guid.clone(),
            scope: Arc::clone(self),
            connection: connection.clone() as Arc<dyn ConnectionHandle>,
            initializer,
        };
        let object = connection.constructors().construct(type_tag, init)?;

        self.objects.lock().insert(guid.clone());
        // Last: the arena insert wakes wait_for_object callers, which must
        // observe a fully registered proxy.
        connection.store().insert(guid, object.clone());

        tracing::debug!(
            type_tag,
            guid = object.guid(),
            scope = %self.guid,
            "created remote object"
        );

        Ok(object)
    }

    /// Unregisters one owned object from this scope and the registry.
    pub fn release(&self, guid: &str) {
        let key: Arc<str> = Arc::from(guid);
        self.objects.lock().remove(&key);
        if let Some(connection) = self.connection.upgrade() {
            connection.store().remove(guid);
        }
    }

    /// Recursively tears down child scopes, then unregisters every owned
    /// object. Idempotent; never fails.
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let children: Vec<Arc<Scope>> = self.children.lock().drain().map(|(_, c)| c).collect();
        for child in children {
            child.teardown();
        }

        let owned: Vec<Arc<str>> = self.objects.lock().drain().collect();
        if let Some(connection) = self.connection.upgrade() {
            for guid in &owned {
                connection.store().remove(guid);
            }
        }

        if let Some(parent) = self.parent() {
            parent.children.lock().remove(&self.guid);
        }

        tracing::debug!(scope = %self.guid, objects = owned.len(), "scope torn down");
    }
}
