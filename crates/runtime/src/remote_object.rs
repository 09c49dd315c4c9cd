//! RemoteObject - base trait for all remote-object proxies.
//!
//! A proxy is the local stand-in for one driver-side object: it forwards
//! calls through its [`Channel`] and receives events through its dispatch
//! hook. Exactly one proxy exists per GUID, created only in response to an
//! observed `__create__` event, never speculatively.

use std::sync::Arc;

use downcast_rs::{DowncastSync, impl_downcast};
use serde_json::Value;

use crate::channel::Channel;
use crate::connection::ConnectionHandle;
use crate::error::Result;
use crate::factory::ObjectInit;
use crate::scope::Scope;

/// Private module for the sealed trait pattern.
pub mod private {
    /// Marker trait that seals `RemoteObject`.
    pub trait Sealed {}
}

/// Base trait for all remote-object proxies.
pub trait RemoteObject: private::Sealed + DowncastSync {
    /// Returns the unique GUID for this object.
    fn guid(&self) -> &str;

    /// Returns the protocol type tag (e.g., "Browser", "Page").
    fn type_name(&self) -> &str;

    /// Returns the scope this object's children are registered into.
    fn scope(&self) -> Arc<Scope>;

    /// Returns the channel for driver calls.
    fn channel(&self) -> &Channel;

    /// Handles a driver event addressed to this object.
    ///
    /// Invoked only by the connection's dispatch loop. Unknown methods must
    /// be ignored; an error return is a protocol violation and closes the
    /// connection.
    fn dispatch(&self, method: &str, params: Value) -> Result<()>;
}

impl_downcast!(sync RemoteObject);

/// Base state shared by all proxy kinds, embedded by composition.
pub struct RemoteObjectBase {
    guid: Arc<str>,
    type_name: &'static str,
    scope: Arc<Scope>,
    connection: Arc<dyn ConnectionHandle>,
    channel: Channel,
    initializer: Value,
}

impl RemoteObjectBase {
    /// Builds the base from a creation event's [`ObjectInit`].
    pub fn new(init: ObjectInit, type_name: &'static str) -> Self {
        let channel = Channel::new(init.guid.clone(), Arc::clone(&init.connection));
        Self {
            guid: init.guid,
            type_name,
            scope: init.scope,
            connection: init.connection,
            channel,
            initializer: init.initializer,
        }
    }

    pub fn guid(&self) -> &str {
        &self.guid
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn scope(&self) -> Arc<Scope> {
        Arc::clone(&self.scope)
    }

    pub fn connection(&self) -> Arc<dyn ConnectionHandle> {
        Arc::clone(&self.connection)
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Raw initializer JSON from the creation event.
    pub fn initializer(&self) -> &Value {
        &self.initializer
    }
}
