//! Constructor table for remote-object proxies.
//!
//! The driver announces new objects by type tag; the table maps each tag of
//! the closed, statically known proxy set to a constructor. Unknown tags
//! are a hard protocol error, not a silent default.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::connection::ConnectionHandle;
use crate::error::{Error, Result};
use crate::remote_object::RemoteObject;
use crate::scope::Scope;

/// Everything a proxy constructor needs: the new object's GUID, the scope
/// it is created under, the owning connection, and the driver-supplied
/// initializer fields.
pub struct ObjectInit {
    pub guid: Arc<str>,
    pub scope: Arc<Scope>,
    pub connection: Arc<dyn ConnectionHandle>,
    pub initializer: Value,
}

/// A proxy constructor for one type tag.
pub type Constructor = fn(ObjectInit) -> Result<Arc<dyn RemoteObject>>;

/// Closed table from type tag to proxy constructor.
#[derive(Default)]
pub struct ConstructorTable {
    entries: HashMap<&'static str, Constructor>,
}

impl ConstructorTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registers a constructor for a type tag.
    ///
    /// # Panics
    ///
    /// Panics on a duplicate tag; the table is assembled once at startup
    /// from a statically known set, so a duplicate is a programming error.
    pub fn register(&mut self, type_tag: &'static str, constructor: Constructor) {
        let previous = self.entries.insert(type_tag, constructor);
        assert!(
            previous.is_none(),
            "duplicate constructor for type tag: {type_tag}"
        );
    }

    /// Constructs a proxy for the given type tag.
    pub fn construct(&self, type_tag: &str, init: ObjectInit) -> Result<Arc<dyn RemoteObject>> {
        match self.entries.get(type_tag) {
            Some(constructor) => constructor(init),
            None => Err(Error::UnknownObjectType(type_tag.to_string())),
        }
    }

    /// Returns true if a constructor is registered for this tag.
    pub fn contains(&self, type_tag: &str) -> bool {
        self.entries.contains_key(type_tag)
    }

    /// Registered type tags, for startup validation.
    pub fn type_tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }
}
