//! Core runtime for driving an external automation driver over stdio.
//!
//! This crate provides the machinery underneath the public client API:
//!
//! - [`transport`]: length-prefixed JSON framing over the driver's pipes
//! - [`driver`]: driver process launch and deterministic shutdown
//! - [`connection`]: request/response correlation, event dispatch, and
//!   fatal-close propagation
//! - [`scope`]: hierarchical scopes with cascading teardown
//! - [`object_store`]: the per-connection arena of live proxies
//! - [`channel`]: the typed call proxy each remote object holds
//! - [`events`]: listener sets and per-object event routing
//!
//! Most users should depend on the client crate instead, which builds the
//! typed object model on top of these pieces.

pub mod channel;
pub mod connection;
pub mod driver;
pub mod error;
pub mod events;
pub mod factory;
pub mod message;
pub mod object_store;
pub mod remote_object;
pub mod scope;
pub mod transport;

pub use channel::Channel;
pub use connection::{Connection, ConnectionHandle};
pub use driver::DriverProcess;
pub use error::{Error, Result};
pub use events::{EventRouter, ListenerId, ListenerSet};
pub use factory::{Constructor, ConstructorTable, ObjectInit};
pub use remote_object::{RemoteObject, RemoteObjectBase};
pub use scope::Scope;
pub use transport::{PipeTransport, TransportParts, TransportReceiver, TransportSender};
