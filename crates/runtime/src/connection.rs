//! Connection layer: request/response correlation and event dispatch.
//!
//! The connection allocates monotonically increasing request ids, keeps a
//! table of pending calls, matches incoming responses to pending calls, and
//! routes incoming events to the owning remote object. It owns driver
//! process start, shutdown, and fatal-close propagation.
//!
//! # Message flow
//!
//! 1. A caller invokes [`Connection::send_request`] with GUID, method, and
//!    params.
//! 2. The connection allocates a unique id and registers a pending call.
//! 3. The request is queued on the write serializer: a single writer task
//!    drains the queue one message at a time, so requests hit the wire in
//!    submission order with no interleaving.
//! 4. The caller suspends on the pending call.
//! 5. The read loop delivers inbound frames in arrival order; responses
//!    complete pending calls by id, events go to the proxy's dispatch hook.
//!
//! A creation event is always processed before any later message that
//! references the new GUID, because one task drains the inbound stream in
//! order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::driver::DriverProcess;
use crate::error::{Error, Result, classify_driver_error};
use crate::factory::ConstructorTable;
use crate::message::{CREATE_METHOD, DISPOSE_METHOD, Event, Message, Request};
use crate::object_store::ObjectStore;
use crate::remote_object::RemoteObject;
use crate::scope::Scope;
use crate::transport::{TransportParts, TransportReceiver, TransportSender};

/// The narrow interface proxies use to talk to their connection.
pub trait ConnectionHandle: Send + Sync {
    /// Sends a method call and awaits the raw response payload.
    fn send_request(
        &self,
        guid: &str,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> BoxFuture<'_, Result<Value>>;

    /// Waits for an object to be registered.
    ///
    /// Needed when a response payload references a GUID whose `__create__`
    /// event races the response.
    fn wait_for_object(
        &self,
        guid: &str,
        timeout: Duration,
    ) -> BoxFuture<'_, Result<Arc<dyn RemoteObject>>>;

    /// Synchronous registry lookup.
    fn try_get_object(&self, guid: &str) -> Option<Arc<dyn RemoteObject>>;
}

/// Connection lifecycle. Monotonic: never reverses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Closing,
    Closed,
}

/// Connection to the driver process.
pub struct Connection {
    /// Request id allocator; ids are unique and strictly increasing for the
    /// lifetime of the connection.
    last_id: AtomicU32,
    /// Pending calls keyed by request id. At most one record per id.
    callbacks: Mutex<HashMap<u32, oneshot::Sender<Result<Value>>>>,
    /// Head of the write serializer queue.
    outbound_tx: mpsc::UnboundedSender<Value>,
    /// Tail of the write serializer queue (taken by `run`).
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Value>>>,
    /// Transport halves (taken by `run`).
    transport_sender: Mutex<Option<Box<dyn TransportSender>>>,
    transport_receiver: Mutex<Option<Box<dyn TransportReceiver>>>,
    /// Inbound message stream (taken by `run`).
    message_rx: Mutex<Option<mpsc::UnboundedReceiver<Value>>>,
    /// Arena of remote objects by GUID.
    store: ObjectStore,
    /// Root of the scope tree.
    root_scope: Arc<Scope>,
    /// Closed table of proxy constructors by type tag.
    constructors: ConstructorTable,
    state: Mutex<State>,
    close_reason: Mutex<Option<String>>,
    /// Driver process, terminated deterministically on close.
    process: Mutex<Option<DriverProcess>>,
}

/// Params of a `__create__` event.
#[derive(Debug, Deserialize)]
struct CreateParams {
    #[serde(rename = "type")]
    type_tag: String,
    guid: String,
    #[serde(default)]
    initializer: Value,
}

impl Connection {
    /// Creates a connection over the given transport with the given proxy
    /// constructor table.
    pub fn new(parts: TransportParts, constructors: ConstructorTable) -> Arc<Self> {
        let TransportParts {
            sender,
            receiver,
            message_rx,
        } = parts;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Arc::new_cyclic(|weak: &Weak<Connection>| Self {
            last_id: AtomicU32::new(0),
            callbacks: Mutex::new(HashMap::new()),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            transport_sender: Mutex::new(Some(sender)),
            transport_receiver: Mutex::new(Some(receiver)),
            message_rx: Mutex::new(Some(message_rx)),
            store: ObjectStore::new(),
            root_scope: Scope::root(weak.clone()),
            constructors,
            state: Mutex::new(State::Open),
            close_reason: Mutex::new(None),
            process: Mutex::new(None),
        })
    }

    /// Hands the driver process to the connection so shutdown can
    /// terminate it on every exit path.
    pub fn attach_process(&self, process: DriverProcess) {
        *self.process.lock() = Some(process);
    }

    /// Root of the scope tree.
    pub fn root_scope(&self) -> Arc<Scope> {
        Arc::clone(&self.root_scope)
    }

    pub(crate) fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub(crate) fn constructors(&self) -> &ConstructorTable {
        &self.constructors
    }

    /// Returns true once the connection has left the Open state.
    pub fn is_closed(&self) -> bool {
        *self.state.lock() != State::Open
    }

    fn close_reason(&self) -> String {
        self.close_reason
            .lock()
            .clone()
            .unwrap_or_else(|| "connection closed".to_string())
    }

    /// Sends a method call to the driver and awaits the response.
    ///
    /// On timeout the call fails locally with [`Error::Timeout`], but the
    /// request has already been written: the driver may still complete the
    /// operation, and its late response is dropped silently. No
    /// cancellation is sent upstream.
    pub async fn send_request(
        &self,
        guid: &str,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();

        // The state check and the registration share the callbacks lock:
        // close() flips the state before draining under the same lock, so a
        // call either gets refused here or its pending record is drained
        // and failed with the close reason. It can never be left to time
        // out.
        {
            let mut callbacks = self.callbacks.lock();
            if *self.state.lock() != State::Open {
                return Err(Error::ConnectionClosed {
                    reason: self.close_reason(),
                });
            }
            callbacks.insert(id, tx);
        }

        let request = Request {
            id,
            guid: Arc::from(guid),
            method: method.to_string(),
            params,
        };

        tracing::debug!(id, guid, method, "sending request");

        let value = match serde_json::to_value(&request) {
            Ok(value) => value,
            Err(e) => {
                self.callbacks.lock().remove(&id);
                return Err(e.into());
            }
        };

        if self.outbound_tx.send(value).is_err() {
            self.callbacks.lock().remove(&id);
            return Err(Error::ConnectionClosed {
                reason: self.close_reason(),
            });
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(Error::ConnectionClosed {
                reason: self.close_reason(),
            }),
            Err(_) => {
                self.callbacks.lock().remove(&id);
                Err(Error::Timeout(format!(
                    "Timeout {}ms exceeded awaiting response to \"{method}\"",
                    timeout.as_millis()
                )))
            }
        }
    }

    /// Waits for an object to be registered.
    pub async fn wait_for_object(
        &self,
        guid: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn RemoteObject>> {
        self.store.wait_for(guid, timeout).await
    }

    /// Synchronous registry lookup.
    pub fn try_get_object(&self, guid: &str) -> Option<Arc<dyn RemoteObject>> {
        self.store.try_get(guid)
    }

    /// Runs the connection: spawns the read loop and the write serializer,
    /// then dispatches inbound messages in arrival order until the
    /// transport closes or a protocol violation forces a close.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub async fn run(self: &Arc<Self>) {
        let mut receiver = self
            .transport_receiver
            .lock()
            .take()
            .expect("run() can only be called once - transport receiver already taken");

        let mut sender = self
            .transport_sender
            .lock()
            .take()
            .expect("run() can only be called once - transport sender already taken");

        let mut outbound_rx = self
            .outbound_rx
            .lock()
            .take()
            .expect("run() can only be called once - outbound receiver already taken");

        let mut message_rx = self
            .message_rx
            .lock()
            .take()
            .expect("run() can only be called once - message receiver already taken");

        let reader_handle = tokio::spawn(async move {
            if let Err(e) = receiver.run().await {
                tracing::warn!("transport read error: {e}");
            }
        });

        // The write serializer: one in-flight write at a time, strict FIFO.
        let writer_handle = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = sender.send(message).await {
                    tracing::warn!("transport write error: {e}");
                    break;
                }
            }
        });

        while let Some(value) = message_rx.recv().await {
            let message = match serde_json::from_value::<Message>(value) {
                Ok(message) => message,
                Err(e) => {
                    self.close(&format!("malformed message: {e}"));
                    break;
                }
            };
            if let Err(e) = self.dispatch(message) {
                tracing::error!("closing connection: {e}");
                self.close(&e.to_string());
                break;
            }
        }

        self.close("transport closed");
        reader_handle.abort();
        writer_handle.abort();
    }

    /// Dispatches one inbound message. An error return means the object
    /// graph can no longer be trusted; the caller closes the connection.
    fn dispatch(self: &Arc<Self>, message: Message) -> Result<()> {
        match message {
            Message::Response(response) => {
                let callback = self.callbacks.lock().remove(&response.id);
                let Some(callback) = callback else {
                    // Already resolved locally (timed out or closed); a
                    // late response is deliberately not an error.
                    tracing::debug!(id = response.id, "response for unknown id (ignored)");
                    return Ok(());
                };

                let outcome = match response.error {
                    Some(wrapper) => Err(classify_driver_error(&wrapper.error)),
                    None => Ok(response.result.unwrap_or(Value::Null)),
                };

                let _ = callback.send(outcome);
                Ok(())
            }
            Message::Event(event) => match event.method.as_str() {
                CREATE_METHOD => self.handle_create(&event),
                DISPOSE_METHOD => self.handle_dispose(&event),
                _ => match self.store.try_get(&event.guid) {
                    Some(object) => object.dispatch(&event.method, event.params),
                    None if self.store.was_retired(&event.guid) => {
                        tracing::debug!(
                            guid = %event.guid,
                            method = %event.method,
                            "event for retired object (dropped)"
                        );
                        Ok(())
                    }
                    None => Err(Error::Protocol(format!(
                        "event \"{}\" for unknown object: {}",
                        event.method, event.guid
                    ))),
                },
            },
            Message::Unknown(value) => {
                tracing::debug!(
                    "unknown message shape (ignored): {}",
                    serde_json::to_string(&value)
                        .unwrap_or_else(|_| "<serialization failed>".to_string())
                );
                Ok(())
            }
        }
    }

    /// Handles a `__create__` event: instantiate the announced proxy in the
    /// scope of the event's target, or the root scope when the target is
    /// empty or unknown.
    fn handle_create(self: &Arc<Self>, event: &Event) -> Result<()> {
        let params: CreateParams = serde_json::from_value(event.params.clone())
            .map_err(|e| Error::Protocol(format!("malformed __create__ params: {e}")))?;

        let scope = if event.guid.is_empty() {
            self.root_scope()
        } else {
            match self.store.try_get(&event.guid) {
                Some(object) => object.scope(),
                None => self.root_scope(),
            }
        };

        scope.create_remote_object(
            &params.type_tag,
            Arc::from(params.guid.as_str()),
            params.initializer,
        )?;
        Ok(())
    }

    /// Handles a `__dispose__` event: tear down the object's subtree (when
    /// it owns one) and retire it. Disposing an unknown GUID is a no-op.
    fn handle_dispose(&self, event: &Event) -> Result<()> {
        let Some(object) = self.store.try_get(&event.guid) else {
            tracing::debug!(guid = %event.guid, "dispose for unknown object (ignored)");
            return Ok(());
        };

        let scope = object.scope();
        if scope.guid() == object.guid() {
            // The object anchors its own scope: tear the subtree down
            // first, then drop the object from the scope that owns it.
            scope.teardown();
            match scope.parent() {
                Some(parent) => parent.release(object.guid()),
                None => self.store.remove(object.guid()),
            }
        } else {
            scope.release(object.guid());
        }
        Ok(())
    }

    /// Closes the connection. Idempotent.
    ///
    /// Fails every still-pending call with [`Error::ConnectionClosed`]
    /// carrying `reason` atomically, wakes all object waiters, terminates
    /// the driver process, and releases the transport.
    pub fn close(&self, reason: &str) {
        {
            let mut state = self.state.lock();
            if *state != State::Open {
                return;
            }
            // Reason first: anyone observing a non-Open state must find it
            // set.
            *self.close_reason.lock() = Some(reason.to_string());
            *state = State::Closing;
        }

        tracing::debug!(reason, "closing connection");

        // Drain under one lock so no call is left pending or resolved
        // twice.
        let pending: Vec<(u32, oneshot::Sender<Result<Value>>)> =
            self.callbacks.lock().drain().collect();
        for (_, callback) in pending {
            let _ = callback.send(Err(Error::ConnectionClosed {
                reason: reason.to_string(),
            }));
        }

        self.store.close(reason);

        if let Some(mut process) = self.process.lock().take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = process.shutdown().await {
                            tracing::debug!("driver shutdown error: {e}");
                        }
                    });
                }
                Err(_) => {
                    let _ = process.start_kill();
                }
            }
        }

        *self.state.lock() = State::Closed;
    }
}

impl ConnectionHandle for Connection {
    fn send_request(
        &self,
        guid: &str,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> BoxFuture<'_, Result<Value>> {
        let guid = guid.to_string();
        let method = method.to_string();
        Box::pin(async move { Connection::send_request(self, &guid, &method, params, timeout).await })
    }

    fn wait_for_object(
        &self,
        guid: &str,
        timeout: Duration,
    ) -> BoxFuture<'_, Result<Arc<dyn RemoteObject>>> {
        let guid = guid.to_string();
        Box::pin(async move { Connection::wait_for_object(self, &guid, timeout).await })
    }

    fn try_get_object(&self, guid: &str) -> Option<Arc<dyn RemoteObject>> {
        Connection::try_get_object(self, guid)
    }
}
