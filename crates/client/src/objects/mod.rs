//! Typed proxies for the driver's object graph.

use std::sync::Arc;

use drover_runtime::{ConnectionHandle, Error, RemoteObject, Result};
use serde::Deserialize;

pub mod browser;
pub mod driver_root;
pub mod frame;
pub mod page;

pub use browser::Browser;
pub use driver_root::DriverRoot;
pub use frame::{Frame, NavigatedEvent};
pub use page::{ConsoleMessage, Page};

/// A GUID reference embedded in a response or initializer payload.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GuidRef {
    pub guid: String,
}

/// Resolves a GUID reference to its typed proxy, waiting out the race
/// between a response payload and the `__create__` event it references.
pub(crate) async fn resolve_object<T: RemoteObject>(
    connection: &Arc<dyn ConnectionHandle>,
    guid: &str,
    expected: &str,
) -> Result<Arc<T>> {
    let object = connection
        .wait_for_object(guid, crate::DEFAULT_CALL_TIMEOUT)
        .await?;
    object
        .downcast_arc::<T>()
        .map_err(|_| Error::Protocol(format!("object \"{guid}\" is not a {expected}")))
}
