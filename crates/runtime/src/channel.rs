//! Channel - typed call proxy for remote objects.
//!
//! Every remote-object proxy holds a Channel that forwards method calls to
//! the connection using the proxy's own GUID as the target, and decodes the
//! result payload into the caller's expected shape.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::connection::ConnectionHandle;
use crate::error::Result;

/// Call proxy bound to one remote object.
#[derive(Clone)]
pub struct Channel {
    guid: Arc<str>,
    connection: Arc<dyn ConnectionHandle>,
}

impl Channel {
    /// Creates a new Channel for the given object GUID.
    pub fn new(guid: Arc<str>, connection: Arc<dyn ConnectionHandle>) -> Self {
        Self { guid, connection }
    }

    /// Sends a method call to the driver and awaits the decoded response.
    pub async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
        timeout: Duration,
    ) -> Result<R> {
        let params_value = serde_json::to_value(params)?;
        let response = self
            .connection
            .send_request(&self.guid, method, params_value, timeout)
            .await?;
        serde_json::from_value(response).map_err(Into::into)
    }

    /// Sends a method call, discarding the result payload.
    pub async fn call_no_result<P: Serialize>(
        &self,
        method: &str,
        params: P,
        timeout: Duration,
    ) -> Result<()> {
        let _: Value = self.call(method, params, timeout).await?;
        Ok(())
    }

    /// Returns the GUID this channel represents.
    pub fn guid(&self) -> &str {
        &self.guid
    }

    /// Returns the connection this channel sends on.
    pub fn connection(&self) -> &Arc<dyn ConnectionHandle> {
        &self.connection
    }
}
