//! The root object of the driver's object graph.

use std::sync::Arc;

use drover_runtime::remote_object::private;
use drover_runtime::{Channel, ObjectInit, RemoteObject, RemoteObjectBase, Result, Scope};
use serde::Deserialize;
use serde_json::Value;

use super::{Browser, GuidRef, resolve_object};

/// The driver's root object, announced once at startup.
///
/// All top-level operations hang off it; everything else in the graph is a
/// descendant.
pub struct DriverRoot {
    base: RemoteObjectBase,
}

#[derive(Debug, Deserialize)]
struct LaunchBrowserResponse {
    browser: GuidRef,
}

impl DriverRoot {
    pub(crate) fn construct(init: ObjectInit) -> Result<Arc<dyn RemoteObject>> {
        Ok(Arc::new(Self {
            base: RemoteObjectBase::new(init, "DriverRoot"),
        }))
    }

    /// Launches a browser and returns its proxy.
    pub async fn launch_browser(&self) -> Result<Arc<Browser>> {
        let response: LaunchBrowserResponse = self
            .base
            .channel()
            .call("launchBrowser", serde_json::json!({}), crate::DEFAULT_CALL_TIMEOUT)
            .await?;
        resolve_object(&self.base.connection(), &response.browser.guid, "Browser").await
    }
}

impl private::Sealed for DriverRoot {}

impl RemoteObject for DriverRoot {
    fn guid(&self) -> &str {
        self.base.guid()
    }

    fn type_name(&self) -> &str {
        self.base.type_name()
    }

    fn scope(&self) -> Arc<Scope> {
        self.base.scope()
    }

    fn channel(&self) -> &Channel {
        self.base.channel()
    }

    fn dispatch(&self, method: &str, _params: Value) -> Result<()> {
        tracing::debug!(method, "unrecognized root event (ignored)");
        Ok(())
    }
}
