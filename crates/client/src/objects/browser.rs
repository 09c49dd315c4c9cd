//! Browser proxy.

use std::sync::Arc;

use drover_runtime::remote_object::private;
use drover_runtime::{
    Channel, EventRouter, ListenerId, ListenerSet, ObjectInit, RemoteObject, RemoteObjectBase,
    Result, Scope,
};
use serde::Deserialize;
use serde_json::Value;

use super::{GuidRef, Page, resolve_object};

/// A running browser instance.
///
/// A browser anchors its own scope: its pages and their frames live in a
/// subtree that is torn down wholesale when the driver disposes the
/// browser.
pub struct Browser {
    base: RemoteObjectBase,
    router: EventRouter,
    close_listeners: Arc<ListenerSet<()>>,
}

#[derive(Debug, Deserialize)]
struct NewPageResponse {
    page: GuidRef,
}

impl Browser {
    pub(crate) fn construct(init: ObjectInit) -> Result<Arc<dyn RemoteObject>> {
        let scope = init.scope.create_child(init.guid.clone());

        let close_listeners = Arc::new(ListenerSet::new());
        let router = {
            let close = Arc::clone(&close_listeners);
            EventRouter::new().route("close", move |_params| {
                close.emit(&());
                Ok(())
            })
        };

        Ok(Arc::new(Self {
            base: RemoteObjectBase::new(ObjectInit { scope, ..init }, "Browser"),
            router,
            close_listeners,
        }))
    }

    /// Opens a new page and returns its proxy.
    pub async fn new_page(&self) -> Result<Arc<Page>> {
        let response: NewPageResponse = self
            .base
            .channel()
            .call("newPage", serde_json::json!({}), crate::DEFAULT_CALL_TIMEOUT)
            .await?;
        resolve_object(&self.base.connection(), &response.page.guid, "Page").await
    }

    /// Closes the browser on the driver side. The driver answers with a
    /// `__dispose__` that retires this proxy and everything beneath it.
    pub async fn close(&self) -> Result<()> {
        self.base
            .channel()
            .call_no_result("close", serde_json::json!({}), crate::DEFAULT_CALL_TIMEOUT)
            .await
    }

    /// Subscribes to the browser's close event.
    pub fn on_close(&self, listener: impl Fn(&()) + Send + Sync + 'static) -> ListenerId {
        self.close_listeners.subscribe(listener)
    }

    pub fn remove_close_listener(&self, id: ListenerId) {
        self.close_listeners.unsubscribe(id);
    }
}

impl private::Sealed for Browser {}

impl RemoteObject for Browser {
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

    fn dispatch(&self, method: &str, params: Value) -> Result<()> {
        self.router.dispatch(method, params)
    }
}
