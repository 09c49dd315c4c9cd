//! Frame proxy.

use std::sync::Arc;

use drover_runtime::remote_object::private;
use drover_runtime::{
    Channel, EventRouter, ListenerId, ListenerSet, ObjectInit, RemoteObject, RemoteObjectBase,
    Result, Scope,
};
use serde::Deserialize;
use serde_json::Value;

/// Payload of a frame navigation event.
#[derive(Debug, Clone, Deserialize)]
pub struct NavigatedEvent {
    pub url: String,
}

/// One frame in a page's frame tree.
pub struct Frame {
    base: RemoteObjectBase,
    router: EventRouter,
    navigated_listeners: Arc<ListenerSet<NavigatedEvent>>,
}

impl Frame {
    pub(crate) fn construct(init: ObjectInit) -> Result<Arc<dyn RemoteObject>> {
        let navigated_listeners = Arc::new(ListenerSet::new());
        let router = {
            let navigated = Arc::clone(&navigated_listeners);
            EventRouter::new().route("navigated", move |params| {
                let event: NavigatedEvent = serde_json::from_value(params)?;
                navigated.emit(&event);
                Ok(())
            })
        };

        Ok(Arc::new(Self {
            base: RemoteObjectBase::new(init, "Frame"),
            router,
            navigated_listeners,
        }))
    }

    /// Navigates this frame to `url`.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.base
            .channel()
            .call_no_result(
                "navigate",
                serde_json::json!({ "url": url }),
                crate::DEFAULT_CALL_TIMEOUT,
            )
            .await
    }

    /// Subscribes to navigation events.
    pub fn on_navigated(
        &self,
        listener: impl Fn(&NavigatedEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.navigated_listeners.subscribe(listener)
    }

    pub fn remove_navigated_listener(&self, id: ListenerId) {
        self.navigated_listeners.unsubscribe(id);
    }
}

impl private::Sealed for Frame {}

impl RemoteObject for Frame {
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
