//! Page proxy.

use std::sync::Arc;

use drover_runtime::remote_object::private;
use drover_runtime::{
    Channel, Error, EventRouter, ListenerId, ListenerSet, ObjectInit, RemoteObject,
    RemoteObjectBase, Result, Scope,
};
use serde::Deserialize;
use serde_json::Value;

use super::{Frame, GuidRef, resolve_object};

/// A console line echoed from the page.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleMessage {
    /// Severity tag as reported by the page ("log", "warning", ...).
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// A single page (tab) inside a browser.
pub struct Page {
    base: RemoteObjectBase,
    router: EventRouter,
    load_listeners: Arc<ListenerSet<()>>,
    console_listeners: Arc<ListenerSet<ConsoleMessage>>,
    close_listeners: Arc<ListenerSet<()>>,
}

#[derive(Debug, Deserialize)]
struct PageInitializer {
    #[serde(rename = "mainFrame")]
    main_frame: Option<GuidRef>,
}

impl Page {
    pub(crate) fn construct(init: ObjectInit) -> Result<Arc<dyn RemoteObject>> {
        let load_listeners = Arc::new(ListenerSet::new());
        let console_listeners = Arc::new(ListenerSet::new());
        let close_listeners = Arc::new(ListenerSet::new());

        let router = {
            let load = Arc::clone(&load_listeners);
            let console = Arc::clone(&console_listeners);
            let close = Arc::clone(&close_listeners);
            EventRouter::new()
                .route("load", move |_params| {
                    load.emit(&());
                    Ok(())
                })
                .route("console", move |params| {
                    let message: ConsoleMessage = serde_json::from_value(params)?;
                    console.emit(&message);
                    Ok(())
                })
                .route("close", move |_params| {
                    close.emit(&());
                    Ok(())
                })
        };

        Ok(Arc::new(Self {
            base: RemoteObjectBase::new(init, "Page"),
            router,
            load_listeners,
            console_listeners,
            close_listeners,
        }))
    }

    /// The page's main frame, as referenced by its initializer.
    pub async fn main_frame(&self) -> Result<Arc<Frame>> {
        let initializer: PageInitializer =
            serde_json::from_value(self.base.initializer().clone())?;
        let frame = initializer
            .main_frame
            .ok_or_else(|| Error::Protocol("page initializer missing mainFrame".to_string()))?;
        resolve_object(&self.base.connection(), &frame.guid, "Frame").await
    }

    /// Navigates the page's main frame to `url`.
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

    /// Closes the page on the driver side.
    pub async fn close(&self) -> Result<()> {
        self.base
            .channel()
            .call_no_result("close", serde_json::json!({}), crate::DEFAULT_CALL_TIMEOUT)
            .await
    }

    /// Subscribes to the load event.
    pub fn on_load(&self, listener: impl Fn(&()) + Send + Sync + 'static) -> ListenerId {
        self.load_listeners.subscribe(listener)
    }

    /// Subscribes to console messages.
    pub fn on_console(
        &self,
        listener: impl Fn(&ConsoleMessage) + Send + Sync + 'static,
    ) -> ListenerId {
        self.console_listeners.subscribe(listener)
    }

    /// Subscribes to the close event.
    pub fn on_close(&self, listener: impl Fn(&()) + Send + Sync + 'static) -> ListenerId {
        self.close_listeners.subscribe(listener)
    }

    pub fn remove_load_listener(&self, id: ListenerId) {
        self.load_listeners.unsubscribe(id);
    }

    pub fn remove_console_listener(&self, id: ListenerId) {
        self.console_listeners.unsubscribe(id);
    }

    pub fn remove_close_listener(&self, id: ListenerId) {
        self.close_listeners.unsubscribe(id);
    }
}

impl private::Sealed for Page {}

impl RemoteObject for Page {
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
