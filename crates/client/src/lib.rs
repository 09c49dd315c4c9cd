//! Typed client for an external automation driver.
//!
//! A [`Session`] launches the driver executable, speaks the framed JSON
//! protocol over its stdio pipes, and exposes the driver's object graph as
//! typed proxies: [`DriverRoot`] at the top, then [`Browser`], [`Page`],
//! and [`Frame`] beneath it.
//!
//! ```no_run
//! use drover::{Session, SessionConfig};
//!
//! # async fn run() -> drover::Result<()> {
//! let session = Session::launch(SessionConfig::default()).await?;
//! let browser = session.root().launch_browser().await?;
//! let page = browser.new_page().await?;
//! page.navigate("https://example.com").await?;
//! browser.close().await?;
//! session.close();
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

pub mod factory;
pub mod objects;
pub mod session;

pub use drover_runtime::{Error, ListenerId, Result};
pub use objects::{Browser, ConsoleMessage, DriverRoot, Frame, NavigatedEvent, Page};
pub use session::{Session, SessionConfig};

/// Default timeout applied to driver calls made through the typed API.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
