//! Session lifecycle: driver launch, handshake, and shutdown.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use drover_runtime::{Connection, DriverProcess, Error, PipeTransport, Result};

use crate::factory::constructor_table;
use crate::objects::DriverRoot;

/// GUID the driver registers its root object under.
pub const ROOT_GUID: &str = "driver";

/// Environment variable consulted for the driver executable when
/// [`SessionConfig::driver_path`] is unset.
pub const DRIVER_ENV: &str = "DROVER_DRIVER";

/// Launch configuration for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Path to the driver executable. Falls back to the `DROVER_DRIVER`
    /// environment variable when unset.
    pub driver_path: Option<PathBuf>,
    /// How long to wait for the driver to announce its root object.
    pub launch_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            driver_path: None,
            launch_timeout: Duration::from_secs(30),
        }
    }
}

/// A live session against a driver process.
///
/// Holds the connection, the background dispatch task, and the root proxy.
/// Dropping the session closes the connection and terminates the driver.
pub struct Session {
    connection: Arc<Connection>,
    root: Arc<DriverRoot>,
    run_task: tokio::task::JoinHandle<()>,
}

impl Session {
    /// Launches the driver process and completes the startup handshake.
    ///
    /// Fails with [`Error::LaunchFailed`] when no driver path is
    /// configured or the process cannot be started, and with
    /// [`Error::Timeout`] when the driver does not announce its root
    /// object within `launch_timeout`.
    pub async fn launch(config: SessionConfig) -> Result<Self> {
        let driver_path = match config.driver_path {
            Some(path) => path,
            None => std::env::var_os(DRIVER_ENV).map(PathBuf::from).ok_or_else(|| {
                Error::LaunchFailed(format!(
                    "no driver executable configured; set SessionConfig::driver_path or {DRIVER_ENV}"
                ))
            })?,
        };

        let mut process = DriverProcess::launch(&driver_path).await?;
        let (stdin, stdout) = process.take_pipes()?;

        let (transport, message_rx) = PipeTransport::new(stdin, stdout);
        let parts = transport.into_transport_parts(message_rx);
        let connection = Connection::new(parts, constructor_table());
        connection.attach_process(process);

        let run_conn = Arc::clone(&connection);
        let run_task = tokio::spawn(async move { run_conn.run().await });

        let root = connection
            .wait_for_object(ROOT_GUID, config.launch_timeout)
            .await?;
        let root = root.downcast_arc::<DriverRoot>().map_err(|_| {
            Error::Protocol(format!("root object \"{ROOT_GUID}\" has unexpected type"))
        })?;

        tracing::debug!(path = %driver_path.display(), "session established");

        Ok(Self {
            connection,
            root,
            run_task,
        })
    }

    /// The driver's root object.
    pub fn root(&self) -> &Arc<DriverRoot> {
        &self.root
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Returns true once the connection has closed, whether by [`close`],
    /// driver exit, or protocol violation.
    ///
    /// [`close`]: Session::close
    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    /// Closes the session: pending calls fail with `ConnectionClosed` and
    /// the driver process is terminated. Idempotent.
    pub fn close(&self) {
        self.connection.close("session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.connection.close("session dropped");
        self.run_task.abort();
    }
}
