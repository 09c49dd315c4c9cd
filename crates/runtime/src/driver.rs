//! Driver process lifecycle.
//!
//! The driver is a long-lived external process that speaks the message
//! protocol over its stdio pipes. Locating or installing the driver binary
//! is out of scope here; callers provide the executable path. Shutdown is
//! always explicit: every connection exit path terminates the process
//! deterministically rather than leaning on drop order.

use std::path::Path;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::{Error, Result};

/// Handle to a running driver process.
#[derive(Debug)]
pub struct DriverProcess {
    process: Child,
}

impl DriverProcess {
    /// Spawns the driver executable with its fixed `--run` argument and
    /// stdio repurposed as the message stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LaunchFailed`] if the process cannot be spawned or
    /// exits immediately after spawn.
    pub async fn launch(executable: &Path) -> Result<Self> {
        let mut cmd = Command::new(executable);
        cmd.arg("--run")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit());

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::LaunchFailed(format!("Failed to spawn process: {e}")))?;

        // Catch drivers that die on startup before handing the pipes to the
        // transport.
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        match child.try_wait() {
            Ok(Some(status)) => Err(Error::LaunchFailed(format!(
                "Driver process exited immediately with status: {status}"
            ))),
            Ok(None) => Ok(Self { process: child }),
            Err(e) => Err(Error::LaunchFailed(format!(
                "Failed to check process status: {e}"
            ))),
        }
    }

    /// Takes the stdio pipes for the transport. Can only be called once.
    pub fn take_pipes(&mut self) -> Result<(ChildStdin, ChildStdout)> {
        let stdin = self
            .process
            .stdin
            .take()
            .ok_or_else(|| Error::LaunchFailed("driver stdin already taken".to_string()))?;
        let stdout = self
            .process
            .stdout
            .take()
            .ok_or_else(|| Error::LaunchFailed("driver stdout already taken".to_string()))?;
        Ok((stdin, stdout))
    }

    /// Begins killing the process without awaiting it.
    ///
    /// Used on close paths that cannot await; pair with [`shutdown`] where a
    /// runtime is available.
    ///
    /// [`shutdown`]: DriverProcess::shutdown
    pub fn start_kill(&mut self) -> Result<()> {
        self.process
            .start_kill()
            .map_err(|e| Error::LaunchFailed(format!("Failed to kill driver: {e}")))
    }

    /// Terminates the process and reaps it.
    ///
    /// On Windows the stdio pipes must be closed before the kill, otherwise
    /// tokio's blocking stdio threadpool can hang the wait indefinitely.
    pub async fn shutdown(mut self) -> Result<()> {
        #[cfg(windows)]
        {
            drop(self.process.stdin.take());
            drop(self.process.stdout.take());
            drop(self.process.stderr.take());
        }

        self.process
            .kill()
            .await
            .map_err(|e| Error::LaunchFailed(format!("Failed to kill driver: {e}")))?;

        let _ = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            self.process.wait(),
        )
        .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_launch_missing_executable() {
        let result = DriverProcess::launch(Path::new("/nonexistent/drover-driver")).await;
        match result {
            Err(Error::LaunchFailed(msg)) => {
                assert!(msg.contains("Failed to spawn process"), "got: {msg}");
            }
            other => panic!("expected LaunchFailed, got: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_detects_immediate_exit() {
        // `cat --run` rejects the flag and exits right away.
        let result = DriverProcess::launch(Path::new("/bin/cat")).await;
        match result {
            Err(Error::LaunchFailed(msg)) => {
                assert!(msg.contains("exited immediately"), "got: {msg}");
            }
            other => panic!("expected LaunchFailed, got: {other:?}"),
        }
    }
}
