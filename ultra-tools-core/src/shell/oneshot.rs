// ultra-tools-core/src/shell/oneshot.rs

//! A session that runs every command in its own `sh -c` process.

use super::{preview, CommandOutput, ShellSession};
use crate::errors::InstallError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Runs each command through `sh -c`. Nothing carries over between commands
/// (working directory, variables), and the child is killed if it outlives the
/// timeout. Commands are still submitted one at a time.
#[derive(Debug)]
pub struct OneShotShell {
    shell: String,
    gate: Mutex<()>,
}

impl Default for OneShotShell {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl OneShotShell {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            gate: Mutex::new(()),
        }
    }
}

#[async_trait]
impl ShellSession for OneShotShell {
    async fn exec(&self, command: &str, timeout: Duration) -> Result<CommandOutput, InstallError> {
        let _turn = self.gate.lock().await;
        debug!("Executing one-shot command: {} via {}", command, self.shell);

        let handle = duct::cmd!(&self.shell, "-c", command)
            .stdin_null()
            .stdout_capture()
            .stderr_capture()
            .unchecked() // Non-zero exit is reported through the status
            .start()
            .map_err(|e| {
                warn!(command = command, error = %e, "Failed to spawn command process");
                InstallError::session(format!("Failed to spawn '{}' for command '{}': {}", self.shell, command, e))
            })?;
        let handle = Arc::new(handle);

        let waiter = Arc::clone(&handle);
        let wait = tokio::task::spawn_blocking(move || waiter.wait().map(|output| output.clone()));

        let output = match tokio::time::timeout(timeout, wait).await {
            Ok(joined) => joined
                .map_err(|e| InstallError::session(format!("Command wait task failed: {}", e)))??,
            Err(_) => {
                warn!(command = command, ?timeout, "One-shot command timed out; killing it");
                if let Err(e) = handle.kill() {
                    warn!(error = %e, "Failed to kill timed-out command");
                }
                return Err(InstallError::Timeout {
                    command: command.to_string(),
                    after: timeout,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let status = output
            .status
            .code()
            .unwrap_or_else(|| if output.status.success() { 0 } else { -1 });

        debug!(
            "One-shot command exit status: {}\nStdout preview (first 3 lines):\n{}\nStderr preview (first 3 lines):\n{}",
            status,
            preview(&stdout),
            preview(&stderr)
        );

        Ok(CommandOutput {
            status,
            stdout,
            stderr,
        })
    }
}
