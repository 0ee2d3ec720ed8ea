// ultra-tools-core/src/shell/launcher.rs

//! Obtains the privileged shell the installer talks to.
//!
//! The manager app acquires its global-mount root shell by trying, in order,
//! the KernelSU daemon's `debug su`, the system `su`, and finally a plain
//! `sh`. The launcher reproduces that chain as a single `sh -c` line so the
//! first candidate that starts becomes the session.

use super::{PersistentShell, ShellSession};
use crate::errors::InstallError;
use crate::quote::{quote, quote_str};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RootShellLauncher {
    /// Path to the KernelSU daemon bundled with the manager, if known.
    pub ksud_path: Option<PathBuf>,
    /// The `su` binary to fall back to.
    pub su: String,
    /// Request the global mount namespace (`-g` / `--mount-master`).
    pub global_mount: bool,
    /// Accept a plain, unprivileged `sh` when no `su` is available.
    pub allow_unprivileged: bool,
}

impl Default for RootShellLauncher {
    fn default() -> Self {
        Self {
            ksud_path: None,
            su: "su".to_string(),
            global_mount: true,
            allow_unprivileged: false,
        }
    }
}

impl RootShellLauncher {
    /// The `sh -c` argument that tries each shell candidate in turn.
    pub fn command_line(&self) -> Result<String, InstallError> {
        let mut candidates = Vec::new();
        if let Some(ksud) = &self.ksud_path {
            let mut candidate = format!("{} debug su", quote_str(ksud)?);
            if self.global_mount {
                candidate.push_str(" -g");
            }
            candidates.push(candidate);
        }
        let su = quote(&self.su);
        candidates.push(if self.global_mount {
            format!("{} --mount-master", su)
        } else {
            su
        });
        if self.allow_unprivileged {
            candidates.push("sh".to_string());
        }
        Ok(candidates.join(" || "))
    }

    /// Starts the shell and checks what it runs as.
    pub async fn launch(&self, timeout: Duration) -> Result<Arc<PersistentShell>, InstallError> {
        let line = self.command_line()?;
        info!(command = %line, "Starting root shell");
        let shell = PersistentShell::spawn("sh", &["-c", &line])?;

        if shell.is_root(timeout).await? {
            info!("Root shell ready");
        } else if self.allow_unprivileged {
            warn!("Shell is not running as root; installs into /data/adb will likely fail");
        } else {
            shell.close().await?;
            return Err(InstallError::session(
                "Could not obtain a root shell (no working su found)",
            ));
        }
        Ok(Arc::new(shell))
    }

    /// [`launch`](Self::launch), erased to the session trait.
    pub async fn launch_session(&self, timeout: Duration) -> Result<Arc<dyn ShellSession>, InstallError> {
        let shell: Arc<dyn ShellSession> = self.launch(timeout).await?;
        Ok(shell)
    }
}
