// ultra-tools-core/src/runner.rs

//! The command runner: the small set of shell operations the installer needs,
//! expressed over any [`ShellSession`].
//!
//! Success is decided by exit status. Captured output is only carried along
//! for diagnostics. Every path is quoted with [`quote_str`].

use crate::errors::InstallError;
use crate::quote::quote_str;
use crate::shell::{CommandOutput, ShellSession};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Suffix of the staging file a copy is written to before it is renamed into place.
pub const STAGING_SUFFIX: &str = ".ut-partial";

/// Runs commands on a shared session with a fixed per-command timeout.
#[derive(Clone)]
pub struct CommandRunner {
    session: Arc<dyn ShellSession>,
    timeout: Duration,
}

impl fmt::Debug for CommandRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRunner")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl CommandRunner {
    pub fn new(session: Arc<dyn ShellSession>, timeout: Duration) -> Self {
        Self { session, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `command` and returns the structured result, whatever its status.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput, InstallError> {
        self.session.exec(command, self.timeout).await
    }

    /// Runs `command` and returns its stdout lines, each terminated by `\n`.
    /// A failing command is not an error; only a broken session is.
    pub async fn run(&self, command: &str) -> Result<String, InstallError> {
        Ok(self.exec(command).await?.joined_stdout())
    }

    /// Whether `path` names a regular file (links are followed).
    pub async fn exists(&self, path: impl AsRef<Path>) -> Result<bool, InstallError> {
        let command = format!("test -f {}", quote_str(path)?);
        Ok(self.exec(&command).await?.success())
    }

    /// Copies `src` over `dst`.
    ///
    /// The bytes land in a sibling staging file first and are renamed over
    /// `dst` only once complete, so `dst` is never left half-written. The
    /// destination's parent directory must already exist, and `dst` itself
    /// must not be a directory.
    pub async fn copy_to(&self, src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<(), InstallError> {
        let (src, dst) = (src.as_ref(), dst.as_ref());
        let staging = staging_path(dst);
        let (q_src, q_dst, q_staging) = (quote_str(src)?, quote_str(dst)?, quote_str(&staging)?);

        // `mv` onto a directory would move the file inside it.
        let not_dir = self.exec(&format!("test ! -d {}", q_dst)).await?;
        if !not_dir.success() {
            warn!(dst = %dst.display(), "Copy destination is a directory");
            return Err(InstallError::CopyFailed {
                src: src.to_path_buf(),
                dst: dst.to_path_buf(),
                status: not_dir.status,
                output: format!("{} is a directory", dst.display()),
            });
        }

        let copy = self.exec(&format!("cp -f {} {}", q_src, q_staging)).await?;
        let output = if copy.success() {
            let rename = self.exec(&format!("mv -f {} {}", q_staging, q_dst)).await?;
            if rename.success() {
                debug!(src = %src.display(), dst = %dst.display(), "Copied");
                return Ok(());
            }
            rename
        } else {
            copy
        };

        warn!(
            src = %src.display(),
            dst = %dst.display(),
            status = output.status,
            "Copy failed: {}",
            output.diagnostic()
        );
        let cleanup = self.exec(&format!("rm -f {}", q_staging)).await?;
        if !cleanup.success() {
            warn!(path = %staging.display(), "Failed to remove staging file: {}", cleanup.diagnostic());
        }
        Err(InstallError::CopyFailed {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            status: output.status,
            output: output.diagnostic(),
        })
    }

    /// `chmod <perms> <path>`, e.g. `perms = "a+rx"`.
    pub async fn chmod(&self, path: impl AsRef<Path>, perms: &str) -> Result<(), InstallError> {
        let command = format!("chmod {} {}", perms, quote_str(path)?);
        self.check(&command).await.map(|_| ())
    }

    /// Permission bits of `path` (e.g. `0o755`).
    pub async fn mode(&self, path: impl AsRef<Path>) -> Result<u32, InstallError> {
        let command = format!("stat -c %a {}", quote_str(path)?);
        let output = self.check(&command).await?;
        let text = output.stdout.trim();
        u32::from_str_radix(text, 8).map_err(|_| InstallError::CommandFailed {
            command,
            status: output.status,
            output: format!("Unparseable mode '{}'", text),
        })
    }

    async fn check(&self, command: &str) -> Result<CommandOutput, InstallError> {
        let output = self.exec(command).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(InstallError::CommandFailed {
                command: command.to_string(),
                status: output.status,
                output: output.diagnostic(),
            })
        }
    }
}

fn staging_path(dst: &Path) -> PathBuf {
    let mut name = dst.as_os_str().to_os_string();
    name.push(STAGING_SUFFIX);
    PathBuf::from(name)
}
