// ultra-tools-core/src/shell/mod.rs

//! Shell sessions that commands are submitted to.
//!
//! A [`ShellSession`] is the only way the rest of the crate touches the system.
//! Implementations own their child process and serialize submissions, so
//! callers never need their own locking. Two implementations exist:
//!
//! - [`PersistentShell`]: one long-lived shell (usually a root shell obtained
//!   through [`RootShellLauncher`]) fed commands over stdin.
//! - [`OneShotShell`]: a fresh `sh -c` per command, with no carried state.

pub mod launcher;
pub mod oneshot;
pub mod persistent;

pub use launcher::RootShellLauncher;
pub use oneshot::OneShotShell;
pub use persistent::PersistentShell;

use crate::errors::InstallError;
use async_trait::async_trait;
use std::time::Duration;

/// Represents the structured output of one submitted command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// The exit status code of the command.
    pub status: i32,
    /// The captured standard output.
    pub stdout: String,
    /// The captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Checks if the command executed successfully (status code 0).
    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines()
    }

    /// Stdout as the manager always consumed it: every line followed by `\n`.
    pub fn joined_stdout(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + 1);
        for line in self.stdout_lines() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Both streams in one block, for attaching to errors and logs.
    pub fn diagnostic(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (true, true) => "<no output>".to_string(),
            (false, true) => self.stdout.trim_end().to_string(),
            (true, false) => self.stderr.trim_end().to_string(),
            (false, false) => format!(
                "{}\n{}",
                self.stdout.trim_end(),
                self.stderr.trim_end()
            ),
        }
    }
}

/// A channel that executes shell command lines one at a time.
#[async_trait]
pub trait ShellSession: Send + Sync {
    /// Runs `command` and waits for it, up to `timeout`.
    ///
    /// A non-zero exit status is *not* an error here; it is reported in
    /// [`CommandOutput::status`]. Errors mean the session itself failed.
    async fn exec(&self, command: &str, timeout: Duration) -> Result<CommandOutput, InstallError>;
}

/// Shared preview used by the session implementations for debug logging.
pub(crate) fn preview(text: &str) -> String {
    let preview = text.lines().take(3).collect::<Vec<_>>().join("\\n");
    if preview.is_empty() {
        "<no output>".to_string()
    } else {
        preview
    }
}
