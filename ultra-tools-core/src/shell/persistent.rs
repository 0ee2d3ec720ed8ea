// ultra-tools-core/src/shell/persistent.rs

//! A long-lived shell process driven over its stdin.
//!
//! Each submission is framed so that the shell itself reports where the
//! command's output ends:
//!
//! ```text
//! { command eval '<command>'
//! } </dev/null
//! __ut_rc=$?
//! printf '\n%s %s\n' '<marker>' "$__ut_rc"
//! printf '\n%s\n' '<marker>' >&2
//! ```
//!
//! The marker is a random token chosen when the session starts. The leading
//! `\n` guarantees the marker lands on its own line even when the command's
//! output has no trailing newline; the resulting empty line is dropped again
//! when the output is collected. Commands never see the session's stdin.
//!
//! The command reaches the shell as a single quoted `eval` argument, so a
//! syntax error in it (an unbalanced quote, say) fails that command with a
//! non-zero status instead of swallowing the framing lines.

use super::{preview, CommandOutput, ShellSession};
use crate::errors::InstallError;
use crate::quote::quote;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

struct Channel {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: BufReader<ChildStderr>,
}

/// A persistent shell. Submissions are serialized through an internal mutex,
/// so one session can be shared (`Arc`) by any number of callers.
pub struct PersistentShell {
    // `None` once the session is closed or broken.
    channel: Mutex<Option<Channel>>,
    marker: String,
    label: String,
}

impl std::fmt::Debug for PersistentShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentShell")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl PersistentShell {
    /// Spawns `program args...` with piped stdio and wraps it as a session.
    pub fn spawn(program: &str, args: &[&str]) -> Result<Self, InstallError> {
        let label = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        debug!(shell = %label, "Spawning persistent shell");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| InstallError::session(format!("Failed to spawn shell '{}': {}", label, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| InstallError::session("Shell stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| InstallError::session("Shell stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| InstallError::session("Shell stderr was not captured"))?;

        Ok(Self {
            channel: Mutex::new(Some(Channel {
                child,
                stdin,
                stdout: BufReader::new(stdout),
                stderr: BufReader::new(stderr),
            })),
            marker: format!("__ULTRA_TOOLS_{}__", Uuid::new_v4().simple()),
            label,
        })
    }

    /// Whether the shell runs as uid 0.
    pub async fn is_root(&self, timeout: Duration) -> Result<bool, InstallError> {
        let output = self.exec("id -u", timeout).await?;
        Ok(output.success() && output.stdout.trim() == "0")
    }

    /// True once the session has been closed, timed out, or lost its child.
    pub async fn is_broken(&self) -> bool {
        self.channel.lock().await.is_none()
    }

    /// Asks the shell to exit and waits for it. Later submissions fail.
    pub async fn close(&self) -> Result<(), InstallError> {
        let mut guard = self.channel.lock().await;
        if let Some(mut channel) = guard.take() {
            // The shell may already be gone; waiting below reports what happened.
            let _ = channel.stdin.write_all(b"exit\n").await;
            drop(channel.stdin);
            let status = channel.child.wait().await?;
            debug!(shell = %self.label, %status, "Persistent shell closed");
        }
        Ok(())
    }

    fn frame(&self, command: &str) -> String {
        let body = if command.trim().is_empty() { ":" } else { command };
        format!(
            "{{ command eval {body}\n}} </dev/null\n__ut_rc=$?\nprintf '\\n%s %s\\n' '{marker}' \"$__ut_rc\"\nprintf '\\n%s\\n' '{marker}' >&2\n",
            body = quote(body),
            marker = self.marker
        )
    }
}

impl Channel {
    async fn submit(&mut self, script: &str, marker: &str) -> Result<CommandOutput, InstallError> {
        self.stdin
            .write_all(script.as_bytes())
            .await
            .map_err(|e| InstallError::session(format!("Failed to write to shell: {}", e)))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| InstallError::session(format!("Failed to flush shell stdin: {}", e)))?;

        let (stdout, stderr) = tokio::try_join!(
            read_until_marker(&mut self.stdout, marker),
            read_until_marker(&mut self.stderr, marker),
        )?;

        let status_text = stdout.1.unwrap_or_default();
        let status = status_text.trim().parse::<i32>().map_err(|_| {
            InstallError::session(format!("Shell reported an unreadable status: '{}'", status_text))
        })?;

        Ok(CommandOutput {
            status,
            stdout: stdout.0,
            stderr: stderr.0,
        })
    }
}

/// Reads lines until one starts with `marker`. Returns the collected text and
/// whatever followed the marker on its line.
async fn read_until_marker<R>(reader: &mut R, marker: &str) -> Result<(String, Option<String>), InstallError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines: Vec<String> = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| InstallError::session(format!("Failed to read from shell: {}", e)))?;
        if n == 0 {
            return Err(InstallError::session(
                "Shell exited before the command completed",
            ));
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches('\n').trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix(marker) {
            // Separator line written ahead of the marker.
            if lines.last().is_some_and(|l| l.is_empty()) {
                lines.pop();
            }
            let mut text = String::new();
            for l in &lines {
                text.push_str(l);
                text.push('\n');
            }
            return Ok((text, Some(rest.trim().to_string())));
        }
        trace!(line, "shell output");
        lines.push(line.to_string());
    }
}

#[async_trait]
impl ShellSession for PersistentShell {
    async fn exec(&self, command: &str, timeout: Duration) -> Result<CommandOutput, InstallError> {
        let mut guard = self.channel.lock().await;
        let channel = guard.as_mut().ok_or_else(|| {
            InstallError::session(format!("Shell session '{}' is closed or broken", self.label))
        })?;

        debug!("Executing shell command: {}", command);
        let script = self.frame(command);

        let result = tokio::time::timeout(timeout, channel.submit(&script, &self.marker)).await;
        match result {
            Ok(Ok(output)) => {
                debug!(
                    "Shell command exit status: {}\nStdout preview (first 3 lines):\n{}\nStderr preview (first 3 lines):\n{}",
                    output.status,
                    preview(&output.stdout),
                    preview(&output.stderr)
                );
                Ok(output)
            }
            Ok(Err(e)) => {
                error!(command = command, error = %e, "Persistent shell failed; discarding session");
                if let Some(mut dead) = guard.take() {
                    let _ = dead.child.start_kill();
                }
                Err(e)
            }
            Err(_) => {
                warn!(command = command, ?timeout, "Command timed out; killing persistent shell");
                if let Some(mut dead) = guard.take() {
                    let _ = dead.child.start_kill();
                }
                Err(InstallError::Timeout {
                    command: command.to_string(),
                    after: timeout,
                })
            }
        }
    }
}
