// ultra-tools-core/src/errors.rs
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the shell or installing a tool.
#[derive(Error, Debug)]
pub enum InstallError {
    /// The shell session could not be started, or died, or is no longer usable.
    #[error("Shell Session Error: {0}")]
    Session(String),

    /// A command did not finish before its deadline. The session is unusable afterwards.
    #[error("Command timed out after {after:?}: {command}")]
    Timeout { command: String, after: Duration },

    /// A command ran but exited with a non-zero status.
    #[error("Command failed with status {status}: {command}\n{output}")]
    CommandFailed {
        command: String,
        status: i32,
        output: String,
    },

    /// Copying a bundled binary to its destination failed.
    #[error("Copy of {} to {} failed with status {status}\n{output}", .src.display(), .dst.display())]
    CopyFailed {
        src: PathBuf,
        dst: PathBuf,
        status: i32,
        output: String,
    },

    /// The bundled binary is not present where the resolver said it would be.
    #[error("Bundled binary not found: {}", .0.display())]
    SourceMissing(PathBuf),

    /// The installed file does not carry world read/execute bits.
    #[error("Permission check failed for {}: mode {mode:o} lacks o+rx", .path.display())]
    PermissionCheck { path: PathBuf, mode: u32 },

    /// A path that cannot be passed to the shell (not valid UTF-8).
    #[error("Invalid path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
}

impl InstallError {
    pub fn session(msg: impl Into<String>) -> Self {
        InstallError::Session(msg.into())
    }

    /// Fatal errors mean the session can no longer be trusted; the installer stops on them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            InstallError::Session(_) | InstallError::Timeout { .. } | InstallError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(InstallError::session("gone").is_fatal());
        assert!(InstallError::Timeout {
            command: "sleep 5".into(),
            after: Duration::from_secs(1)
        }
        .is_fatal());
        assert!(!InstallError::SourceMissing(PathBuf::from("/x")).is_fatal());
        assert!(!InstallError::CopyFailed {
            src: PathBuf::from("/a"),
            dst: PathBuf::from("/b"),
            status: 1,
            output: String::new(),
        }
        .is_fatal());
    }

    #[test]
    fn test_permission_error_shows_octal_mode() {
        let err = InstallError::PermissionCheck {
            path: PathBuf::from("/data/adb/ksu/bin/kpmmgr"),
            mode: 0o700,
        };
        let text = err.to_string();
        assert!(text.contains("mode 700"), "Unexpected message: {}", text);
        assert!(text.contains("/data/adb/ksu/bin/kpmmgr"));
    }
}
