// ultra-tools-core/src/lib.rs

//! Installs the helper tools bundled with the root manager app
//! (`kpmmgr`, `susfsd`) into `/data/adb/ksu/bin`.
//!
//! Everything goes through an injected [`ShellSession`]: the
//! [`CommandRunner`] turns it into quoted, status-checked file operations, and
//! the [`ToolInstaller`] drives those per tool and reports the outcome.
//!
//! ```no_run
//! use std::time::Duration;
//! use ultra_tools_core::{
//!     CommandRunner, InstallError, NativeLibraryResolver, RootShellLauncher, Tool, ToolInstaller,
//! };
//!
//! # async fn demo() -> Result<(), InstallError> {
//! let timeout = Duration::from_secs(30);
//! let session = RootShellLauncher::default().launch_session(timeout).await?;
//! let resolver = NativeLibraryResolver::new("/data/app/~~abc/pkg-1/lib/arm64");
//! let installer =
//!     ToolInstaller::for_tools(CommandRunner::new(session, timeout), &Tool::ALL, &resolver)?;
//! let report = installer.try_to_install().await?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod installer;
pub mod quote;
pub mod resolver;
pub mod runner;
pub mod shell;

#[cfg(test)]
mod installer_tests;

pub use config::{InstallerConfig, ShellConfig};
pub use errors::InstallError;
pub use installer::{InstallMode, InstallReport, ToolInstaller, ToolOutcome, ToolReport, ToolStatus};
pub use resolver::{BinaryResolver, NativeLibraryResolver, Tool, ToolDescriptor};
pub use runner::CommandRunner;
pub use shell::{CommandOutput, OneShotShell, PersistentShell, RootShellLauncher, ShellSession};
