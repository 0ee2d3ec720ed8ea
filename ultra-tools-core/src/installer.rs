// ultra-tools-core/src/installer.rs

//! Copies the bundled helper tools to their fixed locations.
//!
//! Policy: **install if missing**. A destination that already holds a regular
//! file is left alone unless the caller explicitly asks for
//! [`InstallMode::Force`]. Each tool runs as a short-circuiting pipeline:
//!
//! 1. existence gate on the destination (skipped in `Force` mode)
//! 2. the bundled source must exist
//! 3. copy (staged, then renamed into place)
//! 4. `chmod a+rx`
//! 5. verify the mode carries `o+rx`
//!
//! The first failing step ends that tool's pipeline; in particular `chmod`
//! never runs after a failed copy. Failures are per tool and collected into an
//! [`InstallReport`]; only fatal session errors abort the whole run.

use crate::errors::InstallError;
use crate::resolver::{BinaryResolver, Tool, ToolDescriptor};
use crate::runner::CommandRunner;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Permission change applied after a copy.
pub const CHMOD_PERMS: &str = "a+rx";
/// Bits every principal needs on an installed tool.
pub const REQUIRED_OTHER_BITS: u32 = 0o005;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallMode {
    /// Copy only when the destination is absent.
    #[default]
    IfMissing,
    /// Copy even over an existing destination (refresh after an app update).
    Force,
}

#[derive(Debug)]
pub enum ToolOutcome {
    Installed { mode: u32 },
    Skipped,
    Failed(InstallError),
}

#[derive(Debug)]
pub struct ToolReport {
    pub tool: Tool,
    pub destination: PathBuf,
    pub outcome: ToolOutcome,
}

#[derive(Debug, Default)]
pub struct InstallReport {
    pub tools: Vec<ToolReport>,
}

impl InstallReport {
    /// True when no tool failed.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ToolReport, &InstallError)> {
        self.tools.iter().filter_map(|report| match &report.outcome {
            ToolOutcome::Failed(e) => Some((report, e)),
            _ => None,
        })
    }

    pub fn installed(&self) -> impl Iterator<Item = &ToolReport> {
        self.tools
            .iter()
            .filter(|report| matches!(report.outcome, ToolOutcome::Installed { .. }))
    }
}

/// What is currently on disk for one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub tool: Tool,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub bundled: bool,
    pub installed: bool,
    pub mode: Option<u32>,
}

impl ToolStatus {
    pub fn is_executable_by_all(&self) -> bool {
        self.mode
            .is_some_and(|mode| mode & REQUIRED_OTHER_BITS == REQUIRED_OTHER_BITS)
    }
}

#[derive(Debug, Clone)]
pub struct ToolInstaller {
    runner: CommandRunner,
    tools: Vec<ToolDescriptor>,
    mode: InstallMode,
}

impl ToolInstaller {
    pub fn new(runner: CommandRunner, tools: Vec<ToolDescriptor>) -> Self {
        Self {
            runner,
            tools,
            mode: InstallMode::default(),
        }
    }

    /// Builds descriptors for `tools`, resolving their bundled paths now.
    pub fn for_tools(
        runner: CommandRunner,
        tools: &[Tool],
        resolver: &dyn BinaryResolver,
    ) -> Result<Self, InstallError> {
        let descriptors = tools
            .iter()
            .map(|tool| ToolDescriptor::resolve(*tool, resolver))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(runner, descriptors))
    }

    pub fn with_mode(mut self, mode: InstallMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Runs every tool's pipeline in order.
    ///
    /// Returns `Err` only for fatal errors (broken session, timeout); later
    /// tools are not attempted then, since the session can't be trusted.
    pub async fn try_to_install(&self) -> Result<InstallReport, InstallError> {
        let mut report = InstallReport::default();
        for descriptor in &self.tools {
            let outcome = match self.install_one(descriptor).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_fatal() => {
                    error!(tool = %descriptor.tool, error = %e, "Aborting install");
                    return Err(e);
                }
                Err(e) => {
                    error!(tool = %descriptor.tool, error = %e, "Install failed");
                    ToolOutcome::Failed(e)
                }
            };
            report.tools.push(ToolReport {
                tool: descriptor.tool,
                destination: descriptor.destination.clone(),
                outcome,
            });
        }
        Ok(report)
    }

    async fn install_one(&self, descriptor: &ToolDescriptor) -> Result<ToolOutcome, InstallError> {
        let ToolDescriptor {
            tool,
            source,
            destination,
        } = descriptor;

        if self.mode == InstallMode::IfMissing && self.runner.exists(destination).await? {
            info!(tool = %tool, path = %destination.display(), "Already installed, skipping");
            return Ok(ToolOutcome::Skipped);
        }

        if !self.runner.exists(source).await? {
            return Err(InstallError::SourceMissing(source.clone()));
        }

        debug!(tool = %tool, src = %source.display(), dst = %destination.display(), "Installing");
        self.runner.copy_to(source, destination).await?;
        self.runner.chmod(destination, CHMOD_PERMS).await?;

        let mode = self.runner.mode(destination).await?;
        if mode & REQUIRED_OTHER_BITS != REQUIRED_OTHER_BITS {
            return Err(InstallError::PermissionCheck {
                path: destination.clone(),
                mode,
            });
        }

        info!(tool = %tool, path = %destination.display(), mode = %format!("{:o}", mode), "Installed");
        Ok(ToolOutcome::Installed { mode })
    }

    /// Reports what is on disk for every tool without changing anything.
    pub async fn status(&self) -> Result<Vec<ToolStatus>, InstallError> {
        let mut statuses = Vec::with_capacity(self.tools.len());
        for descriptor in &self.tools {
            let bundled = self.runner.exists(&descriptor.source).await?;
            let installed = self.runner.exists(&descriptor.destination).await?;
            let mode = if installed {
                match self.runner.mode(&descriptor.destination).await {
                    Ok(mode) => Some(mode),
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!(tool = %descriptor.tool, error = %e, "Could not read mode");
                        None
                    }
                }
            } else {
                None
            };
            statuses.push(ToolStatus {
                tool: descriptor.tool,
                source: descriptor.source.clone(),
                destination: descriptor.destination.clone(),
                bundled,
                installed,
                mode,
            });
        }
        Ok(statuses)
    }
}
