// ultra-tools-core/src/resolver.rs

//! The helper tools the manager ships, where they live inside the app, and
//! where the rest of the root ecosystem expects to find them.

use crate::errors::InstallError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Install location of the kernel-module manager.
pub const KPMMGR_PATH: &str = "/data/adb/ksu/bin/kpmmgr";
/// Install location of the SuSFS daemon.
pub const SUSFSD_PATH: &str = "/data/adb/ksu/bin/susfsd";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Kernel patch module manager.
    Kpmmgr,
    /// Filesystem-spoofing (SuSFS) daemon.
    Susfsd,
}

impl Tool {
    pub const ALL: [Tool; 2] = [Tool::Kpmmgr, Tool::Susfsd];

    pub fn name(self) -> &'static str {
        match self {
            Tool::Kpmmgr => "kpmmgr",
            Tool::Susfsd => "susfsd",
        }
    }

    /// Fixed install path. Other processes look for the tool here.
    pub fn destination(self) -> &'static Path {
        Path::new(match self {
            Tool::Kpmmgr => KPMMGR_PATH,
            Tool::Susfsd => SUSFSD_PATH,
        })
    }

    /// File name under which the app packages the binary in its native library directory.
    pub fn bundled_file_name(self) -> &'static str {
        match self {
            Tool::Kpmmgr => "libkpmmgr.so",
            Tool::Susfsd => "libzakozakozako.so",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tool {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tool::ALL
            .into_iter()
            .find(|tool| tool.name() == s.trim())
            .ok_or_else(|| InstallError::UnknownTool(s.to_string()))
    }
}

/// Finds the current on-disk copy of a bundled tool.
pub trait BinaryResolver: Send + Sync {
    fn resolve(&self, tool: Tool) -> Result<PathBuf, InstallError>;
}

/// Resolves tools inside the app's native library directory
/// (`/data/app/<...>/lib/<abi>`), which moves with every app update.
#[derive(Debug, Clone)]
pub struct NativeLibraryResolver {
    dir: PathBuf,
}

impl NativeLibraryResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl BinaryResolver for NativeLibraryResolver {
    fn resolve(&self, tool: Tool) -> Result<PathBuf, InstallError> {
        Ok(self.dir.join(tool.bundled_file_name()))
    }
}

/// One install job: copy `source` to `destination`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub tool: Tool,
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl ToolDescriptor {
    /// Resolves the source now; the destination is the tool's fixed path.
    pub fn resolve(tool: Tool, resolver: &dyn BinaryResolver) -> Result<Self, InstallError> {
        Ok(Self {
            tool,
            source: resolver.resolve(tool)?,
            destination: tool.destination().to_path_buf(),
        })
    }
}
