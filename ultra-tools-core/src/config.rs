// ultra-tools-core/src/config.rs

//! Handles configuration structures and parsing for the installer.

use crate::resolver::Tool;
use crate::shell::RootShellLauncher;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

fn default_timeout_secs() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

fn default_tools() -> Vec<String> {
    Tool::ALL.iter().map(|tool| tool.name().to_string()).collect()
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Debug, Clone)]
pub struct InstallerConfig {
    /// The app's native library directory, where the tools are bundled.
    #[serde(default)]
    pub native_library_dir: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_tools")]
    pub tools: Vec<String>,
    #[serde(default)]
    pub shell: ShellConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ShellConfig {
    #[serde(default)]
    pub ksud_path: Option<PathBuf>,
    #[serde(default = "default_su")]
    pub su: String,
    #[serde(default = "default_true")]
    pub global_mount: bool,
    #[serde(default)]
    pub allow_unprivileged: bool,
    /// Run each command in a fresh `sh -c` instead of a persistent root shell.
    #[serde(default)]
    pub one_shot: bool,
}

fn default_su() -> String {
    "su".to_string()
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            ksud_path: None,
            su: default_su(),
            global_mount: true,
            allow_unprivileged: false,
            one_shot: false,
        }
    }
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            native_library_dir: PathBuf::new(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            tools: default_tools(),
            shell: ShellConfig::default(),
        }
    }
}

impl InstallerConfig {
    /// Parses and validates.
    pub fn from_toml_str(config_toml_content: &str) -> Result<InstallerConfig> {
        let config = Self::parse_toml_str(config_toml_content)?;
        config.validate()?;
        tracing::debug!("Successfully parsed and validated installer configuration.");
        Ok(config)
    }

    /// Parses without validating, so callers can apply overrides first.
    pub fn parse_toml_str(config_toml_content: &str) -> Result<InstallerConfig> {
        match toml::from_str(config_toml_content) {
            Ok(cfg) => Ok(cfg),
            Err(e) => {
                tracing::error!(error = %e, "Failed to parse TOML content");
                Err(anyhow!(e)).context("Failed to parse configuration TOML content. Check TOML syntax.")
            }
        }
    }

    /// Checks everything an install or status run depends on.
    /// Call again after applying CLI overrides.
    pub fn validate(&self) -> Result<()> {
        if self.native_library_dir.as_os_str().is_empty() {
            return Err(anyhow!(
                "'native_library_dir' is not set (config file or --native-lib-dir)."
            ));
        }
        if !self.native_library_dir.is_absolute() {
            return Err(anyhow!(
                "'native_library_dir' must be an absolute path, got '{}'.",
                self.native_library_dir.display()
            ));
        }
        if self.tools.is_empty() {
            return Err(anyhow!("'tools' lists no tools to install."));
        }
        let mut seen = HashSet::new();
        for name in &self.tools {
            let tool: Tool = name.parse()?;
            if !seen.insert(tool) {
                return Err(anyhow!("Tool '{}' is listed more than once.", name));
            }
        }
        self.validate_shell()
    }

    /// Checks only what opening a session needs.
    pub fn validate_shell(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("'command_timeout_secs' must be greater than zero."));
        }
        if self.shell.su.trim().is_empty() {
            return Err(anyhow!("'shell.su' is empty."));
        }
        if let Some(ksud) = &self.shell.ksud_path {
            if ksud.as_os_str().is_empty() {
                return Err(anyhow!("'shell.ksud_path' is empty."));
            }
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// The configured tools, in order. Assumes [`validate`](Self::validate) passed.
    pub fn selected_tools(&self) -> Result<Vec<Tool>> {
        self.tools
            .iter()
            .map(|name| name.parse::<Tool>().map_err(anyhow::Error::from))
            .collect()
    }

    pub fn launcher(&self) -> RootShellLauncher {
        RootShellLauncher {
            ksud_path: self.shell.ksud_path.clone(),
            su: self.shell.su.clone(),
            global_mount: self.shell.global_mount,
            allow_unprivileged: self.shell.allow_unprivileged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config_content() -> String {
        r#"
            native_library_dir = "/data/app/~~abc/com.sukisu.ultra-1/lib/arm64"
            command_timeout_secs = 12
            tools = ["susfsd", "kpmmgr"]

            [shell]
            ksud_path = "/data/app/~~abc/com.sukisu.ultra-1/lib/arm64/libzakozako.so"
            global_mount = false
            allow_unprivileged = true
        "#
        .to_string()
    }

    #[test]
    fn test_config_parse_success() {
        let content = valid_config_content();
        let result = InstallerConfig::from_toml_str(&content);
        assert!(result.is_ok(), "Parse failed: {:?}\nContent:\n{}", result.err(), content);
        let config = result.unwrap();
        assert_eq!(config.command_timeout(), Duration::from_secs(12));
        assert_eq!(config.selected_tools().unwrap(), vec![Tool::Susfsd, Tool::Kpmmgr]);
        assert!(!config.shell.global_mount);
        assert!(!config.shell.one_shot);
        let launcher = config.launcher();
        assert!(launcher.allow_unprivileged);
        assert_eq!(launcher.su, "su");
    }

    #[test]
    fn test_config_defaults() {
        let config =
            InstallerConfig::from_toml_str(r#"native_library_dir = "/data/app/x/lib/arm64""#).unwrap();
        assert_eq!(config.command_timeout_secs, DEFAULT_COMMAND_TIMEOUT_SECS);
        assert_eq!(config.selected_tools().unwrap(), Tool::ALL.to_vec());
        assert!(config.shell.global_mount);
        assert!(!config.shell.allow_unprivileged);
        assert!(config.shell.ksud_path.is_none());
    }

    #[test]
    fn test_config_missing_native_library_dir() {
        let result = InstallerConfig::from_toml_str("command_timeout_secs = 5");
        let error_string = result.err().unwrap().to_string();
        assert!(error_string.contains("'native_library_dir' is not set"), "Unexpected error message: {}", error_string);
    }

    #[test]
    fn test_config_rejects_relative_dir_and_zero_timeout() {
        assert!(InstallerConfig::from_toml_str(r#"native_library_dir = "lib/arm64""#).is_err());
        let result = InstallerConfig::from_toml_str(
            r#"
                native_library_dir = "/lib"
                command_timeout_secs = 0
            "#,
        );
        assert!(result.err().unwrap().to_string().contains("greater than zero"));
    }

    #[test]
    fn test_config_rejects_unknown_and_duplicate_tools() {
        let unknown = InstallerConfig::from_toml_str(
            r#"
                native_library_dir = "/lib"
                tools = ["kpmmgr", "magiskboot"]
            "#,
        );
        assert!(unknown.err().unwrap().to_string().contains("magiskboot"));

        let duplicate = InstallerConfig::from_toml_str(
            r#"
                native_library_dir = "/lib"
                tools = ["kpmmgr", "kpmmgr"]
            "#,
        );
        assert!(duplicate.err().unwrap().to_string().contains("more than once"));
    }

    #[test]
    fn test_parse_defers_validation() {
        let mut config = InstallerConfig::parse_toml_str("command_timeout_secs = 5").unwrap();
        assert!(config.validate().is_err());
        assert!(config.validate_shell().is_ok());
        config.native_library_dir = PathBuf::from("/data/app/x/lib/arm64");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_bad_toml() {
        let result = InstallerConfig::from_toml_str("native_library_dir = ");
        assert!(result.is_err());
    }
}
