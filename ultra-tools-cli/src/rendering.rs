// ultra-tools-cli/src/rendering.rs
use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;
use ultra_tools_core::{InstallReport, ToolOutcome, ToolStatus};

/// One line per tool, e.g. `kpmmgr  installed  /data/adb/ksu/bin/kpmmgr (755)`.
pub fn format_report(report: &InstallReport) -> Vec<String> {
    report
        .tools
        .iter()
        .map(|entry| {
            let name = format!("{:<8}", entry.tool.name());
            let path = entry.destination.display();
            match &entry.outcome {
                ToolOutcome::Installed { mode } => format!(
                    "{} {} {} ({:o})",
                    name.bold(),
                    "installed".green(),
                    path,
                    mode
                ),
                ToolOutcome::Skipped => format!(
                    "{} {} {} (already present)",
                    name.bold(),
                    "skipped  ".yellow(),
                    path
                ),
                ToolOutcome::Failed(e) => {
                    format!("{} {} {}: {}", name.bold(), "failed   ".red(), path, e)
                }
            }
        })
        .collect()
}

pub fn format_status(statuses: &[ToolStatus]) -> Vec<String> {
    statuses
        .iter()
        .map(|status| {
            let state = match (status.installed, status.mode) {
                (false, _) => "missing".red(),
                (true, Some(_)) if status.is_executable_by_all() => "installed".green(),
                (true, _) => "not executable".yellow(),
            };
            let mode = status
                .mode
                .map(|m| format!(" ({:o})", m))
                .unwrap_or_default();
            let bundled = if status.bundled {
                "bundled".normal()
            } else {
                "not bundled".red()
            };
            format!(
                "{} {}{} {}  [{}: {}]",
                format!("{:<8}", status.tool.name()).bold(),
                state,
                mode,
                status.destination.display(),
                bundled,
                status.source.display()
            )
        })
        .collect()
}

#[derive(Serialize)]
struct StatusJson<'a> {
    #[serde(flatten)]
    status: &'a ToolStatus,
    /// Octal rendering of `mode`, as `ls`/`stat` show it.
    mode_octal: Option<String>,
    executable_by_all: bool,
}

pub fn status_json(statuses: &[ToolStatus]) -> Result<String> {
    let entries: Vec<StatusJson> = statuses
        .iter()
        .map(|status| StatusJson {
            status,
            mode_octal: status.mode.map(|m| format!("{:o}", m)),
            executable_by_all: status.is_executable_by_all(),
        })
        .collect();
    serde_json::to_string_pretty(&entries).context("Failed to serialize status")
}
