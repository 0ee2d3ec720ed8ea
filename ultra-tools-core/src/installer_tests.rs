// ultra-tools-core/src/installer_tests.rs

use crate::errors::InstallError;
use crate::installer::{InstallMode, ToolInstaller, ToolOutcome};
use crate::resolver::{NativeLibraryResolver, Tool, ToolDescriptor};
use crate::runner::CommandRunner;
use crate::shell::{CommandOutput, PersistentShell, ShellSession};
use async_trait::async_trait;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

const TIMEOUT: Duration = Duration::from_secs(10);

// --- Scripted session ---

#[derive(Clone)]
enum Reply {
    Output(CommandOutput),
    Broken,
}

/// Records every submitted command. Replies come from the first rule whose
/// prefix matches; anything unmatched succeeds with no output.
#[derive(Default)]
struct ScriptedShell {
    rules: Vec<(String, Reply)>,
    log: Mutex<Vec<String>>,
}

impl ScriptedShell {
    fn on(mut self, prefix: &str, status: i32, stdout: &str) -> Self {
        self.rules.push((
            prefix.to_string(),
            Reply::Output(CommandOutput {
                status,
                stdout: stdout.to_string(),
                stderr: if status == 0 {
                    String::new()
                } else {
                    format!("{}: failed\n", prefix)
                },
            }),
        ));
        self
    }

    fn broken_on(mut self, prefix: &str) -> Self {
        self.rules.push((prefix.to_string(), Reply::Broken));
        self
    }

    fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShellSession for ScriptedShell {
    async fn exec(&self, command: &str, _timeout: Duration) -> Result<CommandOutput, InstallError> {
        self.log.lock().unwrap().push(command.to_string());
        let reply = self
            .rules
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, reply)| reply.clone());
        match reply {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::Broken) => Err(InstallError::session("scripted session died")),
            None => Ok(CommandOutput::default()),
        }
    }
}

const KPM_SRC: &str = "/app/lib/libkpmmgr.so";
const KPM_DST: &str = "/adb/bin/kpmmgr";
const SUSFS_SRC: &str = "/app/lib/libzakozakozako.so";
const SUSFS_DST: &str = "/adb/bin/susfsd";

fn scripted_descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            tool: Tool::Kpmmgr,
            source: PathBuf::from(KPM_SRC),
            destination: PathBuf::from(KPM_DST),
        },
        ToolDescriptor {
            tool: Tool::Susfsd,
            source: PathBuf::from(SUSFS_SRC),
            destination: PathBuf::from(SUSFS_DST),
        },
    ]
}

fn scripted_installer(shell: Arc<ScriptedShell>) -> ToolInstaller {
    let session: Arc<dyn ShellSession> = shell;
    ToolInstaller::new(CommandRunner::new(session, TIMEOUT), scripted_descriptors())
}

/// Both destinations absent, both sources present, stat reports 755.
fn fresh_system() -> ScriptedShell {
    ScriptedShell::default()
        .on(&format!("test -f '{}'", KPM_DST), 1, "")
        .on(&format!("test -f '{}'", SUSFS_DST), 1, "")
        .on("stat -c %a", 0, "755\n")
}

// --- Scripted tests ---

#[tokio::test]
async fn test_fresh_install_runs_full_pipeline_in_order() {
    let shell = Arc::new(fresh_system());
    let report = scripted_installer(shell.clone()).try_to_install().await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.installed().count(), 2);
    let kpm_commands: Vec<String> = shell.commands().into_iter().take(7).collect();
    assert_eq!(
        kpm_commands,
        vec![
            "test -f '/adb/bin/kpmmgr'".to_string(),
            "test -f '/app/lib/libkpmmgr.so'".to_string(),
            "test ! -d '/adb/bin/kpmmgr'".to_string(),
            "cp -f '/app/lib/libkpmmgr.so' '/adb/bin/kpmmgr.ut-partial'".to_string(),
            "mv -f '/adb/bin/kpmmgr.ut-partial' '/adb/bin/kpmmgr'".to_string(),
            "chmod a+rx '/adb/bin/kpmmgr'".to_string(),
            "stat -c %a '/adb/bin/kpmmgr'".to_string(),
        ]
    );
    match &report.tools[0].outcome {
        ToolOutcome::Installed { mode } => assert_eq!(*mode, 0o755),
        other => panic!("Unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_present_destination_is_skipped() {
    let shell = Arc::new(ScriptedShell::default().on("stat -c %a", 0, "755\n"));
    let report = scripted_installer(shell.clone()).try_to_install().await.unwrap();

    assert!(report.is_success());
    assert!(report
        .tools
        .iter()
        .all(|t| matches!(t.outcome, ToolOutcome::Skipped)));
    assert_eq!(
        shell.commands(),
        vec![
            "test -f '/adb/bin/kpmmgr'".to_string(),
            "test -f '/adb/bin/susfsd'".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_force_copies_over_present_destination() {
    let shell = Arc::new(ScriptedShell::default().on("stat -c %a", 0, "755\n"));
    let report = scripted_installer(shell.clone())
        .with_mode(InstallMode::Force)
        .try_to_install()
        .await
        .unwrap();

    assert_eq!(report.installed().count(), 2);
    let commands = shell.commands();
    assert!(!commands.contains(&"test -f '/adb/bin/kpmmgr'".to_string()));
    assert!(commands.iter().any(|c| c.starts_with("cp -f '/app/lib/libkpmmgr.so'")));
}

#[tokio::test]
async fn test_failed_copy_never_reaches_chmod() {
    let shell = Arc::new(
        fresh_system().on("cp -f '/app/lib/libkpmmgr.so'", 1, ""),
    );
    let report = scripted_installer(shell.clone()).try_to_install().await.unwrap();

    assert!(!report.is_success());
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0.tool, Tool::Kpmmgr);
    assert!(matches!(failures[0].1, InstallError::CopyFailed { status: 1, .. }));

    let commands = shell.commands();
    assert!(!commands.contains(&"chmod a+rx '/adb/bin/kpmmgr'".to_string()));
    assert!(!commands.iter().any(|c| c.starts_with("mv -f '/adb/bin/kpmmgr.ut-partial'")));
    assert!(commands.contains(&"rm -f '/adb/bin/kpmmgr.ut-partial'".to_string()));
    // The second tool still installs.
    assert!(commands.contains(&"chmod a+rx '/adb/bin/susfsd'".to_string()));
    assert!(matches!(report.tools[1].outcome, ToolOutcome::Installed { .. }));
}

#[tokio::test]
async fn test_failed_rename_never_reaches_chmod() {
    let shell = Arc::new(fresh_system().on("mv -f '/adb/bin/kpmmgr.ut-partial'", 1, ""));
    let report = scripted_installer(shell.clone()).try_to_install().await.unwrap();

    assert!(matches!(report.tools[0].outcome, ToolOutcome::Failed(InstallError::CopyFailed { .. })));
    assert!(!shell.commands().contains(&"chmod a+rx '/adb/bin/kpmmgr'".to_string()));
}

#[tokio::test]
async fn test_missing_source_is_reported_without_copy() {
    let shell = Arc::new(fresh_system().on(&format!("test -f '{}'", SUSFS_SRC), 1, ""));
    let report = scripted_installer(shell.clone()).try_to_install().await.unwrap();

    match &report.tools[1].outcome {
        ToolOutcome::Failed(InstallError::SourceMissing(path)) => {
            assert_eq!(path, Path::new(SUSFS_SRC))
        }
        other => panic!("Unexpected outcome {:?}", other),
    }
    assert!(!shell.commands().iter().any(|c| c.starts_with("cp -f '/app/lib/libzakozakozako.so'")));
}

#[tokio::test]
async fn test_installed_tool_is_skipped_even_when_source_is_gone() {
    let shell = Arc::new(ScriptedShell::default().on(&format!("test -f '{}'", KPM_SRC), 1, ""));
    let report = scripted_installer(shell.clone()).try_to_install().await.unwrap();

    assert!(matches!(report.tools[0].outcome, ToolOutcome::Skipped));
    assert!(report.is_success());
    assert!(!shell.commands().contains(&format!("test -f '{}'", KPM_SRC)));
}

#[tokio::test]
async fn test_directory_destination_is_a_copy_failure() {
    let shell = Arc::new(fresh_system().on("test ! -d '/adb/bin/kpmmgr'", 1, ""));
    let report = scripted_installer(shell.clone()).try_to_install().await.unwrap();

    assert!(matches!(
        report.tools[0].outcome,
        ToolOutcome::Failed(InstallError::CopyFailed { .. })
    ));
    let commands = shell.commands();
    assert!(!commands.iter().any(|c| c.starts_with("cp -f '/app/lib/libkpmmgr.so'")));
    assert!(!commands.contains(&"chmod a+rx '/adb/bin/kpmmgr'".to_string()));
    assert!(matches!(report.tools[1].outcome, ToolOutcome::Installed { .. }));
}

#[tokio::test]
async fn test_missing_world_bits_fail_verification() {
    let shell = Arc::new(
        ScriptedShell::default()
            .on(&format!("test -f '{}'", KPM_DST), 1, "")
            .on("stat -c %a", 0, "750\n"),
    );
    let report = scripted_installer(shell).try_to_install().await.unwrap();
    assert!(matches!(
        report.tools[0].outcome,
        ToolOutcome::Failed(InstallError::PermissionCheck { mode: 0o750, .. })
    ));
    // The susfsd destination exists in this script, so it is skipped.
    assert!(matches!(report.tools[1].outcome, ToolOutcome::Skipped));
}

#[tokio::test]
async fn test_session_failure_aborts_remaining_tools() {
    let shell = Arc::new(fresh_system().broken_on("cp -f"));
    let result = scripted_installer(shell.clone()).try_to_install().await;

    assert!(matches!(result, Err(InstallError::Session(_))));
    assert!(!shell.commands().iter().any(|c| c.contains("susfsd")));
}

#[tokio::test]
async fn test_status_reports_without_mutation() {
    let shell = Arc::new(
        ScriptedShell::default()
            .on(&format!("test -f '{}'", SUSFS_DST), 1, "")
            .on("stat -c %a", 0, "755\n"),
    );
    let statuses = scripted_installer(shell.clone()).status().await.unwrap();

    assert_eq!(statuses.len(), 2);
    assert!(statuses[0].installed && statuses[0].bundled);
    assert_eq!(statuses[0].mode, Some(0o755));
    assert!(statuses[0].is_executable_by_all());
    assert!(!statuses[1].installed);
    assert_eq!(statuses[1].mode, None);
    assert!(!shell
        .commands()
        .iter()
        .any(|c| c.starts_with("cp") || c.starts_with("chmod") || c.starts_with("mv")));
}

// --- Real shell tests ---

struct Fixture {
    _dir: tempfile::TempDir,
    lib_dir: PathBuf,
    bin_dir: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let lib_dir = dir.path().join("app lib/arm64");
    let bin_dir = dir.path().join("adb's ksu/bin");
    fs::create_dir_all(&lib_dir).unwrap();
    fs::create_dir_all(&bin_dir).unwrap();
    for tool in Tool::ALL {
        let path = lib_dir.join(tool.bundled_file_name());
        fs::write(&path, format!("#!/bin/sh\necho {}\n", tool)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
    }
    Fixture {
        _dir: dir,
        lib_dir,
        bin_dir,
    }
}

fn real_installer(fx: &Fixture) -> ToolInstaller {
    let resolver = NativeLibraryResolver::new(&fx.lib_dir);
    let session: Arc<dyn ShellSession> = Arc::new(PersistentShell::spawn("sh", &[]).unwrap());
    let descriptors = Tool::ALL
        .into_iter()
        .map(|tool| {
            let mut d = ToolDescriptor::resolve(tool, &resolver).unwrap();
            d.destination = fx.bin_dir.join(tool.name());
            d
        })
        .collect();
    ToolInstaller::new(CommandRunner::new(session, TIMEOUT), descriptors)
}

#[tokio::test]
async fn test_real_install_if_missing() {
    let fx = fixture();
    let installer = real_installer(&fx);

    let report = installer.try_to_install().await.unwrap();
    assert!(report.is_success(), "{:?}", report);
    for tool in Tool::ALL {
        let dst = fx.bin_dir.join(tool.name());
        let src = fx.lib_dir.join(tool.bundled_file_name());
        assert_eq!(fs::read(&dst).unwrap(), fs::read(&src).unwrap());
        let mode = fs::metadata(&dst).unwrap().permissions().mode();
        assert_eq!(mode & 0o005, 0o005, "mode {:o}", mode);
    }

    // Second run leaves the installed files alone.
    fs::write(fx.lib_dir.join("libkpmmgr.so"), b"updated").unwrap();
    let report = installer.try_to_install().await.unwrap();
    assert!(report.tools.iter().all(|t| matches!(t.outcome, ToolOutcome::Skipped)));
    assert_ne!(fs::read(fx.bin_dir.join("kpmmgr")).unwrap(), b"updated");

    // An explicit refresh picks the update up.
    let report = installer
        .clone()
        .with_mode(InstallMode::Force)
        .try_to_install()
        .await
        .unwrap();
    assert_eq!(report.installed().count(), 2);
    assert_eq!(fs::read(fx.bin_dir.join("kpmmgr")).unwrap(), b"updated");
}

#[tokio::test]
async fn test_real_install_missing_parent_directory() {
    let fx = fixture();
    fs::remove_dir_all(&fx.bin_dir).unwrap();
    let installer = real_installer(&fx);

    let report = installer.try_to_install().await.unwrap();
    assert_eq!(report.failures().count(), 2);
    for (_, error) in report.failures() {
        assert!(matches!(error, InstallError::CopyFailed { .. }), "{:?}", error);
    }
    assert!(!fx.bin_dir.exists());
}

#[tokio::test]
async fn test_real_install_over_directory_destination() {
    let fx = fixture();
    let blocker = fx.bin_dir.join("kpmmgr");
    fs::create_dir(&blocker).unwrap();

    for mode in [InstallMode::IfMissing, InstallMode::Force] {
        let installer = real_installer(&fx).with_mode(mode);
        let report = installer.try_to_install().await.unwrap();
        assert!(
            matches!(report.tools[0].outcome, ToolOutcome::Failed(InstallError::CopyFailed { .. })),
            "{:?}: {:?}",
            mode,
            report.tools[0].outcome
        );
        assert!(matches!(report.tools[1].outcome, ToolOutcome::Installed { .. }));

        let statuses = installer.status().await.unwrap();
        assert!(!statuses[0].installed);
        assert_eq!(fs::read_dir(&blocker).unwrap().count(), 0);
        assert!(!fx.bin_dir.join("kpmmgr.ut-partial").exists());
    }
}

#[tokio::test]
async fn test_real_status() {
    let fx = fixture();
    let installer = real_installer(&fx);
    installer.try_to_install().await.unwrap();

    let statuses = installer.status().await.unwrap();
    assert!(statuses.iter().all(|s| s.bundled && s.installed && s.is_executable_by_all()));
}
