// ultra-tools-cli/src/main.rs
mod models;
mod rendering;

use anyhow::{Context, Result};
use colored::*;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use ultra_tools_core::{
    CommandRunner, InstallMode, InstallerConfig, NativeLibraryResolver, OneShotShell,
    ShellSession, Tool, ToolInstaller,
};

use crate::models::cli::{Cli, Commands};
use crate::rendering::{format_report, format_status, status_json};

use clap::Parser;
use tracing::{debug, error, info, Level};
use tracing_subscriber::{
    fmt::{self, time::LocalTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const CONFIG_FILENAME: &str = "UltraTools.toml";
const LOG_FILE_NAME: &str = "ultra-tools.log";

fn find_config_file() -> Result<Option<PathBuf>> {
    let current_dir = env::current_dir().context("Failed to get current directory")?;
    let mut current = current_dir.as_path();
    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.is_file() {
            return Ok(Some(config_path));
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return Ok(None),
        }
    }
}

/// Loads the config file (explicit, discovered, or none), then applies CLI overrides.
fn load_cli_config(cli: &Cli) -> Result<InstallerConfig> {
    let config_path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => find_config_file()?,
    };

    let mut config = match config_path {
        Some(path) => {
            info!("Using configuration file at: {:?}", path);
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            InstallerConfig::parse_toml_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        }
        None => {
            debug!("No {} found; using defaults", CONFIG_FILENAME);
            InstallerConfig::default()
        }
    };

    if let Some(dir) = &cli.native_lib_dir {
        config.native_library_dir = dir.clone();
    }
    if let Commands::Install { tools, .. } = &cli.command {
        if !tools.is_empty() {
            config.tools = tools.clone();
        }
    }

    match &cli.command {
        Commands::Exists { .. } => config.validate_shell(),
        _ => config.validate(),
    }
    .context("Invalid configuration")?;
    Ok(config)
}

async fn open_session(config: &InstallerConfig) -> Result<Arc<dyn ShellSession>> {
    if config.shell.one_shot {
        info!("Using one-shot sh sessions");
        return Ok(Arc::new(OneShotShell::default()));
    }
    let session = config
        .launcher()
        .launch_session(config.command_timeout())
        .await
        .context("Failed to obtain a root shell")?;
    Ok(session)
}

async fn build_installer(config: &InstallerConfig) -> Result<ToolInstaller> {
    let tools: Vec<Tool> = config.selected_tools()?;
    let session = open_session(config).await?;
    let runner = CommandRunner::new(session, config.command_timeout());
    let resolver = NativeLibraryResolver::new(&config.native_library_dir);
    Ok(ToolInstaller::for_tools(runner, &tools, &resolver)?)
}

async fn handle_install(config: &InstallerConfig, force: bool) -> Result<bool> {
    let mode = if force {
        InstallMode::Force
    } else {
        InstallMode::IfMissing
    };
    let installer = build_installer(config).await?.with_mode(mode);
    let report = installer.try_to_install().await?;
    for line in format_report(&report) {
        println!("{}", line);
    }
    info!(
        installed = report.installed().count(),
        failed = report.failures().count(),
        "Install finished"
    );
    Ok(report.is_success())
}

async fn handle_status(config: &InstallerConfig, json: bool) -> Result<bool> {
    let installer = build_installer(config).await?;
    let statuses = installer.status().await?;
    if json {
        println!("{}", status_json(&statuses)?);
    } else {
        for line in format_status(&statuses) {
            println!("{}", line);
        }
    }
    Ok(statuses
        .iter()
        .all(|s| s.installed && s.is_executable_by_all()))
}

async fn handle_exists(config: &InstallerConfig, path: &Path) -> Result<bool> {
    let session = open_session(config).await?;
    let runner = CommandRunner::new(session, config.command_timeout());
    let exists = runner.exists(path).await?;
    println!("{}", exists);
    Ok(exists)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Ensure colored output is enabled for early errors
    colored::control::set_override(true);

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // --- Logging Setup ---
    let default_level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(default_level.into()));

    let log_dir = match dirs::cache_dir()
        .or_else(dirs::runtime_dir)
        .or_else(|| Some(env::temp_dir()))
        .map(|d| d.join("ultra-tools"))
    {
        Some(dir) => dir,
        None => {
            eprintln!("{}", "Error: Could not determine a suitable directory for log files.".red());
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("{} Failed to create log directory {}: {}", "Error:".red(), log_dir.display(), e);
        return ExitCode::FAILURE;
    }
    let log_path = log_dir.join(LOG_FILE_NAME);

    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME);
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(file_appender);

    let time_format_desc = match time::format_description::parse(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]",
    ) {
        Ok(desc) => desc,
        Err(e) => {
            eprintln!("Warning: Failed to parse time format, using default: {}", e);
            Vec::new()
        }
    };
    let local_timer = LocalTime::new(time_format_desc);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_writer)
        .with_ansi(false) // No colors in file
        .with_target(true)
        .with_line_number(true)
        .with_timer(local_timer.clone());

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(local_timer)
        .with_target(false)
        .with_level(true);

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("{} Failed to initialize logging: {}", "Error:".red(), e);
        return ExitCode::FAILURE;
    }
    colored::control::unset_override();

    info!(
        "Logging initialized (default level: {}). Logging to stderr and {}",
        default_level,
        log_path.display()
    );
    // --- End Logging Setup ---

    let config = match load_cli_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            eprintln!("{} {:#}", "Error:".red(), e);
            return ExitCode::FAILURE;
        }
    };

    let result = match &cli.command {
        Commands::Install { force, .. } => handle_install(&config, *force).await,
        Commands::Status { json } => handle_status(&config, *json).await,
        Commands::Exists { path } => handle_exists(&config, path).await,
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("Operation failed: {:#}", e);
            eprintln!("{} Operation failed: {:#}", "Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}
