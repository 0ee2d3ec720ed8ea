use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// ultra-tools: installs the manager's bundled helper tools into /data/adb/ksu/bin.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase message verbosity.
    ///
    /// Specify multiple times for more verbose output:
    ///  -v:  INFO level
    ///  -vv: DEBUG level (every shell command)
    ///  -vvv: TRACE level (every output line)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to UltraTools.toml. Searched for upwards from the current directory if omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// The app's native library directory (overrides the config file).
    #[arg(long, global = true)]
    pub native_lib_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy missing tools into place and make them world-executable.
    Install {
        /// Copy even when the destination already exists.
        #[arg(short, long)]
        force: bool,

        /// Only install these tools (repeatable). Defaults to the configured list.
        #[arg(short, long = "tool", value_name = "NAME")]
        tools: Vec<String>,
    },
    /// Show what is bundled and installed for each tool.
    Status {
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Check whether PATH is a regular file, as seen by the shell session.
    Exists {
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_install_with_tools() {
        let cli = Cli::parse_from([
            "ultra-tools",
            "-vv",
            "install",
            "--force",
            "--tool",
            "kpmmgr",
            "--native-lib-dir",
            "/data/app/x/lib/arm64",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.native_lib_dir, Some(PathBuf::from("/data/app/x/lib/arm64")));
        match cli.command {
            Commands::Install { force, tools } => {
                assert!(force);
                assert_eq!(tools, vec!["kpmmgr".to_string()]);
            }
            other => panic!("Unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_status_json() {
        let cli = Cli::parse_from(["ultra-tools", "status", "--json"]);
        assert!(matches!(cli.command, Commands::Status { json: true }));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["ultra-tools"]).is_err());
    }
}
