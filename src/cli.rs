/// CLI argument parsing

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use backup_cli::core::ConfigOverrides;

// Build timestamp injected at compile time
pub const VERSION_WITH_BUILD: &str = concat!(env!("CARGO_PKG_VERSION"), " (built: ", env!("BUILD_TIMESTAMP"), ")");

#[derive(Parser)]
#[command(name = "backup-cli")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    /// Show debug logs on stderr (RUST_LOG also works)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export database and media, archive them and deliver the bundle
    #[command(disable_help_flag = true)]
    Backup(RunArgs),

    /// Restore database and media from the latest bundle
    #[command(disable_help_flag = true)]
    Restore(RunArgs),

    /// List available bundles, oldest first
    #[command(disable_help_flag = true)]
    List(RunArgs),

    /// Show the resolved configuration
    #[command(disable_help_flag = true)]
    Config(RunArgs),
}

/// Flags shared by every command
///
/// `-h` selects the remote host, so help is only available as `--help`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Artifact filename prefix
    #[arg(short = 'f', long = "filename-startswith")]
    pub filename_startswith: Option<String>,

    /// Transfer the bundle over scp ("True"/"False")
    #[arg(short = 's', long = "scp-enable")]
    pub scp_enable: Option<String>,

    /// Local backup directory
    #[arg(short = 'd', long = "backup_directory")]
    pub backup_directory: Option<PathBuf>,

    /// Remote backup/restore directory
    #[arg(short = 'r', long = "remote-dir")]
    pub remote_dir: Option<String>,

    /// Remote host for ssh/scp
    #[arg(short = 'h', long = "host")]
    pub host: Option<String>,

    /// Remote username
    #[arg(short = 'u', long = "username")]
    pub username: Option<String>,

    /// Env file to read (repeatable, later files win); replaces the defaults
    #[arg(long = "env-file")]
    pub env_files: Vec<PathBuf>,

    /// Base directory for the staging area
    #[arg(long = "staging-dir")]
    pub staging_dir: Option<PathBuf>,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

impl RunArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            filename_prefix: self.filename_startswith.clone(),
            backup_directory: self.backup_directory.clone(),
            host: self.host.clone(),
            username: self.username.clone(),
            remote_dir: self.remote_dir.clone(),
            scp_enable: self.scp_enable.clone(),
            staging_dir: self.staging_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from([
            "backup-cli", "backup", "-f", "demo", "-s", "True", "-d", "/var/backups",
            "-r", "/srv/backups", "-h", "vault", "-u", "ops",
        ])
        .unwrap();

        let Commands::Backup(args) = cli.command else {
            panic!("expected backup command");
        };
        let overrides = args.overrides();
        assert_eq!(overrides.filename_prefix.as_deref(), Some("demo"));
        assert_eq!(overrides.scp_enable.as_deref(), Some("True"));
        assert_eq!(overrides.backup_directory, Some(PathBuf::from("/var/backups")));
        assert_eq!(overrides.remote_dir.as_deref(), Some("/srv/backups"));
        assert_eq!(overrides.host.as_deref(), Some("vault"));
        assert_eq!(overrides.username.as_deref(), Some("ops"));
    }

    #[test]
    fn test_long_flags_and_env_files() {
        let cli = Cli::try_parse_from([
            "backup-cli", "restore", "--backup_directory", "b", "--env-file", "one.env",
            "--env-file", "two.env", "--verbose",
        ])
        .unwrap();

        assert!(cli.verbose);
        let Commands::Restore(args) = cli.command else {
            panic!("expected restore command");
        };
        assert_eq!(args.backup_directory, Some(PathBuf::from("b")));
        assert_eq!(args.env_files, vec![PathBuf::from("one.env"), PathBuf::from("two.env")]);
        assert!(args.overrides().filename_prefix.is_none());
    }
}
