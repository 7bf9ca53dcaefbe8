mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use backup_cli::core::signals::shutdown_signal;
use backup_cli::core::{
    locate::list_artifacts, run_backup, run_restore, BackupConfig, ConfigResolver, ShellTaskRunner,
};
use backup_cli::utils::progress;
use cli::{Cli, Commands, RunArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Backup(args) => handle_backup(args).await?,
        Commands::Restore(args) => handle_restore(args).await?,
        Commands::List(args) => handle_list(args).await?,
        Commands::Config(args) => handle_config(args)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("backup_cli=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve configuration from defaults, env files and flags
fn load_config(args: &RunArgs) -> Result<(BackupConfig, ConfigResolver)> {
    let resolver = if args.env_files.is_empty() {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        ConfigResolver::with_default_env_files(&cwd)
    } else {
        ConfigResolver::new(args.env_files.clone())
    };

    progress::step("Loading configuration");
    let resolved = resolver.resolve(&args.overrides())?;

    if resolved.env_files.is_empty() {
        progress::done("Configuration loaded (built-in defaults and flags)");
    } else {
        for path in &resolved.env_files {
            progress::done(format!("Loaded {}", path.display()));
        }
    }

    Ok((resolved.config, resolver))
}

fn task_runner(config: &BackupConfig) -> Result<ShellTaskRunner> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(ShellTaskRunner::new(config.commands.clone()).with_working_dir(cwd))
}

fn describe_destination(config: &BackupConfig) -> String {
    if config.scp_enable {
        format!("{}:{}", config.remote_destination(), config.remote_dir)
    } else {
        config.backup_directory.display().to_string()
    }
}

async fn handle_backup(args: RunArgs) -> Result<()> {
    let (config, _) = load_config(&args)?;
    let runner = task_runner(&config)?;

    println!(
        "Backing up '{}' to {}\n",
        config.filename_prefix,
        describe_destination(&config)
    );

    match run_backup(&config, &runner, shutdown_signal()).await {
        Ok(report) => {
            println!("\nArchive contents:");
            println!("{}", report.manifest);
            println!();
            progress::done(format!(
                "Backup completed in {}: {}",
                humantime::format_duration(round_secs(report.elapsed)),
                report.location
            ));
            Ok(())
        }
        Err(e) => {
            progress::fail("Backup failed");
            Err(e.into())
        }
    }
}

async fn handle_restore(args: RunArgs) -> Result<()> {
    let (config, _) = load_config(&args)?;
    let runner = task_runner(&config)?;

    println!(
        "Restoring '{}' from {}\n",
        config.filename_prefix,
        describe_destination(&config)
    );

    match run_restore(&config, &runner, shutdown_signal()).await {
        Ok(report) => {
            println!("\nArchive contents:");
            println!("{}", report.manifest);
            println!();
            progress::done(format!(
                "Restore completed in {}: {}",
                humantime::format_duration(round_secs(report.elapsed)),
                report.artifact.location
            ));
            Ok(())
        }
        Err(e) => {
            progress::fail("Restore failed");
            Err(e.into())
        }
    }
}

async fn handle_list(args: RunArgs) -> Result<()> {
    let (config, _) = load_config(&args)?;
    let artifacts = list_artifacts(&config).await?;

    println!("\nBundles in {}\n", describe_destination(&config));
    println!("{:<20} {}", "Timestamp", "Location");
    println!("{}", "-".repeat(72));

    for artifact in &artifacts {
        println!("{:<20} {}", artifact.timestamp, artifact.location);
    }

    if artifacts.is_empty() {
        println!("(none)");
    }

    Ok(())
}

fn handle_config(args: RunArgs) -> Result<()> {
    let (config, resolver) = load_config(&args)?;

    println!("\nEnv files consulted (later files win):");
    for path in resolver.env_files() {
        let marker = if path.is_file() { "found" } else { "missing" };
        println!("  {} ({})", path.display(), marker);
    }

    let rendered = toml::to_string_pretty(&config).context("Failed to serialize config")?;
    println!("\nEffective configuration:\n");
    println!("{}", rendered);

    Ok(())
}

fn round_secs(elapsed: std::time::Duration) -> std::time::Duration {
    std::time::Duration::from_secs(elapsed.as_secs())
}
