/// Backup and restore runs
///
/// A run acquires a staging area, races its steps against a shutdown signal
/// and releases the staging area whatever the outcome. A signal drops the
/// in-flight step (child processes are killed on drop) before cleanup.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::core::archive::{list_bundle, Manifest};
use crate::core::config::BackupConfig;
use crate::core::locate::{locate, ArtifactLocation, ArtifactRef};
use crate::core::staging::StagingArea;
use crate::core::tasks::TaskRunner;
use crate::core::transport::{deliver, FinalLocation};
use crate::core::{backup, restore};
use crate::error::{Error, Result};
use crate::utils::progress;

/// Outcome of a successful backup
#[derive(Debug, Clone)]
pub struct BackupReport {
    pub location: FinalLocation,
    pub manifest: Manifest,
    pub elapsed: Duration,
}

/// Outcome of a successful restore
#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub artifact: ArtifactRef,
    pub manifest: Manifest,
    pub elapsed: Duration,
}

/// Export, archive and deliver one bundle
pub async fn run_backup<R, S>(config: &BackupConfig, runner: &R, shutdown: S) -> Result<BackupReport>
where
    R: TaskRunner,
    S: Future<Output = &'static str>,
{
    let started = Instant::now();
    let staging = acquire(config)?;

    let outcome = tokio::select! {
        result = backup_steps(config, &staging, runner) => result,
        signal = shutdown => Err(Error::Interrupted { signal }),
    };

    let (location, manifest) = finish(staging, outcome, None).await?;
    Ok(BackupReport {
        location,
        manifest,
        elapsed: started.elapsed(),
    })
}

/// Locate the latest bundle and import it
pub async fn run_restore<R, S>(config: &BackupConfig, runner: &R, shutdown: S) -> Result<RestoreReport>
where
    R: TaskRunner,
    S: Future<Output = &'static str>,
{
    let started = Instant::now();

    let searched = if config.scp_enable {
        format!("{}:{}", config.remote_destination(), config.remote_dir)
    } else {
        config.backup_directory.display().to_string()
    };
    progress::step(format!("Looking for the latest backup in {}", searched));
    let artifact = locate(config).await?;
    progress::done(format!("Found {}", artifact.file_name));

    let staging = acquire(config)?;

    let outcome = tokio::select! {
        result = restore::produce(&artifact, &staging, config, runner) => result,
        signal = shutdown => Err(Error::Interrupted { signal }),
    };

    let manifest = finish(staging, outcome, Some(config.privileged_chown)).await?;
    Ok(RestoreReport {
        artifact,
        manifest,
        elapsed: started.elapsed(),
    })
}

async fn backup_steps<R: TaskRunner>(
    config: &BackupConfig,
    staging: &StagingArea,
    runner: &R,
) -> Result<(FinalLocation, Manifest)> {
    let artifact = backup::produce(config, staging, runner).await?;

    // List before delivery; a remote bundle is no longer readable afterwards.
    let manifest = match &artifact.location {
        ArtifactLocation::Local(path) => list_bundle(path)?,
        ArtifactLocation::Remote { .. } => Manifest::default(),
    };

    let location = deliver(&artifact, config).await?;
    Ok((location, manifest))
}

fn acquire(config: &BackupConfig) -> Result<StagingArea> {
    let staging = StagingArea::acquire(&config.staging_dir)?;
    progress::done(format!("Created staging area {}", staging.path().display()));
    Ok(staging)
}

/// Release the staging area and settle the run's result
///
/// `normalize` carries the privileged flag when ownership has to be
/// normalized first (restore). A release failure only surfaces when the run
/// itself succeeded; otherwise the original error wins and the release
/// failure is logged.
async fn finish<T>(staging: StagingArea, outcome: Result<T>, normalize: Option<bool>) -> Result<T> {
    if let Err(e) = &outcome {
        progress::fail(e.to_string());
    }

    if let Some(privileged) = normalize {
        if let Err(e) = staging.normalize_ownership(privileged).await {
            tracing::debug!(error = %e, "ownership normalization before cleanup failed");
        }
    }

    let path = staging.path().to_path_buf();
    progress::step(format!("Removing staging area {}", path.display()));
    let released = staging.release();

    match (outcome, released) {
        (Ok(value), Ok(())) => {
            progress::done("Staging area removed");
            Ok(value)
        }
        (Ok(_), Err(e)) => {
            progress::fail(format!("Could not remove {}: {}", path.display(), e));
            Err(e)
        }
        (Err(e), Ok(())) => {
            progress::done("Staging area removed");
            Err(e)
        }
        (Err(e), Err(release_err)) => {
            progress::warn(format!("Could not remove {}: {}", path.display(), release_err));
            tracing::warn!(error = %release_err, "staging release failed after run error");
            Err(e)
        }
    }
}
