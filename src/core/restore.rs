/// Restore producer
///
/// Fetches a located bundle into the staging area, hands ownership back to
/// the invoking user, extracts it and feeds the dump and media archive to
/// the import collaborators.

use std::fs;
use std::path::PathBuf;

use crate::core::archive::{extract_bundle, list_bundle, Manifest};
use crate::core::config::BackupConfig;
use crate::core::layout::BundleLayout;
use crate::core::locate::{ArtifactLocation, ArtifactRef};
use crate::core::remote::RemoteShell;
use crate::core::staging::StagingArea;
use crate::core::tasks::{Asset, TaskRunner};
use crate::error::{Error, Result};
use crate::utils::{progress, BACKUP_ROOT_DIR};

/// Restore `artifact` through the import collaborators
///
/// Returns the listing of the restored bundle.
pub async fn produce<R: TaskRunner>(
    artifact: &ArtifactRef,
    staging: &StagingArea,
    config: &BackupConfig,
    runner: &R,
) -> Result<Manifest> {
    let bundle = fetch(artifact, staging, config).await?;

    staging.normalize_ownership(config.privileged_chown).await?;

    progress::step(format!("Extracting {}", artifact.file_name));
    extract_bundle(&bundle, staging.path())?;
    progress::done(format!(
        "Extracted {}/{}",
        BACKUP_ROOT_DIR, artifact.timestamp
    ));

    let layout = BundleLayout::new(staging.path(), &config.filename_prefix, &artifact.timestamp);
    let imports = [
        (Asset::Database, layout.database_dump()),
        (Asset::Media, layout.media_archive()),
    ];

    // Check everything up front so a partial import never happens because
    // the second file is missing.
    for (asset, path) in &imports {
        if !path.is_file() {
            return Err(Error::import(format!(
                "{} does not contain the {} file {}",
                artifact.file_name,
                asset,
                path.strip_prefix(staging.path()).unwrap_or(path).display()
            )));
        }
    }

    for (asset, path) in &imports {
        progress::step(format!("Importing {} from {}", asset, path.display()));
        runner.import(*asset, path).await?;
        progress::done(format!("Imported {}", asset));
    }

    list_bundle(&bundle)
}

/// Bring the bundle into the staging area
async fn fetch(
    artifact: &ArtifactRef,
    staging: &StagingArea,
    config: &BackupConfig,
) -> Result<PathBuf> {
    let local = staging.path().join(&artifact.file_name);

    match &artifact.location {
        ArtifactLocation::Remote { path, .. } => {
            let remote = RemoteShell::from_config(config);
            progress::step(format!("Copying {} from {}", artifact.file_name, remote.destination()));
            remote.download(path, &local).await.map_err(|e| {
                Error::transport(format!("cannot copy {}: {}", remote.qualify(path), e))
            })?;
        }
        ArtifactLocation::Local(path) => {
            progress::step(format!("Copying {}", path.display()));
            fs::copy(path, &local).map_err(|e| {
                Error::transport(format!("cannot copy {}: {}", path.display(), e))
            })?;
        }
    }

    progress::done(format!("Fetched {}", artifact.file_name));
    Ok(local)
}
