/// Backup producer
///
/// Runs the export collaborators into `backup_files/{timestamp}/` inside the
/// staging area, flushes what they wrote and archives the tree into
/// `{prefix}.{timestamp}.tgz` next to it.

use std::fs::{self, File};
use std::path::Path;
use walkdir::WalkDir;

use crate::core::archive::create_bundle;
use crate::core::config::BackupConfig;
use crate::core::layout::BundleLayout;
use crate::core::locate::{ArtifactLocation, ArtifactRef};
use crate::core::staging::{make_tree_readable, StagingArea};
use crate::core::tasks::{Asset, TaskRunner};
use crate::error::{Error, Result};
use crate::utils::{backup_timestamp_now, progress, BACKUP_ROOT_DIR};

/// Produce a bundle in the staging area, timestamped with the local clock
pub async fn produce<R: TaskRunner>(
    config: &BackupConfig,
    staging: &StagingArea,
    runner: &R,
) -> Result<ArtifactRef> {
    produce_at(config, staging, runner, &backup_timestamp_now()).await
}

/// Produce a bundle for an explicit timestamp
pub async fn produce_at<R: TaskRunner>(
    config: &BackupConfig,
    staging: &StagingArea,
    runner: &R,
    timestamp: &str,
) -> Result<ArtifactRef> {
    let layout = BundleLayout::new(staging.path(), &config.filename_prefix, timestamp);

    fs::create_dir_all(layout.timestamp_dir())?;
    progress::done(format!(
        "Created {}/{}",
        BACKUP_ROOT_DIR,
        layout.timestamp()
    ));

    let exports = [
        (Asset::Database, layout.database_dump()),
        (Asset::Media, layout.media_archive()),
    ];

    for (asset, path) in &exports {
        progress::step(format!("Exporting {} to {}", asset, path.display()));
        runner.export(*asset, path).await?;

        if !path.is_file() {
            return Err(Error::export(format!(
                "{} export finished but {} was not written",
                asset,
                path.display()
            )));
        }
        progress::done(format!("Exported {}", asset));
    }

    // Modes first: an export may leave its output unreadable to the owner.
    make_tree_readable(&layout.tree_root()).map_err(|e| {
        Error::export(format!("cannot make exported files readable: {}", e))
    })?;
    // Exports have exited; make sure their data is on disk before archiving.
    sync_tree(&layout.tree_root())
        .map_err(|e| Error::export(format!("cannot flush exported files: {}", e)))?;

    let bundle = layout.bundle_path();
    progress::step(format!("Archiving {} into {}", BACKUP_ROOT_DIR, layout.bundle_name()));
    create_bundle(&layout.tree_root(), BACKUP_ROOT_DIR, &bundle)?;
    progress::done(format!("Created {}", layout.bundle_name()));

    ArtifactRef::from_file_name(&layout.bundle_name(), ArtifactLocation::Local(bundle))
}

/// fsync every file and directory under `root`
fn sync_tree(root: &Path) -> Result<()> {
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_symlink() {
            continue;
        }
        File::open(entry.path())?.sync_all()?;
    }
    Ok(())
}
