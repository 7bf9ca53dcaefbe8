/// Delivering a produced bundle to its destination
///
/// Local mode moves the bundle into the backup directory; transfer mode
/// creates the remote directory over ssh and copies the bundle with scp.
/// Every failure is a `TransportError`; nothing is retried.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::config::BackupConfig;
use crate::core::locate::{remote_join, ArtifactLocation, ArtifactRef};
use crate::core::remote::RemoteShell;
use crate::error::{Error, Result};
use crate::utils::progress;

/// Where a delivered bundle ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalLocation {
    Local(PathBuf),
    Remote { destination: String, path: String },
}

impl fmt::Display for FinalLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalLocation::Local(path) => write!(f, "{}", path.display()),
            FinalLocation::Remote { destination, path } => write!(f, "{}:{}", destination, path),
        }
    }
}

/// Move or copy a staged bundle to its configured destination
pub async fn deliver(artifact: &ArtifactRef, config: &BackupConfig) -> Result<FinalLocation> {
    let source = match &artifact.location {
        ArtifactLocation::Local(path) => path,
        ArtifactLocation::Remote { .. } => {
            return Err(Error::transport(format!(
                "{} is not a local bundle and cannot be delivered",
                artifact.location
            )))
        }
    };

    if config.scp_enable {
        deliver_remote(source, &artifact.file_name, config).await
    } else {
        progress::step(format!(
            "Moving {} to {}",
            artifact.file_name,
            config.backup_directory.display()
        ));
        let dest = move_into(source, &config.backup_directory)?;
        progress::done(format!("Stored {}", dest.display()));
        Ok(FinalLocation::Local(dest))
    }
}

async fn deliver_remote(source: &Path, file_name: &str, config: &BackupConfig) -> Result<FinalLocation> {
    let remote = RemoteShell::from_config(config);
    let remote_dir = &config.remote_dir;

    progress::step(format!("Ensuring {} exists", remote.qualify(remote_dir)));
    remote.create_dir(remote_dir).await.map_err(|e| {
        Error::transport(format!("cannot create {}: {}", remote.qualify(remote_dir), e))
    })?;

    progress::step(format!("Copying {} to {}", file_name, remote.qualify(remote_dir)));
    remote.upload(source, remote_dir).await.map_err(|e| {
        Error::transport(format!("cannot copy {} to {}: {}", file_name, remote.qualify(remote_dir), e))
    })?;

    let location = FinalLocation::Remote {
        destination: remote.destination().to_string(),
        path: remote_join(remote_dir, file_name),
    };
    progress::done(format!("Copied to {}", location));
    Ok(location)
}

/// Move `source` into `dest_dir`, keeping its file name
///
/// A plain rename is tried first. If that fails (e.g. across filesystems)
/// the file is copied to a hidden sibling and renamed into place, so a
/// failure never leaves a partial bundle under the final name.
pub fn move_into(source: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let file_name = source
        .file_name()
        .ok_or_else(|| Error::transport(format!("{} has no file name", source.display())))?;

    fs::create_dir_all(dest_dir).map_err(|e| {
        Error::transport(format!("cannot create {}: {}", dest_dir.display(), e))
    })?;

    let dest = dest_dir.join(file_name);
    let rename_err = match fs::rename(source, &dest) {
        Ok(()) => return Ok(dest),
        Err(e) => e,
    };
    tracing::debug!(error = %rename_err, "rename failed, falling back to copy");

    let partial = dest_dir.join(format!(".{}.partial", file_name.to_string_lossy()));
    copy_then_rename(source, &partial, &dest).map_err(|copy_err| {
        let _ = fs::remove_file(&partial);
        Error::transport(format!(
            "cannot move {} to {}: {} (copy fallback: {})",
            source.display(),
            dest.display(),
            rename_err,
            copy_err
        ))
    })?;

    let _ = fs::remove_file(source);
    Ok(dest)
}

fn copy_then_rename(source: &Path, partial: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(source, partial)?;
    fs::File::open(partial)?.sync_all()?;
    fs::rename(partial, dest)
}
