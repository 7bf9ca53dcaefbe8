/// Ephemeral per-run working directory
///
/// `StagingArea::acquire` creates a uniquely named directory under a base
/// location. `release` consumes the handle and removes the tree, so it runs
/// at most once; a handle dropped without release (panic, cancelled run)
/// still removes the tree through the owned `TempDir`.

use std::fs;
use std::os::unix::fs::{lchown, MetadataExt, PermissionsExt};
use std::path::Path;
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::utils::STAGING_PREFIX;

#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Create a fresh staging directory under `base` (created if missing)
    pub fn acquire(base: &Path) -> Result<Self> {
        fs::create_dir_all(base)?;

        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .rand_bytes(10)
            .tempdir_in(base)?;

        tracing::debug!(path = %dir.path().display(), "acquired staging area");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the staging tree
    pub fn release(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();

        // Removal needs write access on every directory, whatever the
        // collaborators left behind.
        if let Err(e) = make_dirs_writable(&path) {
            tracing::debug!(error = %e, "could not relax staging permissions before removal");
        }

        self.dir.close()?;
        tracing::debug!(path = %path.display(), "released staging area");
        Ok(())
    }

    /// Hand every entry back to the owner of the staging directory
    ///
    /// With `privileged` set, `sudo -n chown -R` is tried first so files
    /// created by another principal (e.g. root inside a container) can be
    /// reclaimed. The in-process pass is best-effort: entries that cannot be
    /// chowned are left as they are.
    pub async fn normalize_ownership(&self, privileged: bool) -> Result<()> {
        let root = self.path();
        let meta = fs::metadata(root)?;
        let (uid, gid) = (meta.uid(), meta.gid());

        if privileged {
            let status = tokio::process::Command::new("sudo")
                .args(["-n", "chown", "-R"])
                .arg(format!("{}:{}", uid, gid))
                .arg(root)
                .stdin(std::process::Stdio::null())
                .kill_on_drop(true)
                .status()
                .await;

            match status {
                Ok(status) if status.success() => return make_dirs_writable(root),
                Ok(status) => {
                    tracing::warn!(%status, "privileged chown failed, falling back to in-process chown")
                }
                Err(e) => {
                    tracing::warn!(error = %e, "could not run sudo, falling back to in-process chown")
                }
            }
        }

        for entry in WalkDir::new(root).min_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable staging entry");
                    continue;
                }
            };

            let owned = entry
                .metadata()
                .map(|m| m.uid() == uid && m.gid() == gid)
                .unwrap_or(false);

            if !owned {
                if let Err(e) = lchown(entry.path(), Some(uid), Some(gid)) {
                    tracing::debug!(path = %entry.path().display(), error = %e, "chown failed");
                }
            }
        }

        make_dirs_writable(root)
    }
}

/// Give the owner rwx on every directory
pub(crate) fn make_dirs_writable(root: &Path) -> Result<()> {
    adjust_modes(root, 0o700, 0)
}

/// Let group and others read the tree (dirs also traversable)
pub(crate) fn make_tree_readable(root: &Path) -> Result<()> {
    adjust_modes(root, 0o755, 0o644)
}

/// OR the given bits into every entry's mode
///
/// Keeps going past entries it cannot change and reports the first failure.
fn adjust_modes(root: &Path, dir_bits: u32, file_bits: u32) -> Result<()> {
    let mut first_error: Option<Error> = None;

    // Pre-order walk: a directory is fixed before it is descended into.
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                first_error.get_or_insert(Error::Io(e.into()));
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            continue;
        }

        let bits = if file_type.is_dir() { dir_bits } else { file_bits };
        if bits == 0 {
            continue;
        }

        let result = entry
            .metadata()
            .map_err(|e| Error::Io(e.into()))
            .and_then(|meta| {
                let mode = meta.permissions().mode();
                if mode & bits != bits {
                    fs::set_permissions(entry.path(), fs::Permissions::from_mode(mode | bits))?;
                }
                Ok(())
            });

        if let Err(e) = result {
            tracing::debug!(path = %entry.path().display(), error = %e, "could not adjust mode");
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_creates_unique_directories() {
        let base = TempDir::new().unwrap();

        let first = StagingArea::acquire(base.path()).unwrap();
        let second = StagingArea::acquire(base.path()).unwrap();

        assert!(first.path().is_dir());
        assert_ne!(first.path(), second.path());
        assert!(first.path().starts_with(base.path()));
        let name = first.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(STAGING_PREFIX));
    }

    #[test]
    fn test_acquire_creates_missing_base() {
        let base = TempDir::new().unwrap();
        let nested = base.path().join("a/b");

        let staging = StagingArea::acquire(&nested).unwrap();
        assert!(staging.path().starts_with(&nested));
    }

    #[test]
    fn test_release_removes_tree() {
        let base = TempDir::new().unwrap();
        let staging = StagingArea::acquire(base.path()).unwrap();
        let path = staging.path().to_path_buf();
        fs::create_dir_all(path.join("backup_files/x")).unwrap();
        fs::write(path.join("backup_files/x/file"), b"data").unwrap();

        staging.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_release_handles_restrictive_modes() {
        let base = TempDir::new().unwrap();
        let staging = StagingArea::acquire(base.path()).unwrap();
        let path = staging.path().to_path_buf();
        let locked = path.join("locked");
        fs::create_dir_all(locked.join("inner")).unwrap();
        fs::write(locked.join("inner/file"), b"data").unwrap();
        fs::set_permissions(locked.join("inner"), fs::Permissions::from_mode(0o500)).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o500)).unwrap();

        staging.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_without_release_removes_tree() {
        let base = TempDir::new().unwrap();
        let path = {
            let staging = StagingArea::acquire(base.path()).unwrap();
            fs::write(staging.path().join("partial"), b"x").unwrap();
            staging.path().to_path_buf()
        };

        assert!(!path.exists());
    }

    #[test]
    fn test_make_tree_readable() {
        let base = TempDir::new().unwrap();
        let file = base.path().join("dump.sql");
        fs::write(&file, b"data").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o600)).unwrap();

        make_tree_readable(base.path()).unwrap();

        let mode = fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o644, 0o644);
    }

    #[tokio::test]
    async fn test_normalize_ownership_keeps_owned_tree() {
        let base = TempDir::new().unwrap();
        let staging = StagingArea::acquire(base.path()).unwrap();
        fs::create_dir_all(staging.path().join("backup_files")).unwrap();
        fs::write(staging.path().join("backup_files/a"), b"a").unwrap();

        staging.normalize_ownership(false).await.unwrap();

        let root_uid = fs::metadata(staging.path()).unwrap().uid();
        let file_uid = fs::metadata(staging.path().join("backup_files/a")).unwrap().uid();
        assert_eq!(root_uid, file_uid);
        staging.release().unwrap();
    }
}
