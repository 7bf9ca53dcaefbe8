/// Locating the most recent backup bundle
///
/// Bundle names carry a fixed-width `YYYYMMDD-HHMMSS` timestamp, so the
/// latest bundle is simply the lexically greatest `*.tgz` name.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::config::BackupConfig;
use crate::core::layout::{is_bundle_name, timestamp_token};
use crate::core::remote::{RemoteError, RemoteShell};
use crate::error::{Error, Result};

/// Where a bundle lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    Local(PathBuf),
    Remote { destination: String, path: String },
}

impl fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactLocation::Local(path) => write!(f, "{}", path.display()),
            ArtifactLocation::Remote { destination, path } => write!(f, "{}:{}", destination, path),
        }
    }
}

/// A backup bundle, identified by `{prefix}.{timestamp}.tgz`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub file_name: String,
    pub timestamp: String,
    pub location: ArtifactLocation,
}

impl ArtifactRef {
    /// Build a reference from a bundle file name, deriving its timestamp token
    pub fn from_file_name(file_name: &str, location: ArtifactLocation) -> Result<Self> {
        let timestamp = timestamp_token(file_name).ok_or_else(|| {
            Error::not_found(format!("{} does not follow prefix.timestamp.tgz", file_name))
        })?;

        Ok(Self {
            file_name: file_name.to_string(),
            timestamp: timestamp.to_string(),
            location,
        })
    }
}

/// Keep bundle names carrying a timestamp token and sort them oldest first
pub fn sort_candidates<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut bundles: Vec<String> = names
        .into_iter()
        .map(Into::into)
        .filter(|name| is_bundle_name(name) && timestamp_token(name).is_some())
        .collect();
    bundles.sort();
    bundles
}

/// The lexically greatest bundle name
pub fn select_latest<I, S>(names: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    sort_candidates(names).pop()
}

/// Bundle names directly under a local directory (non-recursive), oldest first
pub fn list_local(dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        Error::not_found(format!("cannot read backup directory {}: {}", dir.display(), e))
    })?;

    let names = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok());

    Ok(sort_candidates(names))
}

/// Bundle names in the remote directory, oldest first
pub async fn list_remote(remote: &RemoteShell, remote_dir: &str) -> Result<Vec<String>> {
    let names = remote.list_dir(remote_dir).await.map_err(|e| match e {
        RemoteError::TimedOut { .. } => Error::not_found(format!(
            "listing {} timed out: {}",
            remote.qualify(remote_dir),
            e
        )),
        _ => Error::not_found(format!("cannot list {}: {}", remote.qualify(remote_dir), e)),
    })?;

    Ok(sort_candidates(names))
}

/// Every available bundle for the configured transfer mode, oldest first
pub async fn list_artifacts(config: &BackupConfig) -> Result<Vec<ArtifactRef>> {
    if config.scp_enable {
        let remote = RemoteShell::from_config(config);
        let names = list_remote(&remote, &config.remote_dir).await?;
        names
            .iter()
            .map(|name| {
                ArtifactRef::from_file_name(
                    name,
                    ArtifactLocation::Remote {
                        destination: remote.destination().to_string(),
                        path: remote_join(&config.remote_dir, name),
                    },
                )
            })
            .collect()
    } else {
        let names = list_local(&config.backup_directory)?;
        names
            .iter()
            .map(|name| {
                ArtifactRef::from_file_name(
                    name,
                    ArtifactLocation::Local(config.backup_directory.join(name)),
                )
            })
            .collect()
    }
}

/// The most recent bundle, remotely or locally depending on transfer mode
pub async fn locate(config: &BackupConfig) -> Result<ArtifactRef> {
    let searched = if config.scp_enable {
        format!("{}:{}", config.remote_destination(), config.remote_dir)
    } else {
        config.backup_directory.display().to_string()
    };

    let artifact = list_artifacts(config)
        .await?
        .pop()
        .ok_or_else(|| Error::not_found(format!("no *.tgz bundle in {}", searched)))?;

    tracing::debug!(file = %artifact.file_name, location = %artifact.location, "located latest bundle");
    Ok(artifact)
}

pub(crate) fn remote_join(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_select_latest_picks_lexical_max() {
        let names = [
            "a.20230101-000000.tgz",
            "a.20230904-033002.tgz",
            "a.20230201-120000.tgz",
        ];
        assert_eq!(select_latest(names), Some("a.20230904-033002.tgz".to_string()));
    }

    #[test]
    fn test_select_latest_ignores_non_bundles() {
        let names = ["notes.txt", "a.20230101-000000.tgz", "z.partial"];
        assert_eq!(select_latest(names), Some("a.20230101-000000.tgz".to_string()));
        assert_eq!(select_latest(Vec::<String>::new()), None);
    }

    #[test]
    fn test_sort_candidates_drops_names_without_timestamp() {
        let names = ["a..tgz", "a.20230101-000000.tgz", "a.20230201-120000.tgz"];
        assert_eq!(
            sort_candidates(names),
            vec!["a.20230101-000000.tgz", "a.20230201-120000.tgz"]
        );
    }

    #[tokio::test]
    async fn test_stray_bundle_name_does_not_hide_valid_bundles() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.20230101-000000.tgz"), b"").unwrap();
        fs::write(dir.path().join("zzz..tgz"), b"").unwrap();

        let config = BackupConfig {
            backup_directory: dir.path().to_path_buf(),
            ..Default::default()
        };

        let artifacts = list_artifacts(&config).await.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(locate(&config).await.unwrap().file_name, "a.20230101-000000.tgz");
    }

    #[test]
    fn test_artifact_ref_derives_timestamp() {
        let artifact = ArtifactRef::from_file_name(
            "proj.20240101-010101.tgz",
            ArtifactLocation::Local(PathBuf::from("/backups/proj.20240101-010101.tgz")),
        )
        .unwrap();
        assert_eq!(artifact.timestamp, "20240101-010101");
    }

    #[tokio::test]
    async fn test_locate_local_is_non_recursive() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.20230101-000000.tgz"), b"").unwrap();
        fs::write(dir.path().join("a.20230201-120000.tgz"), b"").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/a.20991231-235959.tgz"), b"").unwrap();

        let config = BackupConfig {
            backup_directory: dir.path().to_path_buf(),
            ..Default::default()
        };

        let artifact = locate(&config).await.unwrap();
        assert_eq!(artifact.file_name, "a.20230201-120000.tgz");
        assert_eq!(
            artifact.location,
            ArtifactLocation::Local(dir.path().join("a.20230201-120000.tgz"))
        );
    }

    #[tokio::test]
    async fn test_locate_empty_directory_is_not_found() {
        let dir = TempDir::new().unwrap();
        let config = BackupConfig {
            backup_directory: dir.path().to_path_buf(),
            ..Default::default()
        };

        let err = locate(&config).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_locate_missing_directory_is_not_found() {
        let dir = TempDir::new().unwrap();
        let config = BackupConfig {
            backup_directory: dir.path().join("missing"),
            ..Default::default()
        };

        let err = locate(&config).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_locate_remote_failure_is_not_found() {
        let mut config = BackupConfig {
            scp_enable: true,
            ..Default::default()
        };
        config.ssh.ssh_program = "false".to_string();

        let err = locate(&config).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_remote_join() {
        assert_eq!(remote_join("/srv/backups/", "a.tgz"), "/srv/backups/a.tgz");
        assert_eq!(remote_join("backups", "a.tgz"), "backups/a.tgz");
    }
}
