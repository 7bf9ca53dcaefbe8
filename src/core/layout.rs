/// Paths inside a staging area and file names of bundles
///
/// A bundle named `{prefix}.{timestamp}.tgz` holds
/// `backup_files/{timestamp}/{prefix}.sql` and
/// `backup_files/{timestamp}/{prefix}.media.tgz`.

use std::path::{Path, PathBuf};

use crate::utils::{BACKUP_ROOT_DIR, BUNDLE_EXTENSION, DATABASE_DUMP_SUFFIX, MEDIA_ARCHIVE_SUFFIX};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleLayout {
    staging_root: PathBuf,
    prefix: String,
    timestamp: String,
}

impl BundleLayout {
    pub fn new(staging_root: &Path, prefix: &str, timestamp: &str) -> Self {
        Self {
            staging_root: staging_root.to_path_buf(),
            prefix: prefix.to_string(),
            timestamp: timestamp.to_string(),
        }
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// `backup_files/`, the directory archived as the bundle root
    pub fn tree_root(&self) -> PathBuf {
        self.staging_root.join(BACKUP_ROOT_DIR)
    }

    /// `backup_files/{timestamp}/`
    pub fn timestamp_dir(&self) -> PathBuf {
        self.tree_root().join(&self.timestamp)
    }

    pub fn database_dump(&self) -> PathBuf {
        self.timestamp_dir()
            .join(format!("{}.{}", self.prefix, DATABASE_DUMP_SUFFIX))
    }

    pub fn media_archive(&self) -> PathBuf {
        self.timestamp_dir()
            .join(format!("{}.{}", self.prefix, MEDIA_ARCHIVE_SUFFIX))
    }

    /// `{prefix}.{timestamp}.tgz`
    pub fn bundle_name(&self) -> String {
        bundle_file_name(&self.prefix, &self.timestamp)
    }

    /// Where the bundle is written inside the staging area
    pub fn bundle_path(&self) -> PathBuf {
        self.staging_root.join(self.bundle_name())
    }
}

pub fn bundle_file_name(prefix: &str, timestamp: &str) -> String {
    format!("{}.{}.{}", prefix, timestamp, BUNDLE_EXTENSION)
}

/// Timestamp token embedded in a bundle name: the second `.`-separated field
///
/// Assumes `prefix.timestamp.tgz`; a prefix containing `.` yields the wrong
/// token.
pub fn timestamp_token(file_name: &str) -> Option<&str> {
    file_name.split('.').nth(1).filter(|token| !token.is_empty())
}

/// True for names ending in `.tgz`
pub fn is_bundle_name(file_name: &str) -> bool {
    file_name
        .strip_suffix(BUNDLE_EXTENSION)
        .is_some_and(|stem| stem.ends_with('.') && stem.len() > 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = BundleLayout::new(Path::new("/tmp/stage"), "demo", "20240101-010101");

        assert_eq!(layout.tree_root(), PathBuf::from("/tmp/stage/backup_files"));
        assert_eq!(
            layout.database_dump(),
            PathBuf::from("/tmp/stage/backup_files/20240101-010101/demo.sql")
        );
        assert_eq!(
            layout.media_archive(),
            PathBuf::from("/tmp/stage/backup_files/20240101-010101/demo.media.tgz")
        );
        assert_eq!(layout.bundle_name(), "demo.20240101-010101.tgz");
        assert_eq!(
            layout.bundle_path(),
            PathBuf::from("/tmp/stage/demo.20240101-010101.tgz")
        );
    }

    #[test]
    fn test_timestamp_token() {
        assert_eq!(timestamp_token("proj.20240101-010101.tgz"), Some("20240101-010101"));
        assert_eq!(timestamp_token("noext"), None);
        // Dotted prefixes are not supported, the second field is taken as is
        assert_eq!(timestamp_token("my.app.20240101-010101.tgz"), Some("app"));
    }

    #[test]
    fn test_is_bundle_name() {
        assert!(is_bundle_name("a.20230101-000000.tgz"));
        assert!(!is_bundle_name("a.20230101-000000.tar"));
        assert!(!is_bundle_name(".tgz"));
        assert!(!is_bundle_name("tgz"));
    }
}
