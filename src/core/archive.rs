/// gzip-compressed tar bundles
///
/// Bundles are written and read in-process with `tar` + `flate2`.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};

use crate::error::{Error, Result};
use crate::utils::format_bytes;

/// One entry of a bundle listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub size: u64,
    pub is_dir: bool,
}

/// Listing of a bundle's entries, in archive order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn files(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter().filter(|e| !e.is_dir)
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.entries.iter().any(|e| e.path == path.as_ref())
    }

    pub fn total_size(&self) -> u64 {
        self.files().map(|e| e.size).sum()
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            if entry.is_dir {
                writeln!(f, "  {:>12}  {}/", "-", entry.path.display())?;
            } else {
                writeln!(f, "  {:>12}  {}", format_bytes(entry.size), entry.path.display())?;
            }
        }
        write!(
            f,
            "  {} files, {}",
            self.files().count(),
            format_bytes(self.total_size())
        )
    }
}

/// Archive `source_dir` into a gzip tar at `output`
///
/// Entries are stored under `archive_root/`, so extracting the bundle into a
/// directory reproduces `archive_root/...` there.
pub fn create_bundle(source_dir: &Path, archive_root: &str, output: &Path) -> Result<()> {
    let file = File::create(output).map_err(|e| Error::archive(output, e))?;

    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);
    builder.follow_symlinks(false);

    builder
        .append_dir_all(archive_root, source_dir)
        .map_err(|e| Error::archive(source_dir, e))?;

    let file = builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(|e| Error::archive(output, e))?;

    file.sync_all().map_err(|e| Error::archive(output, e))?;
    Ok(())
}

/// Extract a gzip tar bundle into `dest`
///
/// Entries whose path would land outside `dest` are rejected.
pub fn extract_bundle(bundle: &Path, dest: &Path) -> Result<()> {
    let file = File::open(bundle).map_err(|e| Error::archive(bundle, e))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);

    let entries = archive.entries().map_err(|e| Error::archive(bundle, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| Error::archive(bundle, e))?;
        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| Error::archive(bundle, e))?;

        if !unpacked {
            let path = entry.path().map(|p| p.display().to_string()).unwrap_or_default();
            return Err(Error::archive(
                bundle,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("entry escapes extraction directory: {}", path),
                ),
            ));
        }
    }

    Ok(())
}

/// List the entries of a gzip tar bundle
pub fn list_bundle(bundle: &Path) -> Result<Manifest> {
    let file = File::open(bundle).map_err(|e| Error::archive(bundle, e))?;
    let mut archive = Archive::new(GzDecoder::new(file));

    let mut manifest = Manifest::default();
    let entries = archive.entries().map_err(|e| Error::archive(bundle, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::archive(bundle, e))?;
        let header = entry.header();
        let path = entry
            .path()
            .map_err(|e| Error::archive(bundle, e))?
            .into_owned();

        manifest.entries.push(ManifestEntry {
            path,
            size: header.size().unwrap_or(0),
            is_dir: header.entry_type().is_dir(),
        });
    }

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
                (rel, fs::read(e.path()).unwrap())
            })
            .collect()
    }

    #[test]
    fn test_bundle_round_trip_preserves_tree() {
        let work = TempDir::new().unwrap();
        let source = work.path().join("stage/backup_files");
        fs::create_dir_all(source.join("20240101-010101")).unwrap();
        fs::write(source.join("20240101-010101/demo.sql"), b"CREATE TABLE t (id int);\n").unwrap();
        fs::write(source.join("20240101-010101/demo.media.tgz"), [0u8, 159, 146, 150, 255]).unwrap();

        let bundle = work.path().join("demo.20240101-010101.tgz");
        create_bundle(&source, "backup_files", &bundle).unwrap();

        let out = work.path().join("out");
        fs::create_dir_all(&out).unwrap();
        extract_bundle(&bundle, &out).unwrap();

        assert_eq!(snapshot(&source), snapshot(&out.join("backup_files")));
    }

    #[test]
    fn test_list_bundle() {
        let work = TempDir::new().unwrap();
        let source = work.path().join("backup_files");
        fs::create_dir_all(source.join("ts")).unwrap();
        fs::write(source.join("ts/demo.sql"), b"12345").unwrap();

        let bundle = work.path().join("demo.ts.tgz");
        create_bundle(&source, "backup_files", &bundle).unwrap();

        let manifest = list_bundle(&bundle).unwrap();
        assert!(manifest.contains("backup_files/ts/demo.sql"));
        assert_eq!(manifest.files().count(), 1);
        assert_eq!(manifest.total_size(), 5);
        assert!(manifest.to_string().contains("backup_files/ts/demo.sql"));
    }

    #[test]
    fn test_extract_rejects_corrupt_bundle() {
        let work = TempDir::new().unwrap();
        let bundle = work.path().join("broken.tgz");
        fs::write(&bundle, b"not a gzip stream").unwrap();

        let err = extract_bundle(&bundle, work.path()).unwrap_err();
        assert!(matches!(err, Error::Archive { .. }));
    }

    #[test]
    fn test_create_bundle_missing_source() {
        let work = TempDir::new().unwrap();
        let err = create_bundle(
            &work.path().join("missing"),
            "backup_files",
            &work.path().join("out.tgz"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Archive { .. }));
    }
}
