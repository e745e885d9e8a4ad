//! Bundle creation.
//!
//! A bundle is one deflate-compressed zip holding every file of the project
//! working copy. Entry names start with the working copy's own directory name,
//! so extracting a bundle recreates that folder. Bundles are laid out as
//! `<project backup dir>/<YYYY>/<MM>/<DD>/<project>_<YYYYMMDD_HHMMSS>.zip`.

use crate::fs::metadata::EntryMetadata;
use crate::fs::walker::{walk_directory, FileInfo, WalkOptions};
use crate::utils::errors::Result;
use chrono::{Datelike, NaiveDateTime, Timelike};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// File extension of every bundle
pub const BUNDLE_EXTENSION: &str = ".zip";

/// Timestamp embedded in bundle names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Suffix of a bundle still being written
const PARTIAL_SUFFIX: &str = ".partial";

/// A freshly written bundle
#[derive(Debug, Clone)]
pub struct Bundle {
    /// Absolute path of the archive
    pub path: PathBuf,

    /// Number of entries in the archive
    pub file_count: usize,

    /// Uncompressed size of all entries
    pub source_bytes: u64,

    /// Size of the archive on disk
    pub size: u64,
}

impl Bundle {
    /// Archive file name without its directory
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Dated directory a bundle created at `at` lives in.
pub fn bundle_dir(project_backup_dir: &Path, at: NaiveDateTime) -> PathBuf {
    project_backup_dir
        .join(at.format("%Y").to_string())
        .join(at.format("%m").to_string())
        .join(at.format("%d").to_string())
}

/// `<project lowercased>_<YYYYMMDD_HHMMSS>.zip`
pub fn bundle_file_name(project: &str, at: NaiveDateTime) -> String {
    format!(
        "{}_{}{}",
        project.to_lowercase(),
        at.format(TIMESTAMP_FORMAT),
        BUNDLE_EXTENSION
    )
}

/// Archive `source_root` into a new bundle stamped with `at`.
///
/// Missing directories are created. Any I/O failure propagates and leaves no
/// bundle behind.
pub fn create_bundle(
    source_root: &Path,
    project_backup_dir: &Path,
    project: &str,
    at: NaiveDateTime,
    options: &WalkOptions,
) -> Result<Bundle> {
    // Resolve `.` and `..` so entry names always start at the source's own name
    let source_root = fs::canonicalize(source_root)?;
    let anchor = source_root.parent().unwrap_or(&source_root);
    let files = walk_directory(&source_root, anchor, options)?;

    let dir = bundle_dir(project_backup_dir, at);
    fs::create_dir_all(&dir)?;

    let file_name = bundle_file_name(project, at);
    let final_path = dir.join(&file_name);
    let partial_path = dir.join(format!("{}{}", file_name, PARTIAL_SUFFIX));

    if let Err(e) = write_archive(&partial_path, &files) {
        if let Err(cleanup) = fs::remove_file(&partial_path) {
            warn!("Failed to remove partial bundle {}: {}", partial_path.display(), cleanup);
        }
        return Err(e);
    }

    fs::rename(&partial_path, &final_path)?;

    let size = fs::metadata(&final_path)?.len();
    let path = fs::canonicalize(&final_path)?;

    Ok(Bundle {
        path,
        file_count: files.len(),
        source_bytes: files.iter().map(|f| f.size).sum(),
        size,
    })
}

fn write_archive(path: &Path, files: &[FileInfo]) -> Result<()> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(path)?));

    for file_info in files {
        let metadata = EntryMetadata::from_path(&file_info.path)?;

        let mut options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(file_info.size >= u32::MAX as u64);
        if let Some(stamp) = metadata.modified.and_then(zip_datetime) {
            options = options.last_modified_time(stamp);
        }
        if let Some(mode) = metadata.permissions {
            options = options.unix_permissions(mode);
        }

        let name = file_info.archive_name();
        debug!("Adding {} ({} bytes)", name, file_info.size);

        zip.start_file(name, options)?;
        let mut source = File::open(&file_info.path)?;
        std::io::copy(&mut source, &mut zip)?;
    }

    let mut writer = zip.finish()?;
    writer.flush()?;
    writer.get_ref().sync_all()?;

    Ok(())
}

/// Zip timestamps cover 1980 through 2107 only.
fn zip_datetime(at: NaiveDateTime) -> Option<zip::DateTime> {
    zip::DateTime::from_date_and_time(
        u16::try_from(at.year()).ok()?,
        at.month() as u8,
        at.day() as u8,
        at.hour() as u8,
        at.minute() as u8,
        at.second() as u8,
    )
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::BackupError;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn at(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    fn read_entries(path: &Path) -> BTreeMap<String, Vec<u8>> {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut entries = BTreeMap::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).unwrap();
            assert_eq!(entry.compression(), CompressionMethod::Deflated);
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            entries.insert(entry.name().to_string(), content);
        }
        entries
    }

    #[test]
    fn test_bundle_naming() {
        let stamp = at(2024, 3, 7, 9, 5, 1);

        assert_eq!(bundle_file_name("WebSite", stamp), "website_20240307_090501.zip");
        assert_eq!(
            bundle_dir(Path::new("/backups/WebSite"), stamp),
            Path::new("/backups/WebSite").join("2024").join("03").join("07")
        );
    }

    #[test]
    fn test_create_bundle_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("work").join("website");
        fs::create_dir_all(source.join("src/assets")).unwrap();
        fs::create_dir_all(source.join("empty")).unwrap();
        fs::write(source.join("README.md"), b"# Website\n").unwrap();
        fs::write(source.join("src/index.html"), b"<html></html>").unwrap();
        fs::write(source.join("src/assets/logo.svg"), vec![b'x'; 10_000]).unwrap();

        let backups = temp_dir.path().join("backups").join("WebSite");
        let stamp = at(2024, 3, 7, 9, 5, 1);

        let bundle =
            create_bundle(&source, &backups, "WebSite", stamp, &WalkOptions::default()).unwrap();

        let expected_path = backups
            .join("2024/03/07/website_20240307_090501.zip")
            .canonicalize()
            .unwrap();
        assert_eq!(bundle.path, expected_path);
        assert!(bundle.path.is_absolute());
        assert_eq!(bundle.file_name(), "website_20240307_090501.zip");
        assert_eq!(bundle.file_count, 3);
        assert_eq!(bundle.source_bytes, 10 + 13 + 10_000);
        assert_eq!(bundle.size, fs::metadata(&bundle.path).unwrap().len());

        let entries = read_entries(&bundle.path);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries["website/README.md"], b"# Website\n");
        assert_eq!(entries["website/src/index.html"], b"<html></html>");
        assert_eq!(entries["website/src/assets/logo.svg"], vec![b'x'; 10_000]);

        // No temporary file left next to the bundle
        let siblings: Vec<_> = fs::read_dir(bundle.path.parent().unwrap()).unwrap().collect();
        assert_eq!(siblings.len(), 1);
    }

    #[test]
    fn test_excluded_names_not_archived() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("app");
        fs::create_dir_all(source.join("target/debug")).unwrap();
        fs::write(source.join("target/debug/app"), b"binary").unwrap();
        fs::write(source.join("Cargo.toml"), b"[package]").unwrap();

        let options = WalkOptions {
            exclude_names: vec!["target".to_string()],
        };
        let bundle = create_bundle(
            &source,
            &temp_dir.path().join("backups"),
            "app",
            at(2024, 1, 2, 3, 4, 5),
            &options,
        )
        .unwrap();

        let entries = read_entries(&bundle.path);
        assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["app/Cargo.toml"]);
    }

    #[test]
    fn test_missing_source_propagates() {
        let temp_dir = TempDir::new().unwrap();
        let backups = temp_dir.path().join("backups");

        let result = create_bundle(
            &temp_dir.path().join("missing"),
            &backups,
            "app",
            at(2024, 1, 2, 3, 4, 5),
            &WalkOptions::default(),
        );

        assert!(matches!(result, Err(BackupError::Io(_))));
        assert!(!backups.exists());
    }

    #[test]
    fn test_entry_names_anchored_after_resolving_dots() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("website");
        fs::create_dir_all(source.join("src")).unwrap();
        fs::write(source.join("README.md"), b"readme").unwrap();

        let bundle = create_bundle(
            &source.join("src").join(".."),
            &temp_dir.path().join("backups"),
            "website",
            at(2024, 1, 2, 3, 4, 5),
            &WalkOptions::default(),
        )
        .unwrap();

        let entries = read_entries(&bundle.path);
        assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["website/README.md"]);
    }

    #[test]
    #[cfg(unix)]
    fn test_socket_in_source_skipped() {
        use std::os::unix::net::UnixListener;

        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("svc");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("main.rs"), b"fn main() {}").unwrap();
        let _listener = UnixListener::bind(source.join("dev.sock")).unwrap();

        let bundle = create_bundle(
            &source,
            &temp_dir.path().join("backups"),
            "svc",
            at(2024, 1, 2, 3, 4, 5),
            &WalkOptions::default(),
        )
        .unwrap();

        assert_eq!(bundle.file_count, 1);
        assert_eq!(
            read_entries(&bundle.path).keys().collect::<Vec<_>>(),
            vec!["svc/main.rs"]
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_failed_write_leaves_no_partial_bundle() {
        use std::os::unix::fs::PermissionsExt;

        if !crate::fs::testing::permissions_enforced() {
            return;
        }

        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("app");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.txt"), b"readable").unwrap();
        let secret = source.join("b.txt");
        fs::write(&secret, b"unreadable").unwrap();
        // Listing still works, opening for the copy does not
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();

        let backups = temp_dir.path().join("backups");
        let stamp = at(2024, 1, 2, 3, 4, 5);
        let result = create_bundle(&source, &backups, "app", stamp, &WalkOptions::default());

        fs::set_permissions(&secret, fs::Permissions::from_mode(0o644)).unwrap();
        assert!(matches!(result, Err(BackupError::Io(_))));

        let day_dir = bundle_dir(&backups, stamp);
        let leftovers: Vec<_> = fs::read_dir(&day_dir).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_entry_metadata_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("tools");
        fs::create_dir_all(&source).unwrap();
        let script = source.join("deploy.sh");
        fs::write(&script, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let bundle = create_bundle(
            &source,
            &temp_dir.path().join("backups"),
            "tools",
            at(2024, 1, 2, 3, 4, 5),
            &WalkOptions::default(),
        )
        .unwrap();

        let mut archive = ZipArchive::new(File::open(&bundle.path).unwrap()).unwrap();
        let entry = archive.by_name("tools/deploy.sh").unwrap();
        assert_eq!(entry.unix_mode().map(|m| m & 0o777), Some(0o755));
        assert!(entry.last_modified().year() >= 2020);
    }

    #[test]
    fn test_zip_datetime_range() {
        assert!(zip_datetime(at(1979, 12, 31, 23, 59, 59)).is_none());
        assert!(zip_datetime(at(2024, 2, 29, 12, 0, 0)).is_some());
    }
}
