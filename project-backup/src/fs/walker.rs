//! Directory traversal for archiving.
//!
//! Collects every regular file below a root, with paths expressed relative to
//! an anchor directory (the root's parent when building a bundle).

use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Options for directory walking
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Entry names to skip, matched against a whole path component
    pub exclude_names: Vec<String>,
}

/// Information about a file discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the file
    pub path: PathBuf,

    /// Path relative to the anchor
    pub relative_path: PathBuf,

    /// File size in bytes (of the target, for symlinks)
    pub size: u64,

    /// Is this a symlink?
    pub is_symlink: bool,
}

impl FileInfo {
    /// Create FileInfo from a DirEntry.
    /// For symlinks, resolves to the target to get the real file size.
    /// Returns None if the symlink target is not a regular file or cannot be resolved.
    fn from_entry(entry: &DirEntry, anchor: &Path) -> Result<Option<Self>, walkdir::Error> {
        let path = entry.path().to_path_buf();
        let relative_path = path.strip_prefix(anchor).unwrap_or(&path).to_path_buf();
        let is_symlink = entry.path_is_symlink();

        let size = if is_symlink {
            match std::fs::metadata(&path) {
                Ok(resolved) if resolved.is_file() => resolved.len(),
                Ok(_) => {
                    debug!("Skipping symlink to non-regular file: {}", path.display());
                    return Ok(None);
                }
                Err(_) => {
                    debug!("Skipping broken symlink: {}", path.display());
                    return Ok(None);
                }
            }
        } else {
            entry.metadata()?.len()
        };

        Ok(Some(Self {
            path,
            relative_path,
            size,
            is_symlink,
        }))
    }

    /// Relative path with `/` separators, as stored in an archive.
    pub fn archive_name(&self) -> String {
        self.relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Walk a directory tree and collect all files
///
/// # Arguments
/// * `root` - Root directory to start walking from
/// * `anchor` - Directory the reported relative paths start from
/// * `options` - Walking options (exclusions)
///
/// # Returns
/// * `Ok(Vec<FileInfo>)` - All files found, in walk order
/// * `Err(walkdir::Error)` - If the root or a subdirectory cannot be read
pub fn walk_directory(
    root: &Path,
    anchor: &Path,
    options: &WalkOptions,
) -> Result<Vec<FileInfo>, walkdir::Error> {
    let mut files = Vec::new();

    let entries = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !should_exclude(e, &options.exclude_names));

    for entry in entries {
        let entry = entry?;

        // Directories are implied by the file paths inside them
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }

        // Sockets, FIFOs and device nodes cannot be archived
        if !file_type.is_file() && !file_type.is_symlink() {
            debug!("Skipping special file: {}", entry.path().display());
            continue;
        }

        if let Some(file_info) = FileInfo::from_entry(&entry, anchor)? {
            files.push(file_info);
        }
    }

    Ok(files)
}

/// Check if a directory entry should be excluded based on its name
fn should_exclude(entry: &DirEntry, names: &[String]) -> bool {
    let file_name = entry.file_name().to_string_lossy();
    names.iter().any(|name| file_name == name.as_str())
}
