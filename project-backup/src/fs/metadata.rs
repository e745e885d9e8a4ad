//! File metadata carried into archive entries.
//!
//! Zip entries record a local-time modification stamp and, on Unix, the
//! permission bits of the source file.

use chrono::{DateTime, Local, NaiveDateTime};
use std::fs;
use std::path::Path;

/// Metadata copied onto an archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Last modified time in local time, if the platform reports it
    pub modified: Option<NaiveDateTime>,

    /// File permissions (Unix mode bits)
    pub permissions: Option<u32>,
}

impl EntryMetadata {
    /// Extract metadata from a file path, following symlinks
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;

        let modified = metadata
            .modified()
            .ok()
            .map(|t| DateTime::<Local>::from(t).naive_local());

        #[cfg(unix)]
        let permissions = {
            use std::os::unix::fs::PermissionsExt;
            Some(metadata.permissions().mode())
        };

        #[cfg(not(unix))]
        let permissions = None;

        Ok(Self {
            modified,
            permissions,
        })
    }
}
