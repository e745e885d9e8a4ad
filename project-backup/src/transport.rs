//! Remote upload through rclone.

use crate::config::RemoteConfig;
use crate::exec::CommandRunner;
use std::path::Path;
use tracing::{info, warn};

/// Result of pushing a bundle to the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    Failed(String),
}

impl UploadOutcome {
    pub fn is_uploaded(&self) -> bool {
        matches!(self, UploadOutcome::Uploaded)
    }
}

/// `<remote>:<folder>` destination string
pub fn remote_target(remote: &RemoteConfig) -> String {
    format!("{}:{}", remote.remote, remote.folder)
}

/// Copy `bundle` to the configured remote. Failures are logged, never raised.
pub async fn upload_bundle(
    bundle: &Path,
    remote: &RemoteConfig,
    runner: &dyn CommandRunner,
) -> UploadOutcome {
    let args = vec![
        "copy".to_string(),
        bundle.to_string_lossy().into_owned(),
        remote_target(remote),
    ];

    match runner.run(&remote.rclone_bin, &args).await {
        Ok(status) if status.success() => {
            info!("Uploaded to remote folder: {}", remote.folder);
            UploadOutcome::Uploaded
        }
        Ok(status) => {
            warn!("Upload to remote failed ({} {})", remote.rclone_bin, status);
            UploadOutcome::Failed(status.to_string())
        }
        Err(e) => {
            warn!("Upload to remote failed: cannot run {}: {}", remote.rclone_bin, e);
            UploadOutcome::Failed(e.to_string())
        }
    }
}
