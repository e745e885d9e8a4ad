//! Local working copy management.

use crate::config::ProjectConfig;
use crate::exec::CommandRunner;
use crate::utils::errors::{BackupError, Result};
use tracing::{debug, info};

/// How the working copy came to be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    AlreadyPresent,
    Cloned,
}

/// Make sure the project directory exists, cloning the repository into it
/// when it does not. Any clone failure is fatal.
pub async fn ensure_source(
    project: &ProjectConfig,
    runner: &dyn CommandRunner,
) -> Result<SourceState> {
    if project.dir.exists() {
        debug!("Project directory present: {}", project.dir.display());
        return Ok(SourceState::AlreadyPresent);
    }

    let url = project.repo_url.as_deref().ok_or_else(|| {
        BackupError::Config(format!(
            "{} does not exist and GITHUB_REPO_URL is not set",
            project.dir.display()
        ))
    })?;

    info!("Cloning repository from {}", url);

    let args = vec![
        "clone".to_string(),
        url.to_string(),
        project.dir.to_string_lossy().into_owned(),
    ];

    let status = runner
        .run(&project.git_bin, &args)
        .await
        .map_err(|e| BackupError::Clone(format!("cannot run {}: {}", project.git_bin, e)))?;

    if !status.success() {
        return Err(BackupError::Clone(format!(
            "{} clone {} exited with {}",
            project.git_bin, url, status
        )));
    }

    Ok(SourceState::Cloned)
}
