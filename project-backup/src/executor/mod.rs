//! Backup run executor - sequences one complete backup.
//!
//! Steps, in order:
//! 1. ensure the project working copy exists (clone if missing)
//! 2. archive it into a dated bundle
//! 3. upload the bundle to the remote
//! 4. prune expired bundles
//! 5. notify the webhook
//!
//! Upload and notification failures are logged and the run goes on. Clone,
//! archive and prune failures end the run; a failure notification is sent
//! before the error is returned.

use crate::archive::{self, Bundle};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::exec::{CommandRunner, SystemRunner};
use crate::fs::walker::WalkOptions;
use crate::notify::{send_notification, NotificationPayload, NotifyOutcome, RunStatus};
use crate::retention::{self, PruneReport};
use crate::source::{ensure_source, SourceState};
use crate::transport::{upload_bundle, UploadOutcome};
use crate::utils::errors::{BackupError, Result};
use crate::utils::format::format_bytes;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Outcome of a completed run
#[derive(Debug)]
pub struct RunSummary {
    pub source: SourceState,
    pub bundle: Bundle,
    pub upload: UploadOutcome,
    pub prune: PruneReport,
    pub notify: NotifyOutcome,
    pub duration_secs: u64,
}

/// Main backup executor
pub struct BackupExecutor {
    config: Config,
    runner: Arc<dyn CommandRunner>,
    clock: Arc<dyn Clock>,
}

impl BackupExecutor {
    /// Create an executor backed by real processes and the system clock
    pub fn new(config: Config) -> Self {
        Self::with_capabilities(config, Arc::new(SystemRunner), Arc::new(SystemClock))
    }

    /// Create an executor with substitute process runner and clock
    pub fn with_capabilities(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            runner,
            clock,
        }
    }

    /// Execute one backup run
    pub async fn execute(&self) -> Result<RunSummary> {
        let start_time = Instant::now();

        info!("Backup started");

        let source = match ensure_source(&self.config.project, self.runner.as_ref()).await {
            Ok(state) => state,
            Err(e) => return Err(self.abort(e, None).await),
        };

        let bundle = match self.create_bundle().await {
            Ok(bundle) => bundle,
            Err(e) => return Err(self.abort(e, None).await),
        };
        info!(
            files = bundle.file_count,
            size = %format_bytes(bundle.size),
            "Created zip: {}",
            bundle.path.display()
        );

        let upload = upload_bundle(&bundle.path, &self.config.remote, self.runner.as_ref()).await;

        let prune = match self.prune().await {
            Ok(report) => report,
            Err(e) => return Err(self.abort(e, Some(&bundle)).await),
        };

        let payload = NotificationPayload::new(
            &self.config.project.name,
            self.clock.now(),
            RunStatus::BackupSuccessful,
            Some(bundle.file_name()),
        );
        let notify = send_notification(&self.config.notify, &payload).await;

        info!("Backup completed successfully");

        Ok(RunSummary {
            source,
            bundle,
            upload,
            prune,
            notify,
            duration_secs: start_time.elapsed().as_secs(),
        })
    }

    /// Archive the working copy on the blocking pool
    async fn create_bundle(&self) -> Result<Bundle> {
        let source_root = self.config.project.dir.clone();
        let backup_dir = self.config.project_backup_dir();
        let project = self.config.project.name.clone();
        let options = WalkOptions {
            exclude_names: self.config.project.exclude.clone(),
        };
        let at = self.clock.now();

        tokio::task::spawn_blocking(move || {
            archive::create_bundle(&source_root, &backup_dir, &project, at, &options)
        })
        .await?
    }

    /// Apply the retention policy on the blocking pool
    async fn prune(&self) -> Result<PruneReport> {
        let backup_dir = self.config.project_backup_dir();
        let policy = self.config.retention;
        let now = self.clock.now();

        tokio::task::spawn_blocking(move || retention::prune(&backup_dir, now, &policy)).await?
    }

    /// Log a fatal error and report it to the webhook before handing it back
    async fn abort(&self, err: BackupError, bundle: Option<&Bundle>) -> BackupError {
        error!("Backup failed: {}", err);

        let payload = NotificationPayload::new(
            &self.config.project.name,
            self.clock.now(),
            RunStatus::BackupFailed,
            bundle.map(Bundle::file_name),
        );
        send_notification(&self.config.notify, &payload).await;

        err
    }
}
