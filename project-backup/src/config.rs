//! Configuration management for a backup run.
//!
//! Loads configuration from environment variables, optionally seeded from a
//! `.env` file. The result is read once at startup and passed by reference to
//! every component.

use crate::utils::errors::{BackupError, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub storage: StorageConfig,
    pub remote: RemoteConfig,
    pub retention: RetentionConfig,
    pub notify: NotifyConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    /// Project name, used for the backup subdirectory and bundle prefix
    pub name: String,

    /// Repository to clone when the working copy is missing
    pub repo_url: Option<String>,

    /// Local working copy that gets archived
    pub dir: PathBuf,

    /// Version-control executable
    pub git_bin: String,

    /// File or directory names left out of the bundle
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root of all local backups (bundles land under `<root>/<project>`)
    pub backup_root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// rclone remote name
    pub remote: String,

    /// Folder on the remote
    pub folder: String,

    /// Remote-copy executable
    pub rclone_bin: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Days an ordinary bundle is kept
    pub days: u32,

    /// Weeks a Sunday bundle is kept
    pub weeks: u32,

    /// Months (of 30 days) a first-of-month bundle is kept
    pub months: u32,
}

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub enabled: bool,

    /// Webhook receiving the status payload
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log file mirrored from stdout
    pub file: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

// Default values, shared by `from_lookup` and `RetentionConfig::default`
fn default_git_bin() -> String {
    "git".to_string()
}

fn default_rclone_bin() -> String {
    "rclone".to_string()
}

fn default_retention_days() -> u32 {
    7
}

fn default_retention_weeks() -> u32 {
    4
}

fn default_retention_months() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: default_retention_days(),
            weeks: default_retention_weeks(),
            months: default_retention_months(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// `env_file` is loaded first when given; otherwise a `.env` in the
    /// working directory is used if present. Variables already set in the
    /// environment win over the file.
    pub fn from_env(env_file: Option<&Path>) -> Result<Self> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| {
                    BackupError::Config(format!("cannot load {}: {}", path.display(), e))
                })?;
            }
            None => {
                let _ = dotenvy::dotenv();
            }
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| BackupError::Config(format!("{} is not set", key)))
        };
        let number = |key: &str, default: u32| -> Result<u32> {
            match get(key) {
                Some(raw) => raw.trim().parse().map_err(|_| {
                    BackupError::Config(format!(
                        "{} must be a non-negative integer, got '{}'",
                        key, raw
                    ))
                }),
                None => Ok(default),
            }
        };

        let enabled = get("ENABLE_NOTIFY")
            .map(|v| v.trim().to_lowercase() == "true")
            .unwrap_or(false);
        let url = get("NOTIFY_URL");
        if enabled && url.is_none() {
            return Err(BackupError::Config(
                "ENABLE_NOTIFY is true but NOTIFY_URL is not set".to_string(),
            ));
        }

        Ok(Config {
            project: ProjectConfig {
                name: require("PROJECT_NAME")?,
                repo_url: get("GITHUB_REPO_URL"),
                dir: PathBuf::from(require("PROJECT_DIR")?),
                git_bin: get("GIT_BIN").unwrap_or_else(default_git_bin),
                exclude: get("BACKUP_EXCLUDE")
                    .map(|raw| {
                        raw.split(',')
                            .map(str::trim)
                            .filter(|name| !name.is_empty())
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            storage: StorageConfig {
                backup_root: PathBuf::from(require("BACKUP_DIR")?),
            },
            remote: RemoteConfig {
                remote: require("RCLONE_REMOTE")?,
                folder: require("RCLONE_FOLDER")?,
                rclone_bin: get("RCLONE_BIN").unwrap_or_else(default_rclone_bin),
            },
            retention: RetentionConfig {
                days: number("RETENTION_DAYS", default_retention_days())?,
                weeks: number("RETENTION_WEEKS", default_retention_weeks())?,
                months: number("RETENTION_MONTHS", default_retention_months())?,
            },
            notify: NotifyConfig { enabled, url },
            log: LogConfig {
                file: PathBuf::from(require("LOG_FILE")?),
                level: get("LOG_LEVEL").unwrap_or_else(default_log_level),
            },
        })
    }

    /// Directory holding this project's bundles: `<BACKUP_DIR>/<PROJECT_NAME>`
    pub fn project_backup_dir(&self) -> PathBuf {
        self.storage.backup_root.join(&self.project.name)
    }
}
