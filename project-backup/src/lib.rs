//! Project Backup Library
//!
//! Clones a project if needed, zips it into a dated bundle, pushes the bundle
//! to an rclone remote, prunes old bundles under a daily/weekly/monthly
//! retention policy and reports the outcome to a webhook.

pub mod archive;
pub mod clock;
pub mod config;
pub mod exec;
pub mod executor;
pub mod fs;
pub mod notify;
pub mod retention;
pub mod source;
pub mod transport;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use executor::{BackupExecutor, RunSummary};
pub use utils::errors::BackupError;
pub type Result<T> = std::result::Result<T, BackupError>;
