//! Project Backup - Main entry point
//!
//! Runs one backup to completion and exits.

use anyhow::Result;
use clap::Parser;
use project_backup::utils::format::{format_bytes, format_duration};
use project_backup::{utils, BackupExecutor, Config};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Environment file to load instead of ./.env
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_env(args.env_file.as_deref())?;

    // Initialize logging; the guard flushes the log file on exit
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    let _log_guard = utils::logger::init(log_level, &config.log.file)?;

    tracing::debug!(
        "Starting project-backup v{} for {}",
        env!("CARGO_PKG_VERSION"),
        config.project.name
    );

    let executor = BackupExecutor::new(config);
    let summary = executor.execute().await?;

    tracing::info!(
        "Bundle {} ({} from {} in {} files) finished in {}",
        summary.bundle.file_name(),
        format_bytes(summary.bundle.size),
        format_bytes(summary.bundle.source_bytes),
        summary.bundle.file_count,
        format_duration(summary.duration_secs)
    );

    Ok(())
}
