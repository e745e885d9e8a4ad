//! External command capability.
//!
//! Cloning and uploading shell out to `git` and `rclone`. Both go through
//! [`CommandRunner`] so tests can substitute a recording fake.

use async_trait::async_trait;
use std::fmt;

/// Exit status of a finished subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
}

impl CommandStatus {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion. `Err` means the process could
    /// not be started at all.
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandStatus>;
}

/// Spawns real processes, inheriting stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandStatus> {
        tracing::debug!(program, ?args, "Running external command");
        let status = tokio::process::Command::new(program)
            .args(args)
            .status()
            .await?;
        Ok(CommandStatus { code: status.code() })
    }
}
