//! Publishing the store file to version control.
//!
//! After a successful mutation the command layer may ask a [`Publisher`] to
//! record the change elsewhere. Publishing is a side effect: a failure is
//! reported and logged, but the local file write is never rolled back.

use std::path::PathBuf;
use std::process::Command;

use crate::error::AppError;

/// Sink for "the store changed" notifications.
pub trait Publisher {
    /// Record `change` (a one-line description) with the sink.
    fn publish(&self, change: &str) -> Result<(), AppError>;
}

/// Publisher that does nothing. Used when publishing is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl Publisher for NoopPublisher {
    fn publish(&self, change: &str) -> Result<(), AppError> {
        tracing::debug!("Publishing disabled, skipping: {}", change);
        Ok(())
    }
}

/// Commits the store file and pushes it with the `git` command line.
///
/// # Process
///
/// 1. `git add <file>`
/// 2. `git commit -m <change>`
/// 3. `git push`
///
/// Each step runs in `repo_dir`. The first failing step aborts the rest.
#[derive(Debug, Clone)]
pub struct GitPublisher {
    repo_dir: PathBuf,
    file: PathBuf,
}

impl GitPublisher {
    pub fn new(repo_dir: impl Into<PathBuf>, file: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            file: file.into(),
        }
    }

    fn git(&self, args: &[&str]) -> Result<(), AppError> {
        tracing::debug!("Running git {}", args.join(" "));

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
            .map_err(|e| AppError::Publish(format!("Failed to run git {}: {}", args[0], e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Publish(format!(
                "git {} exited with {}: {}",
                args[0],
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

impl Publisher for GitPublisher {
    fn publish(&self, change: &str) -> Result<(), AppError> {
        let file = self.file.to_string_lossy();

        self.git(&["add", &file])?;
        self.git(&["commit", "-m", change])?;
        self.git(&["push"])?;

        tracing::info!("Published change: {}", change);
        Ok(())
    }
}

/// Commit message for newly generated keys.
pub fn generated_message(count: usize) -> String {
    format!("Add {} key(s)", count)
}

/// Commit message for a redeemed key.
pub fn used_message(key: &str) -> String {
    format!("Mark key {} as used", key)
}

/// Commit message for an expiration cleanup.
pub fn cleaned_message(removed: usize) -> String {
    format!("Auto-clean: Remove {} expired keys", removed)
}
