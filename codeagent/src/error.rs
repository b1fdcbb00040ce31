//! Error kinds that abort an invocation.

use std::path::PathBuf;

use thiserror::Error;

pub use crate::core::task_id::EntropyError;

/// Errors surfaced to the caller of a wrapper invocation.
///
/// Temp-dir resolution has no variant here: it degrades instead of failing.
#[derive(Debug, Error)]
pub enum WrapperError {
    /// Malformed invocation or settings.
    #[error("{0}")]
    Config(String),

    /// The target directory is not inside a git work tree.
    #[error("not a git repository: {}", .0.display())]
    Repository(PathBuf),

    #[error("failed to get git root for {}: {reason}", .dir.display())]
    RootResolution { dir: PathBuf, reason: String },

    #[error(transparent)]
    Entropy(#[from] EntropyError),

    /// `git worktree add` failed; `output` is its combined stdout/stderr.
    #[error("failed to create worktree {}: {reason}\noutput: {output}", .dir.display())]
    WorktreeCreation {
        dir: PathBuf,
        reason: String,
        output: String,
    },

    /// The agent process failed to start or exited unsuccessfully.
    #[error("{0}")]
    Execution(String),

    #[error("{backend} execution timed out after {timeout_secs}s")]
    Timeout { backend: String, timeout_secs: u64 },

    #[error(transparent)]
    Serialization(#[from] OutputError),
}

impl WrapperError {
    pub fn config(message: impl Into<String>) -> Self {
        WrapperError::Config(message.into())
    }
}

/// Failure while writing the structured output file, by step.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to create output directory for {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to create output file {}: {source}", .path.display())]
    CreateFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write structured output to {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to close output file {}: {source}", .path.display())]
    Close {
        path: PathBuf,
        source: std::io::Error,
    },
}
