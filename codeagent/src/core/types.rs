//! Shared value types passed between the wrapper stages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::input_mode::{InputDecision, StdinReason};

/// Task argument that asks for the task text to be read from stdin.
pub const STDIN_MARKER: &str = "-";

/// Invocation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Start a fresh agent session.
    New,
    /// Continue an existing session by id.
    Resume,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::New => "new",
            Mode::Resume => "resume",
        }
    }
}

/// A task ready for execution: the resolved text and how it reaches the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    /// Task text actually handed to the agent.
    pub task: String,
    /// True when `task` is written to the agent's stdin.
    pub use_stdin: bool,
    /// Working directory for the agent process.
    pub workdir: PathBuf,
    /// Positional argument passed to the backend (`-` in stdin mode).
    pub target_arg: String,
    /// Every rule that selected stdin mode, in evaluation order.
    pub reasons: Vec<StdinReason>,
}

impl TaskSpec {
    pub fn new(task: String, workdir: PathBuf, decision: InputDecision) -> Self {
        let use_stdin = decision.use_stdin();
        let target_arg = if use_stdin {
            STDIN_MARKER.to_string()
        } else {
            task.clone()
        };
        Self {
            task,
            use_stdin,
            workdir,
            target_arg,
            reasons: decision.reasons,
        }
    }
}

/// Outcome of one agent process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub exit_code: i32,
    pub message: String,
    pub error: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub task_id: String,
}

impl TaskResult {
    /// Build a failed result with the given exit code and error text.
    pub fn failure(exit_code: i32, error: impl Into<String>) -> Self {
        Self {
            exit_code,
            error: error.into(),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && self.error.is_empty()
    }
}
