//! Executor abstraction for agent invocation.
//!
//! The [`Executor`] trait decouples orchestration from process spawning.
//! Tests use scripted executors that return predetermined results.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::core::types::TaskResult;
use crate::error::WrapperError;
use crate::exit_codes;
use crate::io::process::{StreamLimits, is_not_found, run_command_streaming};
use crate::io::stream::{MAX_LINE_BYTES, StreamParser};

/// Parameters for one agent invocation.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Backend name, used in messages.
    pub backend: String,
    pub program: String,
    pub args: Vec<String>,
    /// Working directory for the agent process.
    pub workdir: PathBuf,
    /// Written to the agent's stdin when set; stdin is closed otherwise.
    pub stdin: Option<String>,
    pub timeout: Duration,
    /// Bytes of stderr kept for the error report.
    pub output_limit_bytes: usize,
    /// Extra environment for the child only.
    pub env: Vec<(&'static str, PathBuf)>,
}

/// Runs an agent and reports its outcome.
pub trait Executor {
    /// Never fails: every problem becomes a non-success [`TaskResult`].
    fn exec(&self, request: &ExecRequest) -> TaskResult;
}

/// Spawns the backend as a child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl Executor for ProcessExecutor {
    #[instrument(skip_all, fields(backend = %request.backend, timeout_secs = request.timeout.as_secs()))]
    fn exec(&self, request: &ExecRequest) -> TaskResult {
        info!(workdir = %request.workdir.display(), "starting agent");

        if !request.workdir.is_dir() {
            let err = WrapperError::Execution(format!(
                "invalid workdir {}: not an existing directory",
                request.workdir.display()
            ));
            warn!("{err}");
            return TaskResult::failure(exit_codes::INVALID, err.to_string());
        }

        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args).current_dir(&request.workdir);
        for (key, value) in &request.env {
            cmd.env(key, value);
        }

        let limits = StreamLimits {
            max_line_bytes: MAX_LINE_BYTES,
            stderr_tail_bytes: request.output_limit_bytes,
        };
        let stdin = request.stdin.as_ref().map(|text| text.as_bytes().to_vec());

        let (output, parser) = match run_command_streaming(
            cmd,
            stdin,
            request.timeout,
            limits,
            StreamParser::new(),
        ) {
            Ok(done) => done,
            Err(err) if is_not_found(&err) => {
                warn!(program = %request.program, "backend executable not found");
                return TaskResult::failure(
                    exit_codes::NOT_FOUND,
                    format!("{} command not found in PATH: {err:#}", request.program),
                );
            }
            Err(err) => {
                warn!(err = %format!("{err:#}"), "failed to run agent");
                return TaskResult::failure(
                    exit_codes::INVALID,
                    WrapperError::Execution(format!(
                        "failed to run {}: {err:#}",
                        request.program
                    ))
                    .to_string(),
                );
            }
        };
        let outcome = parser.finish();

        if output.timed_out {
            let err = WrapperError::Timeout {
                backend: request.backend.clone(),
                timeout_secs: request.timeout.as_secs(),
            };
            warn!("{err}");
            return TaskResult {
                session_id: outcome.session_id,
                ..TaskResult::failure(exit_codes::TIMEOUT, err.to_string())
            };
        }

        if !output.status.success() {
            let code = output.status.code().unwrap_or(exit_codes::INVALID);
            warn!(exit_code = code, "agent failed");
            let mut message = format!("{} exited with status {code}", request.backend);
            let stderr = output.stderr_text();
            if !stderr.is_empty() {
                message.push_str("\nstderr:\n");
                message.push_str(&output.stderr_truncated_notice(&request.backend));
                message.push_str(&stderr);
            }
            return TaskResult {
                session_id: outcome.session_id,
                ..TaskResult::failure(code, WrapperError::Execution(message).to_string())
            };
        }

        if outcome.message.is_empty() {
            warn!(events = outcome.events, "agent produced no message");
            let err = WrapperError::Execution(format!(
                "{} completed without agent_message output",
                request.backend
            ));
            return TaskResult {
                session_id: outcome.session_id,
                ..TaskResult::failure(exit_codes::INVALID, err.to_string())
            };
        }

        debug!(message_len = outcome.message.len(), "agent completed");
        TaskResult {
            exit_code: exit_codes::OK,
            message: outcome.message,
            session_id: outcome.session_id,
            ..TaskResult::default()
        }
    }
}
