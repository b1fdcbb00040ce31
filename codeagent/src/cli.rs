//! Command-line arguments and the merged invocation [`Config`].

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::warn;

use crate::core::types::{Mode, STDIN_MARKER};
use crate::error::WrapperError;
use crate::io::settings::{EnvSettings, Settings, validate_agent_name};

#[derive(Debug, Parser)]
#[command(
    name = "codeagent",
    version,
    about = "Run one coding-agent task in an isolated, reproducible environment"
)]
pub struct Cli {
    /// Agent backend: codex, claude or gemini.
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Named preset from the settings file.
    #[arg(long, global = true)]
    pub agent: Option<String>,

    #[arg(long, global = true)]
    pub model: Option<String>,

    #[arg(long, global = true)]
    pub reasoning_effort: Option<String>,

    /// Let the agent run tools without asking (claude only).
    #[arg(long, global = true)]
    pub skip_permissions: bool,

    /// Agent timeout in seconds.
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Write a JSON result file here.
    #[arg(long, global = true, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Run the task in a fresh git worktree on a new branch.
    #[arg(long, global = true)]
    pub worktree: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a new agent session. Use `-` as the task to read it from stdin.
    New {
        #[arg(allow_hyphen_values = true)]
        task: String,
        workdir: Option<PathBuf>,
    },
    /// Continue an existing session.
    Resume {
        session_id: String,
        #[arg(allow_hyphen_values = true)]
        task: String,
        workdir: Option<PathBuf>,
    },
}

/// Fully resolved invocation: flags, then environment, then settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub mode: Mode,
    pub task: String,
    /// Empty unless `mode` is [`Mode::Resume`].
    pub session_id: String,
    pub workdir: PathBuf,
    /// The task argument was the stdin marker.
    pub explicit_stdin: bool,
    pub backend: String,
    pub agent: Option<String>,
    pub model: Option<String>,
    pub reasoning_effort: Option<String>,
    pub skip_permissions: bool,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
    pub output: Option<PathBuf>,
    pub worktree: bool,
}

impl Config {
    pub fn from_cli(
        cli: Cli,
        settings: &Settings,
        env: &EnvSettings,
    ) -> Result<Self, WrapperError> {
        let (mode, session_id, task, workdir) = match cli.command {
            Command::New { task, workdir } => (Mode::New, String::new(), task, workdir),
            Command::Resume {
                session_id,
                task,
                workdir,
            } => {
                if session_id.trim().is_empty() {
                    return Err(WrapperError::config(
                        "resume mode requires: resume <session_id> <task>",
                    ));
                }
                (Mode::Resume, session_id, task, workdir)
            }
        };

        if task.trim().is_empty() {
            return Err(WrapperError::config("task text is empty"));
        }
        let workdir = workdir.unwrap_or_else(|| PathBuf::from("."));
        if workdir.as_os_str() == STDIN_MARKER {
            return Err(WrapperError::config(
                "invalid workdir: '-' is not a valid directory path",
            ));
        }

        let preset = match cli.agent.as_deref() {
            Some(name) => {
                validate_agent_name(name).map_err(|err| WrapperError::config(err.to_string()))?;
                let preset = settings.agents.get(name);
                if preset.is_none() {
                    warn!(agent = name, "unknown agent preset; using defaults");
                }
                preset
            }
            None => None,
        };

        let backend = cli
            .backend
            .or_else(|| preset.and_then(|p| p.backend.clone()))
            .unwrap_or_else(|| settings.default_backend.clone());
        let model = cli.model.or_else(|| preset.and_then(|p| p.model.clone()));
        let reasoning_effort = cli
            .reasoning_effort
            .or_else(|| preset.and_then(|p| p.reasoning_effort.clone()));

        let timeout_secs = match cli.timeout {
            Some(0) => return Err(WrapperError::config("--timeout must be > 0")),
            Some(secs) => secs,
            None => env.timeout_secs.unwrap_or(settings.timeout_secs),
        };
        let skip_permissions = cli.skip_permissions || env.skip_permissions.unwrap_or(false);

        Ok(Self {
            mode,
            explicit_stdin: task == STDIN_MARKER,
            task,
            session_id,
            workdir,
            backend,
            agent: cli.agent,
            model,
            reasoning_effort,
            skip_permissions,
            timeout: Duration::from_secs(timeout_secs),
            output_limit_bytes: settings.output_limit_bytes,
            output: cli.output,
            worktree: cli.worktree,
        })
    }
}
