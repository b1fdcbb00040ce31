//! Test-only helpers: scratch git repositories and scripted stand-ins for
//! entropy, clock, stdin, the exec probe and the executor.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use tempfile::TempDir;

use crate::cli::Config;
use crate::core::task_id::{Clock, EntropyError, EntropySource};
use crate::core::types::{Mode, TaskResult};
use crate::io::executor::{ExecRequest, Executor};
use crate::io::input::StdinSource;
use crate::io::tmpdir::{ExecProbe, ProbeError};

/// A throwaway git repository with one commit on its default branch.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp repo dir")?;
        let repo = Self { dir };
        repo.git(&["init", "--quiet"])?;
        repo.git(&["config", "user.email", "tests@example.com"])?;
        repo.git(&["config", "user.name", "codeagent tests"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        fs::write(repo.path().join("README.md"), "test repo\n").context("write README")?;
        repo.git(&["add", "README.md"])?;
        repo.git(&["commit", "--quiet", "-m", "initial"])?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn git(&self, args: &[&str]) -> Result<()> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            return Err(anyhow!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }
}

/// Current branch of the checkout at `dir`; errors on detached HEAD.
pub fn current_branch(dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(dir)
        .output()
        .context("spawn git rev-parse")?;
    if !output.status.success() {
        return Err(anyhow!(
            "git rev-parse failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if name == "HEAD" {
        return Err(anyhow!("detached HEAD"));
    }
    Ok(name)
}

/// Whether `refs/heads/<branch>` exists in the repository at `dir`.
pub fn branch_exists(dir: &Path, branch: &str) -> Result<bool> {
    let status = Command::new("git")
        .args(["show-ref", "--verify", "--quiet", &format!("refs/heads/{branch}")])
        .current_dir(dir)
        .status()
        .context("spawn git show-ref")?;
    Ok(status.success())
}

/// Hands out the same leading bytes on every call.
pub struct FixedEntropy {
    bytes: Vec<u8>,
}

impl FixedEntropy {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl EntropySource for FixedEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), EntropyError> {
        let Some(source) = self.bytes.get(..buf.len()) else {
            return Err(EntropyError::new(format!(
                "short read: wanted {} bytes, have {}",
                buf.len(),
                self.bytes.len()
            )));
        };
        buf.copy_from_slice(source);
        Ok(())
    }
}

/// Always fails.
pub struct FailingEntropy;

impl EntropySource for FailingEntropy {
    fn fill(&self, _buf: &mut [u8]) -> Result<(), EntropyError> {
        Err(EntropyError::new("entropy source unavailable"))
    }
}

pub struct FixedClock(pub NaiveDate);

impl FixedClock {
    pub fn ymd(year: i32, month: u32, day: u32) -> Self {
        Self(NaiveDate::from_ymd_opt(year, month, day).expect("valid date"))
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Scripted wrapper stdin.
pub struct ScriptedStdin {
    terminal: bool,
    data: Option<String>,
}

impl ScriptedStdin {
    /// Interactive terminal; reading it is a test bug.
    pub fn terminal() -> Self {
        Self {
            terminal: true,
            data: Some(String::new()),
        }
    }

    /// A pipe holding `text` (may be empty).
    pub fn piped(text: &str) -> Self {
        Self {
            terminal: false,
            data: Some(text.to_string()),
        }
    }

    /// A pipe whose read fails.
    pub fn failing() -> Self {
        Self {
            terminal: false,
            data: None,
        }
    }
}

impl StdinSource for ScriptedStdin {
    fn is_terminal(&self) -> bool {
        self.terminal
    }

    fn read_all(&mut self) -> io::Result<String> {
        match self.data.take() {
            Some(text) => Ok(text),
            None => Err(io::Error::other("stdin closed unexpectedly")),
        }
    }
}

/// Probe that passes everywhere except the listed directories.
pub struct StubProbe {
    fail_all: bool,
    failing: Vec<PathBuf>,
    probed: RefCell<Vec<PathBuf>>,
}

impl StubProbe {
    pub fn passing() -> Self {
        Self {
            fail_all: false,
            failing: Vec::new(),
            probed: RefCell::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::passing()
        }
    }

    pub fn failing_for<'a>(dirs: impl IntoIterator<Item = &'a Path>) -> Self {
        Self {
            failing: dirs.into_iter().map(Path::to_path_buf).collect(),
            ..Self::passing()
        }
    }

    /// Directories probed so far, in order.
    pub fn probed(&self) -> Vec<PathBuf> {
        self.probed.borrow().clone()
    }
}

impl ExecProbe for StubProbe {
    fn probe(&self, dir: &Path) -> Result<(), ProbeError> {
        self.probed.borrow_mut().push(dir.to_path_buf());
        if self.fail_all || self.failing.iter().any(|d| d == dir) {
            return Err(ProbeError::Io {
                stage: "execute",
                dir: dir.to_path_buf(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            });
        }
        Ok(())
    }
}

/// Returns queued results in order and records every request.
pub struct ScriptedExecutor {
    results: RefCell<VecDeque<TaskResult>>,
    requests: RefCell<Vec<ExecRequest>>,
}

impl ScriptedExecutor {
    pub fn new(results: Vec<TaskResult>) -> Self {
        Self {
            results: RefCell::new(results.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ExecRequest> {
        self.requests.borrow().clone()
    }
}

impl Executor for ScriptedExecutor {
    fn exec(&self, request: &ExecRequest) -> TaskResult {
        self.requests.borrow_mut().push(request.clone());
        self.results
            .borrow_mut()
            .pop_front()
            .expect("scripted executor ran out of results")
    }
}

/// A successful agent result.
pub fn success(message: &str, session_id: &str) -> TaskResult {
    TaskResult {
        message: message.to_string(),
        session_id: session_id.to_string(),
        ..TaskResult::default()
    }
}

/// A `new`-mode config for `task` with default settings.
pub fn config_for(task: &str) -> Config {
    Config {
        mode: Mode::New,
        task: task.to_string(),
        session_id: String::new(),
        workdir: PathBuf::from("."),
        explicit_stdin: false,
        backend: "codex".to_string(),
        agent: None,
        model: None,
        reasoning_effort: None,
        skip_permissions: false,
        timeout: Duration::from_secs(60),
        output_limit_bytes: 100_000,
        output: None,
        worktree: false,
    }
}
