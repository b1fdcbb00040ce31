//! Git adapter for worktree provisioning.
//!
//! A small, explicit wrapper around `git` subprocess calls.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

/// Result of a git command whose output is kept for diagnosis.
#[derive(Debug)]
pub struct CombinedOutput {
    pub success: bool,
    pub status: String,
    /// stdout followed by stderr.
    pub text: String,
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// True if the working directory is inside a git work tree.
    ///
    /// Any failure (missing directory, git not installed) counts as "no".
    #[instrument(skip_all, fields(workdir = %self.workdir.display()))]
    pub fn is_inside_work_tree(&self) -> bool {
        match self.run_capture(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(out) => out.trim() == "true",
            Err(err) => {
                debug!(err = %err, "not inside a work tree");
                false
            }
        }
    }

    /// Absolute path of the repository's top-level directory.
    pub fn show_toplevel(&self) -> Result<PathBuf> {
        let out = self.run_capture(&["rev-parse", "--show-toplevel"])?;
        let root = out.trim();
        if root.is_empty() {
            return Err(anyhow!("git rev-parse --show-toplevel returned nothing"));
        }
        Ok(PathBuf::from(root))
    }

    /// `git worktree add -b <branch> <dir>` from the current HEAD.
    ///
    /// Returns the combined output whether or not git succeeded; only a failure
    /// to spawn git is an `Err`.
    #[instrument(skip_all, fields(branch = %branch, dir = %dir.display()))]
    pub fn add_worktree(&self, branch: &str, dir: &Path) -> Result<CombinedOutput> {
        let dir_arg = dir.to_string_lossy();
        let args = ["worktree", "add", "-b", branch, dir_arg.as_ref()];
        let output = self.run(&args)?;
        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        debug!(success = output.status.success(), "git worktree add finished");
        Ok(CombinedOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            text,
        })
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestRepo, current_branch};

    #[test]
    fn detects_work_tree() {
        let repo = TestRepo::new().expect("repo");
        assert!(Git::new(repo.path()).is_inside_work_tree());
    }

    #[test]
    fn plain_directory_is_not_a_work_tree() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(!Git::new(temp.path()).is_inside_work_tree());
    }

    #[test]
    fn missing_directory_is_not_a_work_tree() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(!Git::new(temp.path().join("missing")).is_inside_work_tree());
    }

    #[test]
    fn toplevel_is_stable_from_subdirectory() {
        let repo = TestRepo::new().expect("repo");
        let sub = repo.path().join("nested/deeper");
        std::fs::create_dir_all(&sub).expect("mkdir");

        let from_root = Git::new(repo.path()).show_toplevel().expect("root");
        let from_sub = Git::new(&sub).show_toplevel().expect("sub");
        assert_eq!(from_root, from_sub);
    }

    #[test]
    fn add_worktree_reports_failure_output() {
        let repo = TestRepo::new().expect("repo");
        let git = Git::new(repo.path());
        let branch = current_branch(repo.path()).expect("branch");

        let out = git
            .add_worktree(&branch, &repo.path().join(".worktrees/dup"))
            .expect("spawn git");
        assert!(!out.success);
        assert!(out.text.contains("already exists"), "output: {}", out.text);
    }
}
