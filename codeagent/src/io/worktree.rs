//! Isolated, branch-backed worktrees for individual tasks.
//!
//! Layout: `<git-root>/.worktrees/do-<task-id>/` checked out on `do/<task-id>`.
//! Both persist after the wrapper exits. Concurrent invocations coordinate only
//! through git's branch creation: if two draw the same task id, one fails.

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::core::task_id::{Clock, EntropySource, generate_task_id};
use crate::error::WrapperError;
use crate::io::entropy::{OsEntropy, SystemClock};
use crate::io::git::Git;

/// Directory under the git root that holds task worktrees.
pub const WORKTREES_DIR: &str = ".worktrees";

/// A provisioned worktree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreePaths {
    /// Absolute worktree directory.
    pub dir: PathBuf,
    /// Branch checked out in `dir`.
    pub branch: String,
    pub task_id: String,
}

impl WorktreePaths {
    /// Compute the paths for `task_id` under `git_root`.
    pub fn for_task(git_root: &Path, task_id: &str) -> Self {
        Self {
            dir: git_root.join(WORKTREES_DIR).join(format!("do-{task_id}")),
            branch: format!("do/{task_id}"),
            task_id: task_id.to_string(),
        }
    }
}

/// Create a worktree for a new task using OS entropy and the local date.
pub fn create_worktree(project_dir: &Path) -> Result<WorktreePaths, WrapperError> {
    create_worktree_with(project_dir, &OsEntropy, &SystemClock)
}

/// Create a worktree for a new task inside the repository containing `project_dir`.
///
/// An empty `project_dir` means the current directory. A branch or directory
/// collision is a hard failure; there is no regenerate-and-retry.
#[instrument(skip_all, fields(project_dir = %project_dir.display()))]
pub fn create_worktree_with<E, C>(
    project_dir: &Path,
    entropy: &E,
    clock: &C,
) -> Result<WorktreePaths, WrapperError>
where
    E: EntropySource + ?Sized,
    C: Clock + ?Sized,
{
    let project_dir = if project_dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        project_dir
    };

    let git = Git::new(project_dir);
    if !git.is_inside_work_tree() {
        return Err(WrapperError::Repository(project_dir.to_path_buf()));
    }

    let git_root = git
        .show_toplevel()
        .map_err(|err| WrapperError::RootResolution {
            dir: project_dir.to_path_buf(),
            reason: format!("{err:#}"),
        })?;

    let task_id = generate_task_id(entropy, clock)?.to_string();
    let paths = WorktreePaths::for_task(&git_root, &task_id);

    let root_git = Git::new(&git_root);
    let output = root_git
        .add_worktree(&paths.branch, &paths.dir)
        .map_err(|err| WrapperError::WorktreeCreation {
            dir: paths.dir.clone(),
            reason: format!("{err:#}"),
            output: String::new(),
        })?;
    if !output.success {
        warn!(branch = %paths.branch, status = %output.status, "git worktree add failed");
        return Err(WrapperError::WorktreeCreation {
            dir: paths.dir,
            reason: output.status,
            output: output.text,
        });
    }

    info!(dir = %paths.dir.display(), branch = %paths.branch, "worktree created");
    Ok(paths)
}
