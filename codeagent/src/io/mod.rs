//! Side-effecting operations: git, the filesystem, stdin and child processes.

pub mod backend;
pub mod entropy;
pub mod executor;
pub mod git;
pub mod input;
pub mod output;
pub mod process;
pub mod settings;
pub mod stream;
pub mod tmpdir;
pub mod worktree;
