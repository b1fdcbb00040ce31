//! Run a single coding-agent task in an isolated, reproducible environment.
//!
//! One invocation prepares the environment, launches an external agent CLI
//! (codex, claude or gemini), and reports a structured result:
//!
//! - **[`core`]**: Pure, deterministic logic (task ids, input mode selection,
//!   result summaries). No I/O.
//! - **[`io`]**: Side-effecting operations (git worktrees, temp directory
//!   probing, stdin, process execution, settings and output files).
//!
//! [`run`] wires both together for the `codeagent` binary; [`cli`] turns
//! arguments, environment and the settings file into a [`cli::Config`].

pub mod cli;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
