//! Orchestration for a single `codeagent` invocation.

use std::slice;

use tracing::{info, instrument};

use crate::cli::Config;
use crate::core::types::TaskResult;
use crate::error::WrapperError;
use crate::io::backend::Backend;
use crate::io::executor::{ExecRequest, Executor};
use crate::io::input::{StdinSource, resolve_task_spec};
use crate::io::output::write_structured_output;
use crate::io::tmpdir::TempDirResolution;
use crate::io::worktree::create_worktree;

/// Run one task end to end.
///
/// Provisions a worktree when requested, resolves the task text, runs the
/// backend through `executor` and writes the `--output` file. Setup failures
/// are errors; an unsuccessful agent run is an `Ok` result with a non-zero
/// exit code.
#[instrument(skip_all, fields(mode = config.mode.as_str(), backend = backend.name(), worktree = config.worktree))]
pub fn run_task<S, E>(
    config: &Config,
    backend: &dyn Backend,
    stdin: &mut S,
    executor: &E,
    temp: &TempDirResolution,
) -> Result<TaskResult, WrapperError>
where
    S: StdinSource + ?Sized,
    E: Executor + ?Sized,
{
    let mut effective = config.clone();
    let mut task_id = String::new();
    if config.worktree {
        let paths = create_worktree(&config.workdir)?;
        info!(dir = %paths.dir.display(), branch = %paths.branch, "running in worktree");
        effective.workdir = paths.dir;
        task_id = paths.task_id;
    }

    let spec = resolve_task_spec(&effective, stdin)?;
    let args = backend.build_args(&effective, &spec.target_arg);
    info!(
        command = backend.command(),
        args = %args.join(" "),
        workdir = %spec.workdir.display(),
        use_stdin = spec.use_stdin,
        "launching agent"
    );

    let request = ExecRequest {
        backend: backend.name().to_string(),
        program: backend.command().to_string(),
        args,
        workdir: spec.workdir,
        stdin: spec.use_stdin.then_some(spec.task),
        timeout: effective.timeout,
        output_limit_bytes: effective.output_limit_bytes,
        env: temp.env_overrides(),
    };
    let mut result = executor.exec(&request);
    result.task_id = task_id;

    if let Some(path) = &config.output {
        write_structured_output(path, slice::from_ref(&result))?;
    }
    Ok(result)
}
