//! Read task text from stdin when needed and build the [`TaskSpec`].

use std::io::{self, IsTerminal, Read};

use tracing::{debug, instrument, warn};

use crate::cli::Config;
use crate::core::input_mode::select_input_mode;
use crate::core::types::TaskSpec;
use crate::error::WrapperError;

/// The wrapper's own standard input.
pub trait StdinSource {
    fn is_terminal(&self) -> bool;
    fn read_all(&mut self) -> io::Result<String>;
}

/// Process stdin.
#[derive(Debug, Default)]
pub struct ProcessStdin;

impl StdinSource for ProcessStdin {
    fn is_terminal(&self) -> bool {
        io::stdin().is_terminal()
    }

    fn read_all(&mut self) -> io::Result<String> {
        let mut text = String::new();
        io::stdin().lock().read_to_string(&mut text)?;
        Ok(text)
    }
}

/// Resolve the task text and delivery mode for `config`.
///
/// With the explicit marker, stdin is read to completion and must be
/// non-empty. Otherwise a non-terminal stdin is drained and, when it holds
/// data, replaces the task argument.
#[instrument(skip_all, fields(explicit_stdin = config.explicit_stdin))]
pub fn resolve_task_spec<S: StdinSource + ?Sized>(
    config: &Config,
    stdin: &mut S,
) -> Result<TaskSpec, WrapperError> {
    let (task, piped) = if config.explicit_stdin {
        let text = stdin
            .read_all()
            .map_err(|err| WrapperError::config(format!("failed to read stdin: {err}")))?;
        if text.is_empty() {
            return Err(WrapperError::config(
                "explicit stdin mode requires task input from stdin",
            ));
        }
        (text, !stdin.is_terminal())
    } else {
        match read_piped(stdin)? {
            Some(text) => (text, true),
            None => (config.task.clone(), false),
        }
    };

    let decision = select_input_mode(&task, config.explicit_stdin, piped);
    if decision.use_stdin() {
        let reasons = decision
            .reasons
            .iter()
            .map(|reason| reason.label())
            .collect::<Vec<_>>()
            .join(", ");
        warn!(%reasons, "using stdin mode for task");
    }
    Ok(TaskSpec::new(task, config.workdir.clone(), decision))
}

fn read_piped<S: StdinSource + ?Sized>(stdin: &mut S) -> Result<Option<String>, WrapperError> {
    if stdin.is_terminal() {
        debug!("stdin is a terminal; skipping pipe read");
        return Ok(None);
    }
    let text = stdin
        .read_all()
        .map_err(|err| WrapperError::config(format!("failed to read piped stdin: {err}")))?;
    if text.is_empty() {
        debug!("stdin pipe was empty");
        return Ok(None);
    }
    debug!(bytes = text.len(), "read task from stdin pipe");
    Ok(Some(text))
}
