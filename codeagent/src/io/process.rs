//! Run a child process with a timeout, streaming stdout line by line.

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Receives stdout lines as the child produces them.
pub trait LineSink: Send + 'static {
    /// One line, without its terminator.
    fn push_line(&mut self, line: &[u8]);

    /// A line longer than the line limit was skipped; `preview` is its start.
    fn overlong_line(&mut self, _preview: &[u8]) {}
}

/// Captured child process outcome. Stdout went to the [`LineSink`].
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout_bytes: usize,
    /// Last bytes written to stderr.
    pub stderr_tail: Vec<u8>,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stderr_truncated_notice(&self, label: &str) -> String {
        if self.stderr_truncated > 0 {
            format!(
                "[{label} stderr truncated {} bytes]\n",
                self.stderr_truncated
            )
        } else {
            String::new()
        }
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr_tail).trim().to_string()
    }
}

/// Limits applied while draining child output.
#[derive(Debug, Clone, Copy)]
pub struct StreamLimits {
    /// Stdout lines longer than this are skipped.
    pub max_line_bytes: usize,
    /// Only the last this-many stderr bytes are kept.
    pub stderr_tail_bytes: usize,
}

/// Run a command with a timeout and feed its stdout to `sink` line by line.
///
/// `stdin` is written from a separate thread so a child that never reads it
/// cannot block the wait. Stdout and stderr are drained concurrently while
/// the child runs. On unix the child leads its own process group, and on
/// timeout the whole group is killed so helpers it spawned cannot keep the
/// output pipes open.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), stdin = stdin.is_some()))]
pub fn run_command_streaming<S: LineSink>(
    mut cmd: Command,
    stdin: Option<Vec<u8>>,
    timeout: Duration,
    limits: StreamLimits,
    sink: S,
) -> Result<(CommandOutput, S)> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdin_handle = match stdin {
        Some(input) => {
            let mut child_stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("stdin was not piped"))?;
            Some(thread::spawn(move || -> io::Result<()> {
                match child_stdin.write_all(&input) {
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                }
            }))
        }
        None => None,
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || pump_lines(stdout, sink, limits.max_line_bytes));
    let stderr_handle = thread::spawn(move || read_tail(stderr, limits.stderr_tail_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            kill_process_tree(&mut child).context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    if let Some(handle) = stdin_handle {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(err = %e, "failed to write child stdin"),
            Err(_) => return Err(anyhow!("stdin writer thread panicked")),
        }
    }

    let (sink, stdout_bytes) = join_reader(stdout_handle).context("join stdout")?;
    let (stderr_tail, stderr_truncated) = join_reader(stderr_handle).context("join stderr")?;

    if stderr_truncated > 0 {
        debug!(stderr_truncated, "stderr truncated to tail");
    }

    debug!(exit_code = ?status.code(), timed_out, stdout_bytes, "command finished");
    Ok((
        CommandOutput {
            status,
            stdout_bytes,
            stderr_tail,
            stderr_truncated,
            timed_out,
        },
        sink,
    ))
}

/// True when `err` came from spawning a program that does not exist.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<io::Error>())
        .any(|io_err| io_err.kind() == io::ErrorKind::NotFound)
}

#[cfg(unix)]
fn kill_process_tree(child: &mut Child) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(child.id())
        .map_err(|_| io::Error::other(format!("pid {} out of range", child.id())))?;
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) -> io::Result<()> {
    child.kill()
}

fn join_reader<T>(handle: thread::JoinHandle<Result<T>>) -> Result<T> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn pump_lines<R: Read, S: LineSink>(
    reader: R,
    mut sink: S,
    max_line_bytes: usize,
) -> Result<(S, usize)> {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let mut total = 0usize;

    while let Some((read, overlong)) =
        read_line_bounded(&mut reader, &mut line, max_line_bytes).context("read stdout line")?
    {
        total += read;
        if overlong {
            sink.overlong_line(&line);
        } else {
            sink.push_line(&line);
        }
    }

    Ok((sink, total))
}

/// Read one `\n`-terminated line into `line`, keeping at most `max` bytes.
///
/// Returns `None` at end of stream, otherwise the bytes consumed and whether
/// the line exceeded `max` (in which case `line` holds only its start).
fn read_line_bounded<R: BufRead>(
    reader: &mut R,
    line: &mut Vec<u8>,
    max: usize,
) -> io::Result<Option<(usize, bool)>> {
    line.clear();
    let mut consumed_total = 0usize;
    let mut overlong = false;

    loop {
        let available = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            return Ok((consumed_total > 0).then_some((consumed_total, overlong)));
        }

        let (chunk_len, done) = match available.iter().position(|b| *b == b'\n') {
            Some(idx) => (idx, true),
            None => (available.len(), false),
        };
        if !overlong {
            let room = max.saturating_sub(line.len());
            if chunk_len > room {
                line.extend_from_slice(&available[..room]);
                overlong = true;
            } else {
                line.extend_from_slice(&available[..chunk_len]);
            }
        }

        let consumed = chunk_len + usize::from(done);
        reader.consume(consumed);
        consumed_total += consumed;
        if done {
            return Ok(Some((consumed_total, overlong)));
        }
    }
}

fn read_tail<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut tail = VecDeque::with_capacity(limit.min(64 * 1024));
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        tail.extend(&chunk[..n]);
        if tail.len() > limit {
            let excess = tail.len() - limit;
            tail.drain(..excess);
            dropped += excess;
        }
    }

    Ok((tail.into_iter().collect(), dropped))
}
