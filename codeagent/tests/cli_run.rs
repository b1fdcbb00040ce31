//! End-to-end tests for the `codeagent` binary.
//!
//! Each test runs the binary with a scrubbed environment: `HOME` and `TMPDIR`
//! point into a scratch directory and `PATH` starts with a directory holding
//! fake backend scripts that emit canned JSON events.

#![cfg(unix)]

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use codeagent::exit_codes;
use codeagent::test_support::TestRepo;
use tempfile::TempDir;

struct Sandbox {
    root: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        for dir in ["home", "bin", "tmp", "work", "capture"] {
            fs::create_dir_all(root.path().join(dir)).expect("mkdir");
        }
        Self { root }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    fn capture(&self, name: &str) -> String {
        fs::read_to_string(self.path("capture").join(name)).expect("read capture")
    }

    /// Install a fake backend that records argv, stdin and `TMPDIR`, then
    /// prints a codex-style event stream.
    fn install_codex(&self, message: &str) {
        let capture = self.path("capture");
        let capture = capture.display();
        let mut script = String::from("#!/bin/sh\n");
        script.push_str(&format!("printf '%s\\n' \"$@\" > '{capture}/args'\n"));
        script.push_str(&format!("cat > '{capture}/stdin'\n"));
        script.push_str(&format!("printf '%s' \"$TMPDIR\" > '{capture}/tmpdir'\n"));
        script.push_str(
            "printf '%s\\n' '{\"type\":\"thread.started\",\"thread_id\":\"thread-42\"}'\n",
        );
        script.push_str(&format!(
            "printf '%s\\n' '{{\"type\":\"item.completed\",\"item\":{{\"type\":\"agent_message\",\"text\":\"{message}\"}}}}'\n"
        ));
        self.install("codex", &script);
    }

    fn install(&self, name: &str, script: &str) {
        let path = self.path("bin").join(name);
        fs::write(&path, script).expect("write script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_codeagent"));
        cmd.env_clear()
            .env("HOME", self.path("home"))
            .env("TMPDIR", self.path("tmp"))
            .env("PATH", format!("{}:/usr/bin:/bin", self.path("bin").display()))
            .current_dir(self.path("work"))
            .stdin(Stdio::null());
        cmd
    }
}

fn run(mut cmd: Command) -> Output {
    cmd.output().expect("spawn codeagent")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn args_of(sandbox: &Sandbox) -> Vec<String> {
    sandbox.capture("args").lines().map(str::to_string).collect()
}

#[test]
fn help_exits_zero() {
    let sandbox = Sandbox::new();
    let mut cmd = sandbox.command();
    cmd.arg("--help");
    let output = run(cmd);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(stdout(&output).contains("resume"));
}

#[test]
fn resume_without_task_is_invalid() {
    let sandbox = Sandbox::new();
    let mut cmd = sandbox.command();
    cmd.args(["resume", "sess-1"]);
    let output = run(cmd);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn dash_workdir_is_invalid() {
    let sandbox = Sandbox::new();
    let mut cmd = sandbox.command();
    cmd.args(["new", "task", "-"]);
    let output = run(cmd);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(stderr(&output).contains("invalid workdir"));
}

#[test]
fn worktree_in_plain_directory_fails() {
    let sandbox = Sandbox::new();
    sandbox.install_codex("unused");
    let mut cmd = sandbox.command();
    cmd.args(["--worktree", "new", "task"])
        .arg(sandbox.path("work"));
    let output = run(cmd);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(stderr(&output).contains("not a git repository"));
    assert!(!sandbox.path("capture").join("args").exists());
}

#[test]
fn missing_backend_exits_127() {
    let sandbox = Sandbox::new();
    let mut cmd = sandbox.command();
    cmd.args(["--backend", "gemini", "new", "task"]);
    let output = run(cmd);
    assert_eq!(output.status.code(), Some(exit_codes::NOT_FOUND));
    assert!(stderr(&output).contains("ERROR:"));
}

#[test]
fn missing_workdir_is_reported_as_such() {
    let sandbox = Sandbox::new();
    sandbox.install_codex("unused");
    let missing = sandbox.path("no-such-dir");
    let mut cmd = sandbox.command();
    cmd.args(["new", "task"]).arg(&missing);

    let output = run(cmd);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let err = stderr(&output);
    assert!(err.contains("invalid workdir"), "{err}");
    assert!(err.contains(&missing.display().to_string()), "{err}");
    assert!(!sandbox.path("capture").join("args").exists());
}

#[test]
fn prints_message_and_session_trailer() {
    let sandbox = Sandbox::new();
    sandbox.install_codex("all done");
    let mut cmd = sandbox.command();
    cmd.args(["new", "analyze code"]);

    let output = run(cmd);

    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    assert_eq!(stdout(&output), "all done\n\n---\nSESSION_ID: thread-42\n");
    let args = args_of(&sandbox);
    assert_eq!(args.first().map(String::as_str), Some("e"));
    assert_eq!(args.last().map(String::as_str), Some("analyze code"));
    assert_eq!(sandbox.capture("stdin"), "");
}

#[test]
fn unsafe_task_goes_through_stdin() {
    let sandbox = Sandbox::new();
    sandbox.install_codex("ok");
    let mut cmd = sandbox.command();
    cmd.args(["new", "print $HOME"]);

    let output = run(cmd);

    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    assert_eq!(args_of(&sandbox).last().map(String::as_str), Some("-"));
    assert_eq!(sandbox.capture("stdin"), "print $HOME");
}

#[test]
fn piped_task_replaces_argument() {
    let sandbox = Sandbox::new();
    sandbox.install_codex("ok");
    let mut cmd = sandbox.command();
    cmd.args(["new", "ignored"]).stdin(Stdio::piped()).stdout(Stdio::piped());

    let mut child = cmd.spawn().expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"piped task text")
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(args_of(&sandbox).last().map(String::as_str), Some("-"));
    assert_eq!(sandbox.capture("stdin"), "piped task text");
}

#[test]
fn output_file_holds_results_and_summary() {
    let sandbox = Sandbox::new();
    sandbox.install_codex("reported");
    let out = sandbox.path("reports/run.json");
    let mut cmd = sandbox.command();
    cmd.arg("--output").arg(&out).args(["new", "task"]);

    let output = run(cmd);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).expect("read output")).expect("json");
    assert_eq!(value["results"][0]["message"], "reported");
    assert_eq!(value["results"][0]["session_id"], "thread-42");
    assert_eq!(value["summary"]["total"], 1);
    assert_eq!(value["summary"]["success"], 1);
}

#[test]
fn worktree_run_uses_fresh_branch_directory() {
    let sandbox = Sandbox::new();
    sandbox.install_codex("ok");
    let repo = TestRepo::new().expect("repo");
    let out = sandbox.path("run.json");
    let mut cmd = sandbox.command();
    cmd.arg("--worktree")
        .arg("--output")
        .arg(&out)
        .args(["new", "task"])
        .arg(repo.path());

    let output = run(cmd);

    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).expect("read output")).expect("json");
    let task_id = value["results"][0]["task_id"].as_str().expect("task_id");

    let args = args_of(&sandbox);
    let dash_c = args.iter().position(|a| a == "-C").expect("-C");
    let workdir = Path::new(&args[dash_c + 1]);
    assert!(workdir.ends_with(format!(".worktrees/do-{task_id}")));
    assert!(workdir.is_dir());
}

#[test]
fn non_executable_temp_dir_falls_back_under_home() {
    let sandbox = Sandbox::new();
    sandbox.install_codex("ok");
    let mut cmd = sandbox.command();
    cmd.env("TMPDIR", sandbox.path("does-not-exist"))
        .args(["new", "task"]);

    let output = run(cmd);

    let fallback = sandbox.path("home").join(".codeagent/tmp");
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    assert!(stderr(&output).contains(&format!(
        "INFO: temp dir is not executable; set TMPDIR={}",
        fallback.display()
    )));
    assert_eq!(sandbox.capture("tmpdir"), fallback.display().to_string());
}

#[test]
fn temp_dir_override_is_passed_to_backend() {
    let sandbox = Sandbox::new();
    sandbox.install_codex("ok");
    let custom = sandbox.path("custom-tmp");
    let mut cmd = sandbox.command();
    cmd.env("CODEAGENT_TMPDIR", &custom).args(["new", "task"]);

    let output = run(cmd);

    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    assert!(custom.is_dir());
    assert_eq!(sandbox.capture("tmpdir"), custom.display().to_string());
    assert!(!stderr(&output).contains("INFO:"));
}
