//! Agent CLI backends: executable name and argument construction.

use crate::cli::Config;
use crate::core::types::Mode;
use crate::error::WrapperError;

/// Backend used when none is configured.
pub const DEFAULT_BACKEND: &str = "codex";

/// Names accepted by [`select_backend`].
pub const BACKEND_NAMES: [&str; 3] = ["codex", "claude", "gemini"];

/// An external agent CLI.
pub trait Backend: std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Executable looked up on `PATH`.
    fn command(&self) -> &'static str;

    /// Arguments for `config`; `target` is the task text or `-` for stdin.
    fn build_args(&self, config: &Config, target: &str) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CodexBackend {
    /// Pass `--dangerously-bypass-approvals-and-sandbox`.
    pub bypass_sandbox: bool,
}

impl Backend for CodexBackend {
    fn name(&self) -> &'static str {
        "codex"
    }

    fn command(&self) -> &'static str {
        "codex"
    }

    fn build_args(&self, config: &Config, target: &str) -> Vec<String> {
        let mut args = vec!["e".to_string()];
        if self.bypass_sandbox {
            args.push("--dangerously-bypass-approvals-and-sandbox".to_string());
        }
        args.push("--skip-git-repo-check".to_string());
        if config.mode == Mode::New {
            args.push("-C".to_string());
            args.push(config.workdir.display().to_string());
        }
        args.push("--json".to_string());
        if let Some(model) = non_blank(config.model.as_deref()) {
            args.push("-m".to_string());
            args.push(model.to_string());
        }
        if let Some(effort) = non_blank(config.reasoning_effort.as_deref()) {
            args.push("-c".to_string());
            args.push(format!("model_reasoning_effort={effort}"));
        }
        if config.mode == Mode::Resume {
            args.push("resume".to_string());
            args.push(config.session_id.clone());
        }
        args.push(target.to_string());
        args
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeBackend;

impl Backend for ClaudeBackend {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn command(&self) -> &'static str {
        "claude"
    }

    fn build_args(&self, config: &Config, target: &str) -> Vec<String> {
        let mut args = vec!["-p".to_string()];
        if config.skip_permissions {
            args.push("--dangerously-skip-permissions".to_string());
        }
        // Empty list: ignore user/project settings files.
        args.push("--setting-sources".to_string());
        args.push(String::new());
        if let Some(model) = non_blank(config.model.as_deref()) {
            args.push("--model".to_string());
            args.push(model.to_string());
        }
        push_resume_flag(&mut args, config);
        args.extend(
            ["--output-format", "stream-json", "--verbose", target].map(str::to_string),
        );
        args
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiBackend;

impl Backend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn command(&self) -> &'static str {
        "gemini"
    }

    fn build_args(&self, config: &Config, target: &str) -> Vec<String> {
        let mut args = ["-o", "stream-json", "-y"].map(str::to_string).to_vec();
        if let Some(model) = non_blank(config.model.as_deref()) {
            args.push("-m".to_string());
            args.push(model.to_string());
        }
        push_resume_flag(&mut args, config);
        args.push("-p".to_string());
        args.push(target.to_string());
        args
    }
}

/// Look up a backend by name (case-insensitive, blank means [`DEFAULT_BACKEND`]).
pub fn select_backend(name: &str, codex_bypass: bool) -> Result<Box<dyn Backend>, WrapperError> {
    let key = name.trim().to_ascii_lowercase();
    let key = if key.is_empty() {
        DEFAULT_BACKEND
    } else {
        key.as_str()
    };
    match key {
        "codex" => Ok(Box::new(CodexBackend {
            bypass_sandbox: codex_bypass,
        })),
        "claude" => Ok(Box::new(ClaudeBackend)),
        "gemini" => Ok(Box::new(GeminiBackend)),
        _ => Err(WrapperError::config(format!(
            "unsupported backend {name:?} (expected one of: {})",
            BACKEND_NAMES.join(", ")
        ))),
    }
}

fn push_resume_flag(args: &mut Vec<String>, config: &Config) {
    if config.mode == Mode::Resume && !config.session_id.is_empty() {
        args.push("-r".to_string());
        args.push(config.session_id.clone());
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::test_support::config_for;

    fn new_config(workdir: &str) -> Config {
        let mut config = config_for("task");
        config.workdir = PathBuf::from(workdir);
        config
    }

    fn resume_config(session_id: &str) -> Config {
        let mut config = config_for("task");
        config.mode = Mode::Resume;
        config.session_id = session_id.to_string();
        config
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn codex_new_mode() {
        let got = CodexBackend::default().build_args(&new_config("/tmp"), "task");
        assert_eq!(
            got,
            args(&["e", "--skip-git-repo-check", "-C", "/tmp", "--json", "task"])
        );
    }

    #[test]
    fn codex_bypass_flag() {
        let backend = CodexBackend {
            bypass_sandbox: true,
        };
        let got = backend.build_args(&new_config("/tmp"), "task");
        assert_eq!(
            got,
            args(&[
                "e",
                "--dangerously-bypass-approvals-and-sandbox",
                "--skip-git-repo-check",
                "-C",
                "/tmp",
                "--json",
                "task",
            ])
        );
    }

    #[test]
    fn codex_resume_mode() {
        let got = CodexBackend::default().build_args(&resume_config("thread-1"), "-");
        assert_eq!(
            got,
            args(&["e", "--skip-git-repo-check", "--json", "resume", "thread-1", "-"])
        );
    }

    #[test]
    fn codex_model_and_reasoning_precede_target() {
        let mut config = new_config("/repo");
        config.model = Some("gpt-5".to_string());
        config.reasoning_effort = Some("high".to_string());
        let got = CodexBackend::default().build_args(&config, "task");
        assert_eq!(
            got,
            args(&[
                "e",
                "--skip-git-repo-check",
                "-C",
                "/repo",
                "--json",
                "-m",
                "gpt-5",
                "-c",
                "model_reasoning_effort=high",
                "task",
            ])
        );
    }

    #[test]
    fn claude_new_mode_omits_skip_permissions_by_default() {
        let got = ClaudeBackend.build_args(&new_config("/repo"), "todo");
        assert_eq!(
            got,
            args(&[
                "-p",
                "--setting-sources",
                "",
                "--output-format",
                "stream-json",
                "--verbose",
                "todo",
            ])
        );
    }

    #[test]
    fn claude_resume_with_skip_permissions_and_model() {
        let mut config = resume_config("sid-123");
        config.skip_permissions = true;
        config.model = Some("opus".to_string());
        let got = ClaudeBackend.build_args(&config, "resume-task");
        assert_eq!(
            got,
            args(&[
                "-p",
                "--dangerously-skip-permissions",
                "--setting-sources",
                "",
                "--model",
                "opus",
                "-r",
                "sid-123",
                "--output-format",
                "stream-json",
                "--verbose",
                "resume-task",
            ])
        );
    }

    #[test]
    fn gemini_modes() {
        assert_eq!(
            GeminiBackend.build_args(&new_config("/workspace"), "task"),
            args(&["-o", "stream-json", "-y", "-p", "task"])
        );
        assert_eq!(
            GeminiBackend.build_args(&resume_config("sid-999"), "resume"),
            args(&["-o", "stream-json", "-y", "-r", "sid-999", "-p", "resume"])
        );

        let mut config = new_config("/workspace");
        config.model = Some("gemini-2.5-pro".to_string());
        assert_eq!(
            GeminiBackend.build_args(&config, "task"),
            args(&["-o", "stream-json", "-y", "-m", "gemini-2.5-pro", "-p", "task"])
        );
    }

    #[test]
    fn blank_model_is_ignored() {
        let mut config = new_config("/workspace");
        config.model = Some("  ".to_string());
        assert_eq!(
            GeminiBackend.build_args(&config, "task"),
            args(&["-o", "stream-json", "-y", "-p", "task"])
        );
    }

    #[test]
    fn select_backend_by_name() {
        for name in BACKEND_NAMES {
            let backend = select_backend(name, false).expect("backend");
            assert_eq!(backend.name(), name);
            assert_eq!(backend.command(), name);
        }
        assert_eq!(select_backend("", false).expect("default").name(), "codex");
        assert_eq!(select_backend(" Claude ", false).expect("claude").name(), "claude");
    }

    #[test]
    fn select_backend_rejects_unknown() {
        let err = select_backend("copilot", false).unwrap_err();
        assert!(matches!(err, WrapperError::Config(_)));
        assert!(err.to_string().contains("unsupported backend"));
    }

    #[test]
    fn codex_selection_carries_bypass() {
        let backend = select_backend("codex", true).expect("codex");
        let got = backend.build_args(&new_config("/tmp"), "task");
        assert_eq!(got[1], "--dangerously-bypass-approvals-and-sandbox");
    }
}
