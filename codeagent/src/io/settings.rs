//! User settings stored in `~/.codeagent/config.toml`, plus environment overrides.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::io::backend::BACKEND_NAMES;

/// Timeout in seconds; values above 10000 are read as milliseconds.
pub const TIMEOUT_ENV: &str = "CODEAGENT_TIMEOUT";
/// Older name for [`TIMEOUT_ENV`], read only when the new one is unset.
pub const LEGACY_TIMEOUT_ENV: &str = "CODEX_TIMEOUT";
pub const SKIP_PERMISSIONS_ENV: &str = "CODEAGENT_SKIP_PERMISSIONS";
pub const CODEX_BYPASS_ENV: &str = "CODEX_BYPASS_SANDBOX";

const MILLIS_THRESHOLD: u64 = 10_000;

/// Settings file (TOML). Missing fields take their defaults.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Backend used when neither `--backend` nor an agent preset names one.
    pub default_backend: String,

    /// Agent process timeout in seconds.
    pub timeout_secs: u64,

    /// Bytes of agent stderr kept for error reports.
    pub output_limit_bytes: usize,

    /// Named presets selectable with `--agent`.
    pub agents: BTreeMap<String, AgentPreset>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentPreset {
    pub backend: Option<String>,
    pub model: Option<String>,
    pub reasoning_effort: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_backend: "codex".to_string(),
            timeout_secs: 2 * 60 * 60,
            output_limit_bytes: 100_000,
            agents: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        validate_backend_name("default_backend", &self.default_backend)?;
        for (name, preset) in &self.agents {
            validate_agent_name(name)?;
            if let Some(backend) = &preset.backend {
                validate_backend_name(&format!("agents.{name}.backend"), backend)?;
            }
        }
        Ok(())
    }
}

fn validate_backend_name(field: &str, name: &str) -> Result<()> {
    let key = name.trim().to_ascii_lowercase();
    if !BACKEND_NAMES.contains(&key.as_str()) {
        return Err(anyhow!(
            "{field} must be one of {}, got {name:?}",
            BACKEND_NAMES.join(", ")
        ));
    }
    Ok(())
}

/// Agent names are limited to ASCII letters, digits, `-` and `_`.
pub fn validate_agent_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(anyhow!("agent name is empty"));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(anyhow!("agent name {name:?} contains invalid character {bad:?}"));
    }
    Ok(())
}

/// `~/.codeagent/config.toml`, if the home directory is known.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".codeagent").join("config.toml"))
}

/// Load settings from a TOML file.
///
/// If the file is missing, returns `Settings::default()`.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        debug!(path = %path.display(), "settings file missing; using defaults");
        let settings = Settings::default();
        settings.validate()?;
        return Ok(settings);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: Settings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings
        .validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(settings)
}

/// Overrides read from the environment. `None` means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSettings {
    pub timeout_secs: Option<u64>,
    pub skip_permissions: Option<bool>,
    pub codex_bypass_sandbox: bool,
}

impl EnvSettings {
    pub fn from_process() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout_secs = [TIMEOUT_ENV, LEGACY_TIMEOUT_ENV]
            .into_iter()
            .find_map(|var| lookup(var).map(|raw| (var, raw)))
            .and_then(|(var, raw)| {
                let parsed = parse_timeout(&raw);
                if parsed.is_none() {
                    warn!(var, value = %raw, "ignoring invalid timeout");
                }
                parsed
            });
        Self {
            timeout_secs,
            skip_permissions: lookup(SKIP_PERMISSIONS_ENV).map(|raw| flag_enabled(&raw)),
            codex_bypass_sandbox: lookup(CODEX_BYPASS_ENV).is_some_and(|raw| flag_enabled(&raw)),
        }
    }
}

/// Parse a positive timeout. Values above 10000 are milliseconds.
pub fn parse_timeout(raw: &str) -> Option<u64> {
    let parsed: u64 = raw.trim().parse().ok()?;
    if parsed == 0 {
        return None;
    }
    if parsed > MILLIS_THRESHOLD {
        return Some(parsed / 1000);
    }
    Some(parsed)
}

/// Anything except empty, `0`, `false`, `no` and `off` is enabled.
pub fn flag_enabled(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let settings = load_settings(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.timeout_secs, 7200);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "default_backend = \"gemini\"\n\n[agents.develop]\nbackend = \"codex\"\n",
        )
        .expect("write");

        let settings = load_settings(&path).expect("load");

        assert_eq!(settings.default_backend, "gemini");
        assert_eq!(settings.timeout_secs, 7200);
        assert_eq!(
            settings.agents["develop"].backend.as_deref(),
            Some("codex")
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");

        fs::write(&path, "timeout_secs = 0\n").expect("write");
        let err = load_settings(&path).unwrap_err();
        assert!(format!("{err:#}").contains("timeout_secs must be > 0"));

        fs::write(&path, "default_backend = \"copilot\"\n").expect("write");
        let err = load_settings(&path).unwrap_err();
        assert!(format!("{err:#}").contains("default_backend"));

        fs::write(&path, "[agents.\"bad name\"]\n").expect("write");
        let err = load_settings(&path).unwrap_err();
        assert!(format!("{err:#}").contains("invalid character"));
    }

    #[test]
    fn malformed_toml_names_the_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "timeout_secs = \"soon\"\n").expect("write");
        let err = load_settings(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parse"));
    }

    #[test]
    fn timeout_heuristic() {
        assert_eq!(parse_timeout("300"), Some(300));
        assert_eq!(parse_timeout("10000"), Some(10_000));
        assert_eq!(parse_timeout("7200000"), Some(7200));
        assert_eq!(parse_timeout(" 60 "), Some(60));
        assert_eq!(parse_timeout("0"), None);
        assert_eq!(parse_timeout("-5"), None);
        assert_eq!(parse_timeout("abc"), None);
    }

    #[test]
    fn flags() {
        for raw in ["1", "true", "YES", "on", "anything"] {
            assert!(flag_enabled(raw), "{raw}");
        }
        for raw in ["", "0", "false", "No", " off "] {
            assert!(!flag_enabled(raw), "{raw}");
        }
    }

    #[test]
    fn env_settings_from_lookup() {
        let env = EnvSettings::from_lookup(|key| match key {
            TIMEOUT_ENV => Some("900000".to_string()),
            SKIP_PERMISSIONS_ENV => Some("false".to_string()),
            CODEX_BYPASS_ENV => Some("true".to_string()),
            _ => None,
        });
        assert_eq!(
            env,
            EnvSettings {
                timeout_secs: Some(900),
                skip_permissions: Some(false),
                codex_bypass_sandbox: true,
            }
        );

        let empty = EnvSettings::from_lookup(|_| None);
        assert_eq!(empty, EnvSettings::default());

        let invalid = EnvSettings::from_lookup(|key| (key == TIMEOUT_ENV).then(|| "x".to_string()));
        assert_eq!(invalid.timeout_secs, None);
    }

    #[test]
    fn legacy_timeout_var_is_a_fallback() {
        let legacy = EnvSettings::from_lookup(|key| {
            (key == LEGACY_TIMEOUT_ENV).then(|| "1800".to_string())
        });
        assert_eq!(legacy.timeout_secs, Some(1800));

        let both = EnvSettings::from_lookup(|key| match key {
            TIMEOUT_ENV => Some("60".to_string()),
            LEGACY_TIMEOUT_ENV => Some("1800".to_string()),
            _ => None,
        });
        assert_eq!(both.timeout_secs, Some(60));
    }
}
