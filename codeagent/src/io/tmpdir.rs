//! Make sure the temp directory handed to child processes can execute files.
//!
//! Some hosts mount the temp directory `noexec`, which breaks agent CLIs that
//! drop helper scripts there. Resolution never fails: every problem degrades
//! to leaving the environment alone. The result is a value whose
//! [`TempDirResolution::env_overrides`] are applied to each spawned child;
//! the wrapper's own environment is never mutated.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::{debug, info, instrument};

/// Explicit temp directory override.
pub const OVERRIDE_ENV: &str = "CODEAGENT_TMPDIR";

/// Temp directory variables, in lookup priority order. All are set on commit.
pub const TEMP_ENV_VARS: [&str; 3] = ["TMPDIR", "TMP", "TEMP"];

const DEFAULT_TEMP_DIR: &str = "/tmp";
const PROBE_PREFIX: &str = "codeagent-tmp-exec-";
const PROBE_SCRIPT: &str = "#!/bin/sh\nexit 0\n";

/// Snapshot of the environment inputs the resolver reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TempEnv {
    /// Value of [`OVERRIDE_ENV`].
    pub override_dir: Option<String>,
    /// Values of [`TEMP_ENV_VARS`], same order.
    pub temp_vars: [Option<String>; 3],
    pub home: Option<PathBuf>,
}

impl TempEnv {
    pub fn from_process() -> Self {
        Self {
            override_dir: std::env::var(OVERRIDE_ENV).ok(),
            temp_vars: TEMP_ENV_VARS.map(|key| std::env::var(key).ok()),
            home: dirs::home_dir(),
        }
    }

    /// First non-blank temp variable, if any.
    pub fn current_temp_dir(&self) -> Option<PathBuf> {
        self.temp_vars
            .iter()
            .flatten()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .map(PathBuf::from)
    }

    /// `<home>/.codeagent/tmp`, if the home directory is known.
    pub fn fallback_dir(&self) -> Option<PathBuf> {
        let home = self.home.as_ref()?;
        if home.as_os_str().is_empty() {
            return None;
        }
        Some(home.join(".codeagent").join("tmp"))
    }
}

/// How the temp directory was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TempDirResolution {
    /// Platform without POSIX permission bits; nothing was checked.
    Unsupported,
    /// The override directory passed the probe.
    Override(PathBuf),
    /// The current temp directory passed the probe; nothing changes.
    Current(PathBuf),
    /// The current directory failed and the home fallback passed.
    Fallback(PathBuf),
    /// The current directory failed and no usable fallback exists.
    Degraded(PathBuf),
}

impl TempDirResolution {
    /// Environment to set on child processes, empty unless a directory was committed.
    pub fn env_overrides(&self) -> Vec<(&'static str, PathBuf)> {
        match self {
            TempDirResolution::Override(dir) | TempDirResolution::Fallback(dir) => TEMP_ENV_VARS
                .iter()
                .map(|key| (*key, dir.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// One-line notice for stderr, only when the fallback was activated.
    pub fn notice(&self) -> Option<String> {
        match self {
            TempDirResolution::Fallback(dir) => Some(format!(
                "INFO: temp dir is not executable; set TMPDIR={}",
                dir.display()
            )),
            _ => None,
        }
    }
}

/// Why a directory failed the executability probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe {stage} in {}: {source}", .dir.display())]
    Io {
        stage: &'static str,
        dir: PathBuf,
        source: io::Error,
    },
    #[error("probe script in {} exited with {status}", .dir.display())]
    NotExecutable { dir: PathBuf, status: ExitStatus },
}

/// Checks whether files created in a directory can be executed.
pub trait ExecProbe {
    fn probe(&self, dir: &Path) -> Result<(), ProbeError>;
}

/// Writes a `/bin/sh` script into the directory and runs it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptProbe;

impl ExecProbe for ScriptProbe {
    fn probe(&self, dir: &Path) -> Result<(), ProbeError> {
        let io_err = |stage: &'static str| {
            let dir = dir.to_path_buf();
            move |source| ProbeError::Io { stage, dir, source }
        };

        let mut file = tempfile::Builder::new()
            .prefix(PROBE_PREFIX)
            .tempfile_in(dir)
            .map_err(io_err("create"))?;
        file.write_all(PROBE_SCRIPT.as_bytes())
            .map_err(io_err("write"))?;
        // Close the write handle before exec; the path is removed on drop.
        let path = file.into_temp_path();
        set_owner_executable(&path).map_err(io_err("chmod"))?;

        let status = Command::new(path.as_os_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(io_err("execute"))?;
        if !status.success() {
            return Err(ProbeError::NotExecutable {
                dir: dir.to_path_buf(),
                status,
            });
        }
        Ok(())
    }
}

/// Settle the temp directory for child processes.
///
/// Order: override (if set and usable), current temp dir, home fallback.
#[instrument(skip_all)]
pub fn resolve_temp_dir<P: ExecProbe + ?Sized>(env: &TempEnv, probe: &P) -> TempDirResolution {
    if !cfg!(unix) {
        return TempDirResolution::Unsupported;
    }

    if let Some(raw) = env.override_dir.as_deref().filter(|raw| !raw.trim().is_empty()) {
        match try_directory(raw, env.home.as_deref(), probe) {
            Ok(dir) => {
                debug!(dir = %dir.display(), "using temp dir override");
                return TempDirResolution::Override(dir);
            }
            Err(reason) => debug!(override_dir = raw, %reason, "ignoring temp dir override"),
        }
    }

    let current = env
        .current_temp_dir()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMP_DIR));
    match probe.probe(&current) {
        Ok(()) => {
            debug!(dir = %current.display(), "temp dir is executable");
            return TempDirResolution::Current(current);
        }
        Err(err) => debug!(dir = %current.display(), err = %err, "temp dir failed probe"),
    }

    let Some(fallback) = env.fallback_dir() else {
        debug!("no home directory; keeping temp dir");
        return TempDirResolution::Degraded(current);
    };
    if let Err(err) = create_private_dir(&fallback) {
        debug!(dir = %fallback.display(), err = %err, "cannot create fallback temp dir");
        return TempDirResolution::Degraded(current);
    }
    if let Err(err) = probe.probe(&fallback) {
        debug!(dir = %fallback.display(), err = %err, "fallback temp dir failed probe");
        return TempDirResolution::Degraded(current);
    }

    info!(dir = %fallback.display(), "using fallback temp dir");
    TempDirResolution::Fallback(fallback)
}

fn try_directory<P: ExecProbe + ?Sized>(
    raw: &str,
    home: Option<&Path>,
    probe: &P,
) -> Result<PathBuf, String> {
    let dir = expand_tilde(raw, home).ok_or_else(|| "cannot resolve ~".to_string())?;
    create_private_dir(&dir).map_err(|err| format!("create {}: {err}", dir.display()))?;
    probe.probe(&dir).map_err(|err| err.to_string())?;
    Ok(dir)
}

/// Expand a leading `~` to `home`. Returns `None` for blank input or an unknown home.
pub fn expand_tilde(raw: &str, home: Option<&Path>) -> Option<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw == "~" {
        return home.map(Path::to_path_buf);
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        return home.map(|home| home.join(rest));
    }
    Some(PathBuf::from(raw))
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn set_owner_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn set_owner_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
