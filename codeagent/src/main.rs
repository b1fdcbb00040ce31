//! `codeagent` binary entry point.

use anyhow::Result;
use clap::Parser;

use codeagent::cli::{Cli, Config};
use codeagent::core::types::TaskResult;
use codeagent::exit_codes;
use codeagent::io::backend::select_backend;
use codeagent::io::executor::ProcessExecutor;
use codeagent::io::input::ProcessStdin;
use codeagent::io::settings::{EnvSettings, Settings, default_settings_path, load_settings};
use codeagent::io::tmpdir::{ScriptProbe, TempDirResolution, TempEnv, resolve_temp_dir};
use codeagent::logging;
use codeagent::run::run_task;

fn main() {
    logging::init();

    let temp = resolve_temp_dir(&TempEnv::from_process(), &ScriptProbe);
    if let Some(notice) = temp.notice() {
        eprintln!("{notice}");
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version go to stdout and are not failures.
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    match run(cli, &temp) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli, temp: &TempDirResolution) -> Result<i32> {
    let settings = match default_settings_path() {
        Some(path) => load_settings(&path)?,
        None => Settings::default(),
    };
    let env = EnvSettings::from_process();
    let config = Config::from_cli(cli, &settings, &env)?;
    let backend = select_backend(&config.backend, env.codex_bypass_sandbox)?;

    let result = run_task(
        &config,
        backend.as_ref(),
        &mut ProcessStdin,
        &ProcessExecutor,
        temp,
    )?;

    if result.is_success() {
        println!("{}", result.message);
        if !result.session_id.is_empty() {
            println!("\n---\nSESSION_ID: {}", result.session_id);
        }
    } else {
        eprintln!("ERROR: {}", result.error);
    }
    Ok(exit_code_for(&result))
}

/// A failed result never exits 0, even if the agent did.
fn exit_code_for(result: &TaskResult) -> i32 {
    match result.exit_code {
        exit_codes::OK if !result.is_success() => exit_codes::INVALID,
        code => code,
    }
}
