//! Built-in Commands
//!
//! In-process implementations of `cd`, `echo`, `mkdir`, `rm` and `diff`.
//! Built-ins honor their redirects through the planner: captured streams
//! stay on the returned result, file-planned streams are written out.
//! Operational failures set a nonzero exit code on the result instead of
//! aborting the enclosing sequence.

pub mod cd;
pub mod diff;
pub mod echo;
pub mod mkdir;
pub mod rm;

use std::io::Write;

use crate::ast::types::Command;
use crate::shell::environment::ShellEnvironment;

use super::errors::ShellError;
use super::redirects::{OpenMode, OpenedFile, PlannedFd, PlannedFds};
use super::types::ShellCommandResult;

/// Names dispatched in-process when they lead a length-one pipeline.
pub fn is_builtin(name: &str) -> bool {
    matches!(name, "echo" | "mkdir" | "rm" | "diff")
}

pub fn execute_builtin(
    name: &str,
    command: &Command,
    shenv: &ShellEnvironment,
) -> Result<ShellCommandResult, ShellError> {
    match name {
        "echo" => echo::execute_builtin_echo(command, shenv),
        "mkdir" => mkdir::execute_builtin_mkdir(command, shenv),
        "rm" => rm::execute_builtin_rm(command, shenv),
        "diff" => diff::execute_builtin_diff(command, shenv),
        _ => Err(ShellError::Value(format!("unknown builtin: {}", name))),
    }
}

/// Route a built-in's output through its planned descriptors and assemble
/// the per-command result. The ledger is consumed here: dropping it closes
/// every descriptor opened for the command.
pub(crate) fn finish_builtin(
    command: &Command,
    fds: PlannedFds,
    ledger: Vec<OpenedFile>,
    stdout: String,
    stderr: String,
    exit_code: i32,
) -> Result<ShellCommandResult, ShellError> {
    let mut result = ShellCommandResult::new(command.to_string());
    result.exit_code = exit_code;
    result.output_files = ledger
        .iter()
        .filter(|entry| entry.mode != OpenMode::Read)
        .map(|entry| entry.resolved.clone())
        .collect();

    let write = |file: &mut std::fs::File, data: &str| -> Result<(), ShellError> {
        file.write_all(data.as_bytes())
            .map_err(|e| ShellError::internal(command, format!("write error: {}", e)))
    };

    match (fds.stdout, fds.stderr) {
        (PlannedFd::File(mut out), PlannedFd::ToStdout) => {
            write(&mut out, &stdout)?;
            write(&mut out, &stderr)?;
        }
        (PlannedFd::File(mut out), PlannedFd::File(mut err)) => {
            write(&mut out, &stdout)?;
            write(&mut err, &stderr)?;
        }
        (PlannedFd::File(mut out), PlannedFd::Default) => {
            write(&mut out, &stdout)?;
            result.stderr = stderr;
        }
        (_, PlannedFd::ToStdout) => {
            result.stdout = stdout;
            result.stdout.push_str(&stderr);
        }
        (_, PlannedFd::File(mut err)) => {
            result.stdout = stdout;
            write(&mut err, &stderr)?;
        }
        (_, PlannedFd::Default) => {
            result.stdout = stdout;
            result.stderr = stderr;
        }
    }
    drop(ledger);
    Ok(result)
}
