//! Sequence Evaluator and Pipeline Executor
//!
//! The evaluator is synchronous: one supervising thread walks the tree,
//! spawning OS processes for external commands. Every spawned PID is
//! registered with the timeout supervisor; once the supervisor fires,
//! every evaluator entry short-circuits to the timeout sentinel without
//! launching more processes.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, ChildStdout, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::ast::types::{Pipeline, SeqOp, ShCommand};
use crate::shell::environment::ShellEnvironment;
use crate::shell::glob_expander::expand_args;

use super::builtins;
use super::errors::ShellError;
use super::redirects::{process_redirects, OpenMode, OpenedFile, PlannedFd};
use super::timeout::TimeoutSupervisor;
use super::types::{ShellCommandResult, TIMEOUT_EXIT_CODE};

/// Evaluate one command tree under a timeout (milliseconds; zero disables).
///
/// Returns the final exit code and, when the timeout fired, its message.
/// Shell-internal errors surface as exit `-1` with a diagnostic result
/// appended to `results`.
pub fn execute_shcmd(
    cmd: &ShCommand,
    shenv: &mut ShellEnvironment,
    results: &mut Vec<ShellCommandResult>,
    timeout_ms: u64,
) -> (i32, String) {
    // The helper is used even without a timeout so the evaluator has a
    // single code path.
    let mut supervisor = TimeoutSupervisor::new(timeout_ms);
    supervisor.start_timer();
    let exit_code = match do_execute_shcmd(cmd, shenv, results, &supervisor) {
        Ok(code) => code,
        Err(err) => {
            results.push(ShellCommandResult::internal_error(
                cmd.to_string(),
                err.to_string(),
            ));
            -1
        }
    };
    supervisor.cancel();
    let timeout_info = if supervisor.timeout_reached() {
        format!("Reached timeout of {} seconds", timeout_ms / 1000)
    } else {
        String::new()
    };
    (exit_code, timeout_info)
}

fn do_execute_shcmd(
    cmd: &ShCommand,
    shenv: &mut ShellEnvironment,
    results: &mut Vec<ShellCommandResult>,
    supervisor: &TimeoutSupervisor,
) -> Result<i32, ShellError> {
    // No further recursion once the timeout has been hit; avoid launching
    // more processes.
    if supervisor.timeout_reached() {
        return Ok(TIMEOUT_EXIT_CODE);
    }
    match cmd {
        ShCommand::Seq { lhs, op, rhs } => match op {
            SeqOp::Amp => Err(ShellError::UnsupportedOperator {
                op: "&".to_string(),
            }),
            SeqOp::Semi => {
                do_execute_shcmd(lhs, shenv, results, supervisor)?;
                do_execute_shcmd(rhs, shenv, results, supervisor)
            }
            SeqOp::And => {
                let code = do_execute_shcmd(lhs, shenv, results, supervisor)?;
                if code == TIMEOUT_EXIT_CODE {
                    return Ok(code);
                }
                if code == 0 {
                    do_execute_shcmd(rhs, shenv, results, supervisor)
                } else {
                    Ok(code)
                }
            }
            SeqOp::Or => {
                let code = do_execute_shcmd(lhs, shenv, results, supervisor)?;
                if code == TIMEOUT_EXIT_CODE {
                    return Ok(code);
                }
                if code != 0 {
                    do_execute_shcmd(rhs, shenv, results, supervisor)
                } else {
                    Ok(code)
                }
            }
        },
        ShCommand::Pipeline(pipeline) => execute_pipeline(pipeline, shenv, results, supervisor),
    }
}

fn execute_pipeline(
    pipeline: &Pipeline,
    shenv: &mut ShellEnvironment,
    results: &mut Vec<ShellCommandResult>,
    supervisor: &TimeoutSupervisor,
) -> Result<i32, ShellError> {
    let first = pipeline
        .commands
        .first()
        .ok_or_else(|| ShellError::Value("empty pipeline".to_string()))?;

    // cd mutates the parent environment and is checked before the generic
    // builtin dispatch: in a longer pipeline it is an error, not a spawn.
    if first.literal_name() == Some("cd") {
        let code = builtins::cd::execute_builtin_cd(pipeline, shenv)?;
        return Ok(apply_negate(code, pipeline.negate));
    }

    // The POSIX null command. Debug markers are rewritten to `: '...'`, so
    // every composed command starts with one.
    if first.literal_name() == Some(":") && pipeline.commands.len() == 1 {
        return Ok(apply_negate(0, pipeline.negate));
    }

    if pipeline.commands.len() == 1 {
        if let Some(name) = first.literal_name() {
            if builtins::is_builtin(name) {
                let result = builtins::execute_builtin(name, first, shenv)?;
                let code = result.exit_code;
                results.push(result);
                return Ok(apply_negate(code, pipeline.negate));
            }
        }
    }

    execute_external_pipeline(pipeline, shenv, results, supervisor)
}

fn apply_negate(code: i32, negate: bool) -> i32 {
    if !negate || code == TIMEOUT_EXIT_CODE {
        return code;
    }
    if code == 0 {
        1
    } else {
        0
    }
}

struct StageHandle {
    command_text: String,
    child: Option<Child>,
    stdout_reader: Option<JoinHandle<Vec<u8>>>,
    stderr_reader: Option<JoinHandle<Vec<u8>>>,
    merge_err_into_out: bool,
    output_files: Vec<PathBuf>,
    spawn_error: Option<String>,
}

fn execute_external_pipeline(
    pipeline: &Pipeline,
    shenv: &mut ShellEnvironment,
    results: &mut Vec<ShellCommandResult>,
    supervisor: &TimeoutSupervisor,
) -> Result<i32, ShellError> {
    let ncommands = pipeline.commands.len();
    let mut stages: Vec<StageHandle> = Vec::with_capacity(ncommands);
    let mut ledgers: Vec<Vec<OpenedFile>> = Vec::with_capacity(ncommands);
    let mut prev_stdout: Option<ChildStdout> = None;
    let mut spawn_failed = false;

    for (index, command) in pipeline.commands.iter().enumerate() {
        let is_last = index + 1 == ncommands;
        let mut ledger = Vec::new();
        let fds = process_redirects(command, shenv, &mut ledger)?;
        let output_files: Vec<PathBuf> = ledger
            .iter()
            .filter(|entry| entry.mode != OpenMode::Read)
            .map(|entry| entry.resolved.clone())
            .collect();

        let argv = expand_args(&command.args, shenv.cwd());
        if argv.is_empty() || argv[0].is_empty() {
            return Err(ShellError::internal(command, "empty command"));
        }

        // Resolve the stderr plan before stdout is consumed: a shared file
        // needs a duplicated descriptor, a shared capture pipe is merged
        // after the fact.
        let stdout_plan = fds.stdout;
        let mut merge_err_into_out = false;
        let stderr_plan = match fds.stderr {
            PlannedFd::ToStdout => match &stdout_plan {
                PlannedFd::File(file) => {
                    let clone = file.try_clone().map_err(|e| {
                        ShellError::internal(
                            command,
                            format!("cannot duplicate descriptor: {}", e),
                        )
                    })?;
                    PlannedFd::File(clone)
                }
                _ => {
                    merge_err_into_out = true;
                    PlannedFd::Default
                }
            },
            other => other,
        };

        let mut os_cmd = std::process::Command::new(&argv[0]);
        os_cmd.args(&argv[1..]);
        os_cmd.current_dir(shenv.cwd());
        os_cmd.env_clear();
        os_cmd.envs(shenv.env().iter().map(|(k, v)| (k.as_str(), v.as_str())));
        #[cfg(unix)]
        {
            // Own process group, so the supervisor's negative-pid kill
            // reaches descendants too.
            use std::os::unix::process::CommandExt;
            os_cmd.process_group(0);
        }

        match fds.stdin {
            PlannedFd::File(file) => {
                os_cmd.stdin(Stdio::from(file));
                let _ = prev_stdout.take();
            }
            _ => match prev_stdout.take() {
                Some(pipe) => {
                    os_cmd.stdin(Stdio::from(pipe));
                }
                None => {
                    os_cmd.stdin(Stdio::null());
                }
            },
        }
        let capture_stdout = matches!(stdout_plan, PlannedFd::Default);
        match stdout_plan {
            PlannedFd::File(file) => {
                os_cmd.stdout(Stdio::from(file));
            }
            _ => {
                os_cmd.stdout(Stdio::piped());
            }
        }
        let capture_stderr = matches!(stderr_plan, PlannedFd::Default);
        match stderr_plan {
            PlannedFd::File(file) => {
                os_cmd.stderr(Stdio::from(file));
            }
            _ => {
                os_cmd.stderr(Stdio::piped());
            }
        }

        debug!(stage = index, command = %command, "spawning pipeline stage");
        let mut child = match os_cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                stages.push(StageHandle {
                    command_text: command.to_string(),
                    child: None,
                    stdout_reader: None,
                    stderr_reader: None,
                    merge_err_into_out,
                    output_files,
                    spawn_error: Some(format!("could not spawn '{}': {}", argv[0], e)),
                });
                ledgers.push(ledger);
                spawn_failed = true;
                break;
            }
        };
        supervisor.add_process(child.id());

        // Stage stdout feeds the next stage unless this is the last stage
        // (captured) or the stream was file-redirected.
        let mut stdout_reader = None;
        if capture_stdout {
            if is_last {
                stdout_reader = child.stdout.take().map(drain);
            } else {
                prev_stdout = child.stdout.take();
            }
        }
        let stderr_reader = if capture_stderr {
            child.stderr.take().map(drain)
        } else {
            None
        };

        stages.push(StageHandle {
            command_text: command.to_string(),
            child: Some(child),
            stdout_reader,
            stderr_reader,
            merge_err_into_out,
            output_files,
            spawn_error: None,
        });
        ledgers.push(ledger);
    }

    let mut pipeline_exit = 0;
    let mut pipefail_exit = 0;
    let mut any_timeout = false;
    for stage in stages.iter_mut() {
        let mut result = ShellCommandResult::new(stage.command_text.clone());
        result.output_files = std::mem::take(&mut stage.output_files);

        let exit_code = if let Some(message) = stage.spawn_error.take() {
            result.stderr = format!("{}\n", message);
            -1
        } else if let Some(child) = stage.child.as_mut() {
            match child.wait() {
                Ok(status) => {
                    if supervisor.timeout_reached() && status_killed(&status) {
                        result.timeout_reached = true;
                        TIMEOUT_EXIT_CODE
                    } else {
                        exit_status_code(&status)
                    }
                }
                Err(e) => {
                    result.stderr = format!("wait failed: {}\n", e);
                    -1
                }
            }
        } else {
            -1
        };

        let stdout_bytes = stage.stdout_reader.take().map(join_reader).unwrap_or_default();
        let stderr_bytes = stage.stderr_reader.take().map(join_reader).unwrap_or_default();
        result.stdout = String::from_utf8_lossy(&stdout_bytes).into_owned();
        let stderr_text = String::from_utf8_lossy(&stderr_bytes).into_owned();
        if stage.merge_err_into_out {
            result.stdout.push_str(&stderr_text);
        } else {
            result.stderr.push_str(&stderr_text);
        }
        result.exit_code = exit_code;

        if exit_code == TIMEOUT_EXIT_CODE {
            any_timeout = true;
        }
        if exit_code != 0 {
            pipefail_exit = exit_code;
        }
        pipeline_exit = exit_code;
        results.push(result);
    }
    // Release the opened-files ledger, closing every planned descriptor.
    drop(ledgers);

    let exit_code = if any_timeout {
        TIMEOUT_EXIT_CODE
    } else if spawn_failed {
        -1
    } else if pipeline.pipefail && pipefail_exit != 0 {
        pipefail_exit
    } else {
        pipeline_exit
    };
    Ok(apply_negate(exit_code, pipeline.negate))
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = pipe.read_to_end(&mut buffer);
        buffer
    })
}

fn join_reader(handle: JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

fn exit_status_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(unix)]
fn status_killed(status: &ExitStatus) -> bool {
    status.code().is_none()
}

#[cfg(not(unix))]
fn status_killed(_status: &ExitStatus) -> bool {
    true
}
