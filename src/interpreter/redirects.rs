//! Redirect Planner
//!
//! Translates a command's redirect list into the three standard descriptors
//! for a child process plus a ledger of files opened on the command's
//! behalf. Redirects fold left to right, later redirects override earlier
//! ones on the same slot. The ledger is owned by the pipeline executor and
//! released on pipeline completion.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::PathBuf;

use crate::ast::types::{Command, Redirect, RedirectKind, Token};
use crate::shell::environment::ShellEnvironment;
use crate::shell::glob_expander::expand_token;

use super::errors::ShellError;

/// Open mode recorded in the ledger; duplicate detection keys on
/// filename + mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

/// One descriptor opened on behalf of a command's redirects.
#[derive(Debug)]
pub struct OpenedFile {
    /// Filename as written in the script.
    pub name: String,
    pub mode: OpenMode,
    pub file: File,
    pub resolved: PathBuf,
}

/// Planned destination for one standard descriptor.
#[derive(Debug)]
pub enum PlannedFd {
    /// Keep what the pipeline gives this slot: the outer stdin or the pipe
    /// from the previous stage for slot 0, a capture pipe for slots 1 and 2.
    Default,
    /// stderr only: share whatever stream stdout ends up on.
    ToStdout,
    File(File),
}

pub struct PlannedFds {
    pub stdin: PlannedFd,
    pub stdout: PlannedFd,
    pub stderr: PlannedFd,
}

/// Working slot value while the redirect list is folded.
#[derive(Debug, Clone)]
enum Slot {
    /// Sentinel: the slot still points at standard descriptor N.
    Std(u32),
    File { target: Token, mode: OpenMode },
}

/// Apply a command's redirects, yielding the three planned descriptors and
/// appending any opened files to the ledger.
pub fn process_redirects(
    command: &Command,
    shenv: &ShellEnvironment,
    ledger: &mut Vec<OpenedFile>,
) -> Result<PlannedFds, ShellError> {
    let mut slots = [Slot::Std(0), Slot::Std(1), Slot::Std(2)];

    for redirect in &command.redirects {
        let target = redirect.target.clone();
        match redirect.kind {
            RedirectKind::Out { fd } => {
                let index = out_slot(fd, command, redirect)?;
                slots[index] = Slot::File {
                    target,
                    mode: OpenMode::Write,
                };
            }
            RedirectKind::Append { fd } => {
                let index = out_slot(fd, command, redirect)?;
                slots[index] = Slot::File {
                    target,
                    mode: OpenMode::Append,
                };
            }
            RedirectKind::In => {
                slots[0] = Slot::File {
                    target,
                    mode: OpenMode::Read,
                };
            }
            RedirectKind::Dup { fd: Some(n) } if n == 1 || n == 2 => {
                // Textual alias of the addressed slot's current value.
                let source = match target.text() {
                    "0" => 0usize,
                    "1" => 1usize,
                    "2" => 2usize,
                    _ => return Err(unsupported(command, redirect)),
                };
                slots[n as usize] = slots[source].clone();
            }
            RedirectKind::Dup { fd: None } | RedirectKind::MergeOutErr => {
                // Both output streams into one file, sharing a descriptor.
                slots[1] = Slot::File {
                    target: target.clone(),
                    mode: OpenMode::Write,
                };
                slots[2] = Slot::File {
                    target,
                    mode: OpenMode::Write,
                };
            }
            RedirectKind::Dup { fd: _ } => return Err(unsupported(command, redirect)),
        }
    }

    let mut planned = Vec::with_capacity(3);
    for (index, slot) in slots.iter().enumerate() {
        let fd = match slot {
            Slot::Std(0) => {
                if index == 0 {
                    PlannedFd::Default
                } else {
                    return Err(ShellError::internal(command, "Unsupported redirect for stdin"));
                }
            }
            Slot::Std(1) => match index {
                1 => PlannedFd::Default,
                2 => PlannedFd::ToStdout,
                _ => {
                    return Err(ShellError::internal(
                        command,
                        "Unsupported redirect for stdout",
                    ))
                }
            },
            Slot::Std(2) => {
                if index == 2 {
                    PlannedFd::Default
                } else {
                    return Err(ShellError::internal(
                        command,
                        "Unsupported redirect for stderr",
                    ));
                }
            }
            Slot::Std(_) => return Err(ShellError::internal(command, "Bad redirect")),
            Slot::File { target, mode } => materialize_file(command, shenv, ledger, target, *mode)?,
        };
        planned.push(fd);
    }

    let mut drain = planned.into_iter();
    Ok(PlannedFds {
        stdin: drain.next().unwrap_or(PlannedFd::Default),
        stdout: drain.next().unwrap_or(PlannedFd::Default),
        stderr: drain.next().unwrap_or(PlannedFd::Default),
    })
}

fn out_slot(fd: Option<u32>, command: &Command, redirect: &Redirect) -> Result<usize, ShellError> {
    match fd.unwrap_or(1) {
        1 => Ok(1),
        2 => Ok(2),
        _ => Err(unsupported(command, redirect)),
    }
}

fn unsupported(command: &Command, redirect: &Redirect) -> ShellError {
    ShellError::internal(command, format!("Unsupported redirect: {}", redirect))
}

fn materialize_file(
    command: &Command,
    shenv: &ShellEnvironment,
    ledger: &mut Vec<OpenedFile>,
    target: &Token,
    mode: OpenMode,
) -> Result<PlannedFd, ShellError> {
    // stdout and stderr pointed at one filename share a single descriptor;
    // two independent descriptors would interleave badly on some platforms.
    if let Some(entry) = ledger
        .iter()
        .find(|entry| entry.name == target.text() && entry.mode == mode)
    {
        let clone = entry.file.try_clone().map_err(|e| {
            ShellError::internal(
                command,
                format!("cannot duplicate descriptor for '{}': {}", entry.name, e),
            )
        })?;
        return Ok(PlannedFd::File(clone));
    }

    let names = expand_token(target, shenv.cwd());
    if names.len() != 1 {
        return Err(ShellError::internal(
            command,
            "Unsupported: glob in redirect expanded to multiple files",
        ));
    }
    let name = &names[0];
    let resolved = shenv.resolve(special_file(name));

    let mut options = OpenOptions::new();
    match mode {
        OpenMode::Read => {
            options.read(true);
        }
        OpenMode::Write => {
            options.write(true).create(true).truncate(true);
        }
        OpenMode::Append => {
            options.write(true).append(true).create(true);
        }
    }
    let mut file = options.open(&resolved).map_err(|e| {
        ShellError::internal(command, format!("cannot open '{}': {}", name, e))
    })?;
    // Append-mode opens land at EOF on every platform only after an
    // explicit seek.
    if mode == OpenMode::Append {
        file.seek(SeekFrom::End(0)).map_err(|e| {
            ShellError::internal(command, format!("cannot seek '{}': {}", name, e))
        })?;
    }
    let planned = file.try_clone().map_err(|e| {
        ShellError::internal(
            command,
            format!("cannot duplicate descriptor for '{}': {}", name, e),
        )
    })?;
    ledger.push(OpenedFile {
        name: target.text().to_string(),
        mode,
        file,
        resolved,
    });
    Ok(PlannedFd::File(planned))
}

#[cfg(windows)]
fn special_file(name: &str) -> &str {
    match name {
        "/dev/null" => "NUL",
        "/dev/tty" => "CON",
        _ => name,
    }
}

#[cfg(not(windows))]
fn special_file(name: &str) -> &str {
    name
}
