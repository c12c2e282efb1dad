//! echo builtin
//!
//! Handled in-process so tests that build input files by repeated
//! echo-appends do not pay a spawn per line. Supports `-e` (backslash
//! escapes) and `-n` (no trailing newline), parsed greedily from the
//! front; unknown flags are ordinary output words.

use std::io::Write;

use crate::ast::types::Command;
use crate::interpreter::errors::ShellError;
use crate::interpreter::redirects::{process_redirects, OpenMode, PlannedFd};
use crate::interpreter::types::ShellCommandResult;
use crate::shell::environment::ShellEnvironment;
use crate::shell::glob_expander::expand_args;

pub fn execute_builtin_echo(
    command: &Command,
    shenv: &ShellEnvironment,
) -> Result<ShellCommandResult, ShellError> {
    let mut ledger = Vec::new();
    let fds = process_redirects(command, shenv, &mut ledger)?;
    if !matches!(fds.stdin, PlannedFd::Default) || !matches!(fds.stderr, PlannedFd::Default) {
        return Err(ShellError::internal(
            command,
            "stdin and stderr redirects not supported for echo",
        ));
    }

    let args = expand_args(&command.args, shenv.cwd());
    let mut words: &[String] = args.get(1..).unwrap_or(&[]);
    let mut interpret_escapes = false;
    let mut write_newline = true;
    loop {
        match words.first().map(String::as_str) {
            Some("-e") => {
                interpret_escapes = true;
                words = &words[1..];
            }
            Some("-n") => {
                write_newline = false;
                words = &words[1..];
            }
            _ => break,
        }
    }

    let mut output = words.join(" ");
    if interpret_escapes {
        output = interpret_escape_sequences(&output);
    }
    if write_newline {
        output.push('\n');
    }

    let mut result = ShellCommandResult::new(command.to_string());
    result.output_files = ledger
        .iter()
        .filter(|entry| entry.mode != OpenMode::Read)
        .map(|entry| entry.resolved.clone())
        .collect();
    match fds.stdout {
        PlannedFd::File(mut file) => {
            file.write_all(output.as_bytes())
                .map_err(|e| ShellError::internal(command, format!("write error: {}", e)))?;
        }
        _ => result.stdout = output,
    }
    Ok(result)
}

/// `\n \t \r \\ \0nnn \xNN`; anything else passes through untouched.
fn interpret_escape_sequences(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '\\' || i + 1 >= chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        match chars[i + 1] {
            'n' => {
                out.push('\n');
                i += 2;
            }
            't' => {
                out.push('\t');
                i += 2;
            }
            'r' => {
                out.push('\r');
                i += 2;
            }
            '\\' => {
                out.push('\\');
                i += 2;
            }
            '0' => {
                let mut value = 0u32;
                let mut j = i + 2;
                while j < chars.len() && j < i + 5 {
                    match chars[j].to_digit(8) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            j += 1;
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value).unwrap_or('\u{FFFD}'));
                i = j;
            }
            'x' => {
                let mut value = 0u32;
                let mut j = i + 2;
                while j < chars.len() && j < i + 4 {
                    match chars[j].to_digit(16) {
                        Some(digit) => {
                            value = value * 16 + digit;
                            j += 1;
                        }
                        None => break,
                    }
                }
                if j == i + 2 {
                    out.push('\\');
                    out.push('x');
                } else {
                    out.push(char::from_u32(value).unwrap_or('\u{FFFD}'));
                }
                i = j;
            }
            other => {
                out.push('\\');
                out.push(other);
                i += 2;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::ShCommand;
    use crate::parser::parse_sh_command;
    use indexmap::IndexMap;

    fn first_command(line: &str) -> Command {
        match parse_sh_command(line, false, false).unwrap() {
            ShCommand::Pipeline(p) => p.commands[0].clone(),
            other => panic!("expected pipeline, got {:?}", other),
        }
    }

    fn shenv(dir: &std::path::Path) -> ShellEnvironment {
        ShellEnvironment::new(dir, IndexMap::new())
    }

    #[test]
    fn test_echo_captured() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            execute_builtin_echo(&first_command("echo hello world"), &shenv(dir.path())).unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "hello world\n");
    }

    #[test]
    fn test_echo_n_suppresses_newline() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            execute_builtin_echo(&first_command("echo -n hi"), &shenv(dir.path())).unwrap();
        assert_eq!(result.stdout, "hi");
    }

    #[test]
    fn test_echo_e_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            execute_builtin_echo(&first_command(r"echo -e a\\tb"), &shenv(dir.path())).unwrap();
        assert_eq!(result.stdout, "a\tb\n");
    }

    #[test]
    fn test_echo_unknown_flag_is_a_word() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            execute_builtin_echo(&first_command("echo -x hi"), &shenv(dir.path())).unwrap();
        assert_eq!(result.stdout, "-x hi\n");
    }

    #[test]
    fn test_echo_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            execute_builtin_echo(&first_command("echo hello > out.txt"), &shenv(dir.path()))
                .unwrap();
        assert!(result.stdout.is_empty());
        assert_eq!(result.output_files.len(), 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("out.txt")).unwrap(),
            "hello\n"
        );
    }

    #[test]
    fn test_echo_append_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let shenv = shenv(dir.path());
        execute_builtin_echo(&first_command("echo one >> log"), &shenv).unwrap();
        execute_builtin_echo(&first_command("echo two >> log"), &shenv).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("log")).unwrap(),
            "one\ntwo\n"
        );
    }

    #[test]
    fn test_echo_rejects_stdin_and_stderr_redirects() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("in"), "x").unwrap();
        assert!(execute_builtin_echo(&first_command("echo hi < in"), &shenv(dir.path())).is_err());
        assert!(
            execute_builtin_echo(&first_command("echo hi 2> err"), &shenv(dir.path())).is_err()
        );
    }

    #[test]
    fn test_escape_sequences() {
        assert_eq!(interpret_escape_sequences(r"a\nb"), "a\nb");
        assert_eq!(interpret_escape_sequences(r"a\\nb"), "a\\nb");
        assert_eq!(interpret_escape_sequences(r"\0101"), "A");
        assert_eq!(interpret_escape_sequences(r"\x41"), "A");
        assert_eq!(interpret_escape_sequences(r"\q"), "\\q");
        assert_eq!(interpret_escape_sequences(r"tail\"), "tail\\");
    }
}
