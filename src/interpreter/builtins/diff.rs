//! diff builtin
//!
//! Thin wrapper over the comparison engine: flag parsing, cwd-joining and
//! redirect routing live here, the diff itself in [`crate::diff`].

use crate::ast::types::Command;
use crate::diff::{compare_files, DiffFlags};
use crate::interpreter::errors::ShellError;
use crate::interpreter::redirects::process_redirects;
use crate::interpreter::types::ShellCommandResult;
use crate::shell::environment::ShellEnvironment;
use crate::shell::glob_expander::expand_args;

use super::finish_builtin;

/// `diff [--strip-trailing-cr] [-w] [-b] [--binary] FILE1 FILE2`
pub fn execute_builtin_diff(
    command: &Command,
    shenv: &ShellEnvironment,
) -> Result<ShellCommandResult, ShellError> {
    let mut ledger = Vec::new();
    let fds = process_redirects(command, shenv, &mut ledger)?;
    let args = expand_args(&command.args, shenv.cwd());

    let mut flags = DiffFlags::default();
    let mut files: Vec<String> = Vec::new();
    for arg in args.get(1..).unwrap_or(&[]) {
        match arg.as_str() {
            "--strip-trailing-cr" => flags.strip_trailing_cr = true,
            "-w" => flags.ignore_all_space = true,
            "-b" => flags.ignore_space_change = true,
            "--binary" => flags.binary = true,
            s if s.starts_with('-') && s.len() > 1 => {
                return finish_builtin(
                    command,
                    fds,
                    ledger,
                    String::new(),
                    format!("diff: unrecognized option '{}'\n", s),
                    2,
                );
            }
            _ => files.push(arg.clone()),
        }
    }
    if files.len() != 2 {
        let message = if files.len() < 2 {
            "diff: missing operand\n"
        } else {
            "diff: extra operand\n"
        };
        return finish_builtin(command, fds, ledger, String::new(), message.to_string(), 2);
    }

    let lhs = shenv.resolve(&files[0]);
    let rhs = shenv.resolve(&files[1]);
    let outcome = compare_files(&lhs, &rhs, flags);
    finish_builtin(
        command,
        fds,
        ledger,
        outcome.stdout,
        outcome.stderr,
        outcome.exit_code,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::ShCommand;
    use crate::parser::parse_sh_command;
    use indexmap::IndexMap;
    use std::fs;

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
    fn test_diff_identical() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "x\ny\n").unwrap();
        fs::write(dir.path().join("b.txt"), "x\ny\n").unwrap();
        let result =
            execute_builtin_diff(&first_command("diff a.txt b.txt"), &shenv(dir.path())).unwrap();
        assert_eq!(result.exit_code, 0);
        assert!(result.stdout.is_empty());
    }

    #[test]
    fn test_diff_reports_hunk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "x\ny\n").unwrap();
        fs::write(dir.path().join("b.txt"), "x\nz\n").unwrap();
        let result =
            execute_builtin_diff(&first_command("diff a.txt b.txt"), &shenv(dir.path())).unwrap();
        assert_eq!(result.exit_code, 1);
        assert!(result.stdout.contains("-y"));
        assert!(result.stdout.contains("+z"));
    }

    #[test]
    fn test_diff_strip_trailing_cr() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "x\ny\r\n").unwrap();
        fs::write(dir.path().join("b.txt"), "x\ny\n").unwrap();
        let result = execute_builtin_diff(
            &first_command("diff --strip-trailing-cr a.txt b.txt"),
            &shenv(dir.path()),
        )
        .unwrap();
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn test_diff_missing_operand() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "x\n").unwrap();
        let result =
            execute_builtin_diff(&first_command("diff a.txt"), &shenv(dir.path())).unwrap();
        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.contains("missing operand"));
    }

    #[test]
    fn test_diff_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "x\n").unwrap();
        let result = execute_builtin_diff(
            &first_command("diff a.txt missing.txt"),
            &shenv(dir.path()),
        )
        .unwrap();
        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.contains("missing.txt"));
    }

    #[test]
    fn test_diff_output_redirect() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "x\n").unwrap();
        fs::write(dir.path().join("b.txt"), "y\n").unwrap();
        let result = execute_builtin_diff(
            &first_command("diff a.txt b.txt > delta.txt"),
            &shenv(dir.path()),
        )
        .unwrap();
        assert_eq!(result.exit_code, 1);
        assert!(result.stdout.is_empty());
        let written = fs::read_to_string(dir.path().join("delta.txt")).unwrap();
        assert!(written.contains("-x"));
        assert!(written.contains("+y"));
    }
}
