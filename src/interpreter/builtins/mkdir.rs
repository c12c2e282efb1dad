//! mkdir builtin

use std::fs;

use crate::ast::types::Command;
use crate::interpreter::errors::ShellError;
use crate::interpreter::redirects::process_redirects;
use crate::interpreter::types::ShellCommandResult;
use crate::shell::environment::ShellEnvironment;
use crate::shell::glob_expander::expand_args;

use super::finish_builtin;

/// `mkdir [-p] PATH...`. Every path is attempted even after a failure.
pub fn execute_builtin_mkdir(
    command: &Command,
    shenv: &ShellEnvironment,
) -> Result<ShellCommandResult, ShellError> {
    let mut ledger = Vec::new();
    let fds = process_redirects(command, shenv, &mut ledger)?;
    let args = expand_args(&command.args, shenv.cwd());

    let mut parents = false;
    let mut paths: Vec<String> = Vec::new();
    for arg in args.get(1..).unwrap_or(&[]) {
        match arg.as_str() {
            "-p" | "--parents" => parents = true,
            _ => paths.push(arg.clone()),
        }
    }
    if paths.is_empty() {
        return finish_builtin(
            command,
            fds,
            ledger,
            String::new(),
            "mkdir: missing operand\n".to_string(),
            1,
        );
    }

    let mut stderr = String::new();
    let mut exit_code = 0;
    for path in &paths {
        let resolved = shenv.resolve(path);
        let outcome = if parents {
            fs::create_dir_all(&resolved)
        } else {
            fs::create_dir(&resolved)
        };
        if let Err(e) = outcome {
            stderr.push_str(&format!("Error: 'mkdir' command failed, {}\n", e));
            exit_code = 1;
        }
    }
    finish_builtin(command, fds, ledger, String::new(), stderr, exit_code)
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
    fn test_mkdir_simple() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            execute_builtin_mkdir(&first_command("mkdir sub"), &shenv(dir.path())).unwrap();
        assert_eq!(result.exit_code, 0);
        assert!(dir.path().join("sub").is_dir());
    }

    #[test]
    fn test_mkdir_parents() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            execute_builtin_mkdir(&first_command("mkdir -p a/b/c"), &shenv(dir.path())).unwrap();
        assert_eq!(result.exit_code, 0);
        assert!(dir.path().join("a").is_dir());
        assert!(dir.path().join("a/b").is_dir());
        assert!(dir.path().join("a/b/c").is_dir());
        // Re-running with -p on an existing tree succeeds.
        let result =
            execute_builtin_mkdir(&first_command("mkdir -p a/b/c"), &shenv(dir.path())).unwrap();
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn test_mkdir_without_parents_fails_on_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            execute_builtin_mkdir(&first_command("mkdir x/y/z"), &shenv(dir.path())).unwrap();
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("'mkdir' command failed"));
    }

    #[test]
    fn test_mkdir_missing_operand() {
        let dir = tempfile::tempdir().unwrap();
        let result = execute_builtin_mkdir(&first_command("mkdir"), &shenv(dir.path())).unwrap();
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("missing operand"));
    }

    #[test]
    fn test_mkdir_continues_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            execute_builtin_mkdir(&first_command("mkdir x/y ok"), &shenv(dir.path())).unwrap();
        assert_eq!(result.exit_code, 1);
        assert!(dir.path().join("ok").is_dir());
    }

    #[test]
    fn test_mkdir_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let line = format!("mkdir {}", dir.path().join("abs").display());
        let result = execute_builtin_mkdir(&first_command(&line), &shenv(dir.path())).unwrap();
        assert_eq!(result.exit_code, 0);
        assert!(dir.path().join("abs").is_dir());
    }
}
