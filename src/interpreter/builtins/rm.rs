//! rm builtin

use std::fs;
use std::path::Path;

use crate::ast::types::Command;
use crate::interpreter::errors::ShellError;
use crate::interpreter::redirects::process_redirects;
use crate::interpreter::types::ShellCommandResult;
use crate::shell::environment::ShellEnvironment;
use crate::shell::glob_expander::expand_args;

use super::finish_builtin;

/// `rm [-f] [-r|-R|--recursive] PATH...`. Per-path errors are collected;
/// the exit code is 1 if any path failed.
pub fn execute_builtin_rm(
    command: &Command,
    shenv: &ShellEnvironment,
) -> Result<ShellCommandResult, ShellError> {
    let mut ledger = Vec::new();
    let fds = process_redirects(command, shenv, &mut ledger)?;
    let args = expand_args(&command.args, shenv.cwd());

    let mut force = false;
    let mut recursive = false;
    let mut paths: Vec<String> = Vec::new();
    for arg in args.get(1..).unwrap_or(&[]) {
        match arg.as_str() {
            "-f" => force = true,
            "-r" | "-R" | "--recursive" => recursive = true,
            s if s.starts_with('-')
                && s.len() > 1
                && s[1..].chars().all(|c| matches!(c, 'f' | 'r' | 'R')) =>
            {
                for c in s[1..].chars() {
                    match c {
                        'f' => force = true,
                        _ => recursive = true,
                    }
                }
            }
            _ => paths.push(arg.clone()),
        }
    }
    if paths.is_empty() {
        return finish_builtin(
            command,
            fds,
            ledger,
            String::new(),
            "rm: missing operand\n".to_string(),
            1,
        );
    }

    let mut stderr = String::new();
    let mut exit_code = 0;
    for path in &paths {
        let resolved = shenv.resolve(path);
        let metadata = match fs::symlink_metadata(&resolved) {
            Ok(meta) => meta,
            Err(_) => {
                if !force {
                    stderr.push_str(&format!(
                        "Error: 'rm' command failed, {}: No such file or directory\n",
                        resolved.display()
                    ));
                    exit_code = 1;
                }
                continue;
            }
        };
        if metadata.is_dir() {
            if !recursive {
                stderr.push_str(&format!("Error: {} is a directory\n", resolved.display()));
                exit_code = 1;
                continue;
            }
            if let Err(e) = remove_tree(&resolved) {
                stderr.push_str(&format!("Error: 'rm' command failed, {}\n", e));
                exit_code = 1;
            }
        } else {
            if force && metadata.permissions().readonly() {
                make_writable(&resolved, &metadata);
            }
            if let Err(e) = fs::remove_file(&resolved) {
                stderr.push_str(&format!("Error: 'rm' command failed, {}\n", e));
                exit_code = 1;
            }
        }
    }
    finish_builtin(command, fds, ledger, String::new(), stderr, exit_code)
}

/// Remove a directory tree, making read-only entries writable on a retry.
fn remove_tree(path: &Path) -> std::io::Result<()> {
    if fs::remove_dir_all(path).is_ok() {
        return Ok(());
    }
    make_tree_writable(path);
    fs::remove_dir_all(path)
}

fn make_tree_writable(path: &Path) {
    if let Ok(metadata) = fs::symlink_metadata(path) {
        make_writable(path, &metadata);
        if metadata.is_dir() {
            if let Ok(entries) = fs::read_dir(path) {
                for entry in entries.flatten() {
                    make_tree_writable(&entry.path());
                }
            }
        }
    }
}

#[cfg(unix)]
fn make_writable(path: &Path, metadata: &fs::Metadata) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = metadata.permissions();
    let mode = if metadata.is_dir() {
        perms.mode() | 0o700
    } else {
        perms.mode() | 0o200
    };
    perms.set_mode(mode);
    let _ = fs::set_permissions(path, perms);
}

#[cfg(not(unix))]
fn make_writable(path: &Path, metadata: &fs::Metadata) {
    let mut perms = metadata.permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    perms.set_readonly(false);
    let _ = fs::set_permissions(path, perms);
}
