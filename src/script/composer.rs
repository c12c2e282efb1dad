//! Script Composer / External Runner
//!
//! Serializes the composed command list to an interpreter script and runs
//! it with captured stdout/stderr under the per-test timeout. On Windows
//! without bash the script is a `.bat` run by `cmd /c`; everywhere else a
//! shell script run by the configured bash or `/bin/sh`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use lazy_static::lazy_static;
use regex_lite::Regex;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::Test;
use crate::interpreter::timeout::TimeoutSupervisor;
use crate::interpreter::types::{ExecScriptResult, INFRA_EXIT_CODE, TIMEOUT_EXIT_CODE};

lazy_static! {
    /// `%dbg(...)` markers embedded by the directive composer.
    static ref PDBG_REGEX: Regex = Regex::new(r#"%dbg\(([^)'"]*)\)\s*"#).unwrap();
}

/// Rewrite debug markers into a shell no-op that keeps the marker text
/// visible in `set -x` traces.
pub fn rewrite_pdbg_posix(command: &str) -> String {
    PDBG_REGEX.replace_all(command, ": '$1'; ").into_owned()
}

/// CMD has no `:` no-op; a redirected echo plays the same role.
fn rewrite_pdbg_cmdexe(command: &str) -> String {
    PDBG_REGEX
        .replace_all(command, "echo '$1' > nul && ")
        .into_owned()
}

fn infra_error(message: String) -> ExecScriptResult {
    ExecScriptResult {
        stdout: String::new(),
        stderr: message.clone(),
        exit_code: INFRA_EXIT_CODE,
        error: message,
    }
}

/// Write the script file and run it with the external interpreter.
pub fn execute_script(
    test: &Test,
    commands: &[String],
    temp_base: &Path,
    cwd: &Path,
) -> ExecScriptResult {
    let config = test.config();
    let is_win32_cmdexe = config.is_windows && config.bash_path.is_none();
    let script_path = if is_win32_cmdexe {
        PathBuf::from(format!("{}.script.bat", temp_base.display()))
    } else {
        PathBuf::from(format!("{}.script", temp_base.display()))
    };

    let body = if is_win32_cmdexe {
        let rewritten: Vec<String> = commands.iter().map(|c| rewrite_pdbg_cmdexe(c)).collect();
        let echo_mode = if config.echo_all_commands {
            "@echo on"
        } else {
            "@echo off"
        };
        format!(
            "{}\n{}\n",
            echo_mode,
            rewritten.join("\n@if %ERRORLEVEL% NEQ 0 EXIT\n")
        )
    } else {
        let rewritten: Vec<String> = commands.iter().map(|c| rewrite_pdbg_posix(c)).collect();
        let mut prefix = String::new();
        if config.pipefail {
            prefix.push_str("set -o pipefail;");
        }
        if config.echo_all_commands {
            prefix.push_str("set -x;");
        }
        format!("{}{{ {}; }}\n", prefix, rewritten.join("; } &&\n{ "))
    };
    // Byte-for-byte write keeps LF endings regardless of platform.
    if let Err(e) = fs::write(&script_path, body.as_bytes()) {
        return infra_error(format!("could not write script file: {}", e));
    }
    debug!(script = %script_path.display(), "composed test script");

    let mut argv: Vec<String> = Vec::new();
    if is_win32_cmdexe {
        argv.push("cmd".to_string());
        argv.push("/c".to_string());
    } else {
        if config.use_valgrind {
            argv.extend(config.valgrind_args.iter().cloned());
        }
        let interpreter = config
            .bash_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "/bin/sh".to_string());
        argv.push(interpreter);
    }
    argv.push(script_path.display().to_string());

    // Capture files are removed on drop whether or not the run succeeds.
    let out_file = match NamedTempFile::new() {
        Ok(file) => file,
        Err(e) => return infra_error(format!("could not create capture file: {}", e)),
    };
    let err_file = match NamedTempFile::new() {
        Ok(file) => file,
        Err(e) => return infra_error(format!("could not create capture file: {}", e)),
    };
    let out_handle = match out_file.reopen() {
        Ok(handle) => handle,
        Err(e) => return infra_error(format!("could not open capture file: {}", e)),
    };
    let err_handle = match err_file.reopen() {
        Ok(handle) => handle,
        Err(e) => return infra_error(format!("could not open capture file: {}", e)),
    };

    let mut os_cmd = std::process::Command::new(&argv[0]);
    os_cmd.args(&argv[1..]);
    os_cmd.current_dir(cwd);
    // Host environment is inherited; the test's map overrides it.
    for (key, value) in &config.environment {
        os_cmd.env(key, value);
    }
    os_cmd.stdin(Stdio::null());
    os_cmd.stdout(Stdio::from(out_handle));
    os_cmd.stderr(Stdio::from(err_handle));
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        os_cmd.process_group(0);
    }

    let timeout_ms = config.max_individual_test_time.as_millis() as u64;
    let mut supervisor = TimeoutSupervisor::new(timeout_ms);
    supervisor.start_timer();
    let mut child = match os_cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return infra_error(format!("could not run interpreter '{}': {}", argv[0], e))
        }
    };
    supervisor.add_process(child.id());
    let status = child.wait();
    supervisor.cancel();

    let mut exit_code = match status {
        Ok(status) => status.code().unwrap_or(-1),
        Err(e) => return infra_error(format!("wait failed: {}", e)),
    };
    let mut error = String::new();
    if supervisor.timeout_reached() {
        exit_code = TIMEOUT_EXIT_CODE;
        error = format!("Reached timeout of {} seconds", timeout_ms / 1000);
    }

    let stdout = match fs::read_to_string(out_file.path()) {
        Ok(content) => content,
        Err(e) => return infra_error(format!("could not read captured stdout: {}", e)),
    };
    let stderr = match fs::read_to_string(err_file.path()) {
        Ok(content) => content,
        Err(e) => return infra_error(format!("could not read captured stderr: {}", e)),
    };

    // Mirror the interpreter contract: stderr travels with failures, stdout
    // with success.
    if exit_code != 0 {
        ExecScriptResult {
            stdout: String::new(),
            stderr,
            exit_code,
            error,
        }
    } else {
        ExecScriptResult {
            stdout,
            stderr: String::new(),
            exit_code: 0,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TestConfig;

    #[test]
    fn test_pdbg_rewrite_posix() {
        assert_eq!(
            rewrite_pdbg_posix("%dbg(RUN: at line 4) echo x"),
            ": 'RUN: at line 4'; echo x"
        );
    }

    #[test]
    fn test_pdbg_rewrite_cmdexe() {
        assert_eq!(
            rewrite_pdbg_cmdexe("%dbg(RUN: at line 4) echo x"),
            "echo 'RUN: at line 4' > nul && echo x"
        );
    }

    #[test]
    fn test_pdbg_untouched_without_marker() {
        assert_eq!(rewrite_pdbg_posix("echo plain"), "echo plain");
    }

    #[cfg(unix)]
    mod external {
        use super::*;
        use std::time::Duration;

        fn make_test(dir: &Path, config: TestConfig) -> (Test, PathBuf, PathBuf) {
            let source = dir.join("case.test");
            std::fs::write(&source, "// RUN: true\n").unwrap();
            let test = Test::new(&source, dir.join("exec/case.test"), config);
            let (temp_dir, temp_base) = test.temp_paths();
            std::fs::create_dir_all(&temp_dir).unwrap();
            (test, temp_dir, temp_base)
        }

        fn posix_config() -> TestConfig {
            // pipefail stays off: /bin/sh may be dash, which rejects
            // `set -o pipefail`.
            TestConfig {
                is_windows: false,
                pipefail: false,
                ..TestConfig::default()
            }
        }

        #[test]
        fn test_successful_script_captures_stdout() {
            let dir = tempfile::tempdir().unwrap();
            let (test, _, temp_base) = make_test(dir.path(), posix_config());
            let commands = vec!["echo hello".to_string(), "echo world".to_string()];
            let result = execute_script(&test, &commands, &temp_base, dir.path());
            assert_eq!(result.exit_code, 0);
            assert_eq!(result.stdout, "hello\nworld\n");
            assert!(result.stderr.is_empty());
        }

        #[test]
        fn test_failing_script_carries_stderr_and_exit() {
            let dir = tempfile::tempdir().unwrap();
            let (test, _, temp_base) = make_test(dir.path(), posix_config());
            let commands = vec!["echo doomed >&2; exit 7".to_string()];
            let result = execute_script(&test, &commands, &temp_base, dir.path());
            assert_eq!(result.exit_code, 7);
            assert!(result.stderr.contains("doomed"));
            assert!(result.stdout.is_empty());
        }

        #[test]
        fn test_commands_chained_with_and() {
            let dir = tempfile::tempdir().unwrap();
            let (test, _, temp_base) = make_test(dir.path(), posix_config());
            let commands = vec!["false".to_string(), "echo unreachable".to_string()];
            let result = execute_script(&test, &commands, &temp_base, dir.path());
            assert_ne!(result.exit_code, 0);
            assert!(!result.stdout.contains("unreachable"));
        }

        #[test]
        fn test_script_file_extension_and_body() {
            let dir = tempfile::tempdir().unwrap();
            let mut config = posix_config();
            config.pipefail = true;
            config.echo_all_commands = true;
            let (test, _, temp_base) = make_test(dir.path(), config);
            let commands = vec!["true".to_string()];
            // Only the composed file matters here; the run itself may fail
            // under shells without pipefail.
            execute_script(&test, &commands, &temp_base, dir.path());
            let script = PathBuf::from(format!("{}.script", temp_base.display()));
            let body = std::fs::read_to_string(script).unwrap();
            assert!(body.starts_with("set -o pipefail;set -x;"));
            assert!(body.contains("{ true; }"));
        }

        #[test]
        fn test_timeout_reports_sentinel() {
            let dir = tempfile::tempdir().unwrap();
            let mut config = posix_config();
            config.max_individual_test_time = Duration::from_millis(100);
            let (test, _, temp_base) = make_test(dir.path(), config);
            let commands = vec!["sleep 10".to_string()];
            let result = execute_script(&test, &commands, &temp_base, dir.path());
            assert_eq!(result.exit_code, TIMEOUT_EXIT_CODE);
            assert!(result.error.contains("Reached timeout of 0 seconds"));
        }

        #[test]
        fn test_environment_overrides_host() {
            let dir = tempfile::tempdir().unwrap();
            let mut config = posix_config();
            config
                .environment
                .insert("SHTEST_PROBE".to_string(), "42".to_string());
            let (test, _, temp_base) = make_test(dir.path(), config);
            let commands = vec!["echo $SHTEST_PROBE".to_string()];
            let result = execute_script(&test, &commands, &temp_base, dir.path());
            assert_eq!(result.stdout, "42\n");
        }

        #[test]
        fn test_explicit_bash_path() {
            let dir = tempfile::tempdir().unwrap();
            let mut config = posix_config();
            config.bash_path = Some(PathBuf::from("/bin/sh"));
            let (test, _, temp_base) = make_test(dir.path(), config);
            let commands = vec!["echo via-bash-path".to_string()];
            let result = execute_script(&test, &commands, &temp_base, dir.path());
            assert_eq!(result.stdout, "via-bash-path\n");
        }
    }
}
