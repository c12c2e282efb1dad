//! Interpreter Result Types

use std::path::PathBuf;

/// Exit code reserved for evaluations aborted by the timeout supervisor.
/// Distinct from any exit code a command can produce.
pub const TIMEOUT_EXIT_CODE: i32 = -999;

/// Exit code for infrastructure failures (temp files, capture reads).
pub const INFRA_EXIT_CODE: i32 = -99;

/// Per-command record produced by the evaluator.
#[derive(Debug, Clone)]
pub struct ShellCommandResult {
    /// Textual form of the originating command.
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timeout_reached: bool,
    /// Files opened for output redirects, kept for post-run inspection.
    pub output_files: Vec<PathBuf>,
}

impl ShellCommandResult {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            timeout_reached: false,
            output_files: Vec::new(),
        }
    }

    /// Record for an evaluation aborted by a shell-internal error.
    pub fn internal_error(command: impl Into<String>, message: impl Into<String>) -> Self {
        let mut result = Self::new(command);
        result.stderr = format!("{}\n", message.into());
        result.exit_code = -1;
        result
    }
}

/// Result of running one composed script, internal or external.
#[derive(Debug, Clone, Default)]
pub struct ExecScriptResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Out-of-band diagnostic (spawn failure, timeout notice).
    pub error: String,
}
