//! Test Execution
//!
//! Ties the pieces together: extract `RUN:` directives, apply
//! substitutions, execute externally or with the embedded shell, classify
//! the outcome.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::ast::types::{SeqOp, ShCommand};
use crate::config::Test;
use crate::interpreter::executor::execute_shcmd;
use crate::interpreter::types::{
    ExecScriptResult, ShellCommandResult, INFRA_EXIT_CODE, TIMEOUT_EXIT_CODE,
};
use crate::parser::parse_sh_command;
use crate::shell::environment::ShellEnvironment;

use super::composer::{execute_script, rewrite_pdbg_posix};
use super::directives::parse_integrated_test_script_commands;
use super::substitutions::{apply_substitutions, get_default_substitutions};

pub const RUN_KEYWORD: &str = "RUN:";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Test has no RUN: line")]
    NoRunLine,
    #[error("Test has unterminated RUN: line (ends with '\\')")]
    UnterminatedRunLine,
}

/// Final verdict for one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Pass,
    Fail,
    Timeout,
    /// Infrastructure failure: the test could not be evaluated at all.
    Unresolved,
}

/// Verdict plus the captured output a reporter renders.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub status: TestStatus,
    pub output: String,
}

impl TestResult {
    fn unresolved(message: impl Into<String>) -> Self {
        Self {
            status: TestStatus::Unresolved,
            output: message.into(),
        }
    }
}

/// Extract the RUN commands from a test source: values ending in `\` join
/// the next RUN line, and every complete command gets a `%dbg` marker
/// recording its source line.
pub fn parse_test_script(test: &Test) -> Result<Vec<String>, ScriptError> {
    let directives = parse_integrated_test_script_commands(
        test.source_path(),
        &[RUN_KEYWORD.to_string()],
    );
    let mut commands = Vec::new();
    let mut pending: Option<(usize, String)> = None;
    for directive in directives {
        if directive.keyword != RUN_KEYWORD {
            continue;
        }
        let (line_number, text) = match pending.take() {
            Some((line_number, prefix)) => (line_number, format!("{}{}", prefix, directive.value)),
            None => (directive.line_number, directive.value),
        };
        match text.strip_suffix('\\') {
            Some(prefix) => pending = Some((line_number, prefix.to_string())),
            None => commands.push(format!("%dbg(RUN: at line {}) {}", line_number, text)),
        }
    }
    if pending.is_some() {
        return Err(ScriptError::UnterminatedRunLine);
    }
    if commands.is_empty() {
        return Err(ScriptError::NoRunLine);
    }
    Ok(commands)
}

/// Run the composed commands with the embedded shell: parse each one,
/// left-fold with `&&`, evaluate under the per-test timeout.
pub fn execute_script_internal(test: &Test, commands: &[String], cwd: &Path) -> ExecScriptResult {
    let config = test.config();
    let mut parsed: Vec<ShCommand> = Vec::new();
    for raw in commands {
        let rewritten = rewrite_pdbg_posix(raw);
        match parse_sh_command(&rewritten, config.is_windows, config.pipefail) {
            Ok(cmd) => parsed.push(cmd),
            Err(_) => {
                return ExecScriptResult {
                    stdout: String::new(),
                    stderr: format!("shell parser error on: {}", rewritten),
                    exit_code: -1,
                    error: String::new(),
                }
            }
        }
    }
    let mut iter = parsed.into_iter();
    let mut tree = match iter.next() {
        Some(first) => first,
        None => return ExecScriptResult::default(),
    };
    for next in iter {
        tree = ShCommand::Seq {
            lhs: Box::new(tree),
            op: SeqOp::And,
            rhs: Box::new(next),
        };
    }

    let mut shenv = ShellEnvironment::from_host(cwd, &config.environment);
    let mut results: Vec<ShellCommandResult> = Vec::new();
    let timeout_ms = config.max_individual_test_time.as_millis() as u64;
    let (exit_code, timeout_info) = execute_shcmd(&tree, &mut shenv, &mut results, timeout_ms);

    let mut stdout = String::new();
    let mut stderr = String::new();
    for result in &results {
        stdout.push_str(&format!("$ {}\n", result.command));
        stdout.push_str(&result.stdout);
        stderr.push_str(&result.stderr);
    }
    if !timeout_info.is_empty() {
        stderr.push_str(&timeout_info);
        stderr.push('\n');
    }
    ExecScriptResult {
        stdout,
        stderr,
        exit_code,
        error: timeout_info,
    }
}

/// Execute one test end to end and classify the outcome.
pub fn execute_sh_test(test: &Test, execute_external: bool) -> TestResult {
    let commands = match parse_test_script(test) {
        Ok(commands) => commands,
        Err(e) => return TestResult::unresolved(e.to_string()),
    };
    let (temp_dir, temp_base) = test.temp_paths();
    if let Err(e) = fs::create_dir_all(&temp_dir) {
        return TestResult::unresolved(format!(
            "could not create temp directory {}: {}",
            temp_dir.display(),
            e
        ));
    }

    let substitutions = get_default_substitutions(
        test,
        &temp_dir,
        &temp_base,
        test.config().is_windows,
    );
    let script = commands.join("\n");
    let lines = apply_substitutions(&script, &substitutions);
    debug!(test = %test.source_path().display(), external = execute_external, "running test script");

    let exec_dir = test
        .exec_path()
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| temp_dir.clone());
    let result = if execute_external {
        execute_script(test, &lines, &temp_base, &exec_dir)
    } else {
        execute_script_internal(test, &lines, &exec_dir)
    };

    let status = match result.exit_code {
        0 => TestStatus::Pass,
        TIMEOUT_EXIT_CODE => TestStatus::Timeout,
        INFRA_EXIT_CODE => TestStatus::Unresolved,
        _ => TestStatus::Fail,
    };
    let mut output = String::new();
    output.push_str("Script:\n--\n");
    output.push_str(&lines.join("\n"));
    output.push_str("\n--\n");
    output.push_str(&format!("Exit Code: {}\n", result.exit_code));
    if !result.error.is_empty() {
        output.push_str(&format!("{}\n", result.error));
    }
    if !result.stdout.is_empty() {
        output.push_str("\nCommand Output (stdout):\n--\n");
        output.push_str(&result.stdout);
        output.push_str("\n--\n");
    }
    if !result.stderr.is_empty() {
        output.push_str("\nCommand Output (stderr):\n--\n");
        output.push_str(&result.stderr);
        output.push_str("\n--\n");
    }
    TestResult { status, output }
}
