//! shtest - execution core for integrated test scripts
//!
//! A test is a source file annotated with embedded `RUN:` directives. This
//! crate extracts those directives, expands `%`-substitutions, and either
//! serializes the commands to a script for an external shell or evaluates
//! them with an embedded mini-shell (sequences, pipelines, redirects and a
//! small builtin set), enforcing a per-test timeout and producing a single
//! pass/fail verdict with captured output.

pub mod ast;
pub mod config;
pub mod diff;
pub mod interpreter;
pub mod parser;
pub mod script;
pub mod shell;

pub use ast::types::*;
pub use config::{Test, TestConfig};
pub use interpreter::types::{
    ExecScriptResult, ShellCommandResult, INFRA_EXIT_CODE, TIMEOUT_EXIT_CODE,
};
pub use interpreter::{execute_shcmd, ShellError, TimeoutSupervisor};
pub use parser::{parse_sh_command, ParseError};
pub use script::{execute_sh_test, TestResult, TestStatus};
pub use shell::ShellEnvironment;
