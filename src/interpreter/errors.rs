//! Evaluator Errors
//!
//! Failures that abort evaluation of the current command tree. Built-in
//! operational failures (bad flags, unremovable paths) are not errors: they
//! surface as nonzero exit codes on the command's result and the enclosing
//! sequence continues with its normal short-circuit rules.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShellError {
    /// Parse or redirect-planning failure bound to the offending command's
    /// textual form.
    #[error("{message}: {command}")]
    InternalShell { command: String, message: String },

    /// Background execution and other unimplemented syntax.
    #[error("unsupported shell operator: '{op}'")]
    UnsupportedOperator { op: String },

    /// Built-in misuse that cannot produce a per-command result
    /// (`cd` in a pipeline, wrong `cd` arity).
    #[error("{0}")]
    Value(String),
}

impl ShellError {
    pub fn internal(command: impl ToString, message: impl Into<String>) -> Self {
        ShellError::InternalShell {
            command: command.to_string(),
            message: message.into(),
        }
    }
}
