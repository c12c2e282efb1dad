//! Command AST for the embedded mini-shell.

pub mod types;

pub use types::{Command, Pipeline, Redirect, RedirectKind, SeqOp, ShCommand, Token};
