//! Abstract Syntax Tree Types for Test-Script Commands
//!
//! The runner evaluates exactly three shapes: simple commands, pipelines,
//! and operator sequences. Every leaf of a sequence is a pipeline and every
//! element of a pipeline is a simple command; redirects attach only to
//! simple commands.

use std::fmt;

// =============================================================================
// ARGV TOKENS
// =============================================================================

/// A single argv entry. Glob tokens are lowered to zero or more literals by
/// expansion before a command is dispatched or spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Glob(String),
}

impl Token {
    /// The raw text of the token, pattern text for globs.
    pub fn text(&self) -> &str {
        match self {
            Token::Literal(s) => s,
            Token::Glob(s) => s,
        }
    }

    pub fn is_glob(&self) -> bool {
        matches!(self, Token::Glob(_))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

// =============================================================================
// REDIRECTS
// =============================================================================

/// Redirect operator shapes. `fd` carries the qualifying descriptor when
/// the operator was written as `2>`, `2>>`, `2>&1` and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `>` / `N>`
    Out { fd: Option<u32> },
    /// `>>` / `N>>`
    Append { fd: Option<u32> },
    /// `<`
    In,
    /// `>&` / `N>&`; the target is a descriptor digit or a filename
    Dup { fd: Option<u32> },
    /// `&>`
    MergeOutErr,
}

impl RedirectKind {
    pub fn op_str(&self) -> String {
        match self {
            RedirectKind::Out { fd: Some(n) } => format!("{}>", n),
            RedirectKind::Out { fd: None } => ">".to_string(),
            RedirectKind::Append { fd: Some(n) } => format!("{}>>", n),
            RedirectKind::Append { fd: None } => ">>".to_string(),
            RedirectKind::In => "<".to_string(),
            RedirectKind::Dup { fd: Some(n) } => format!("{}>&", n),
            RedirectKind::Dup { fd: None } => ">&".to_string(),
            RedirectKind::MergeOutErr => "&>".to_string(),
        }
    }
}

/// One `(operator, target)` redirect attached to a simple command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub kind: RedirectKind,
    pub target: Token,
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.op_str(), self.target)
    }
}

// =============================================================================
// COMMANDS, PIPELINES, SEQUENCES
// =============================================================================

/// Simple command: argv plus redirect list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub args: Vec<Token>,
    pub redirects: Vec<Redirect>,
}

impl Command {
    pub fn new(args: Vec<Token>, redirects: Vec<Redirect>) -> Self {
        Self { args, redirects }
    }

    /// First argv entry when it is a plain literal (builtin dispatch key).
    pub fn literal_name(&self) -> Option<&str> {
        match self.args.first() {
            Some(Token::Literal(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arg in &self.args {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", arg)?;
            first = false;
        }
        for redirect in &self.redirects {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", redirect)?;
            first = false;
        }
        Ok(())
    }
}

/// Pipeline: one or more commands connected stdout-to-stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
    /// Invert the zero/nonzero sense of the exit code (`!` prefix).
    pub negate: bool,
    /// Exit-code policy inherited from the test configuration.
    pub pipefail: bool,
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negate {
            write!(f, "! ")?;
        }
        let mut first = true;
        for command in &self.commands {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "{}", command)?;
            first = false;
        }
        Ok(())
    }
}

/// Operators joining two sequence subtrees. `Amp` parses but is rejected by
/// the evaluator (no background execution).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqOp {
    Semi,
    And,
    Or,
    Amp,
}

impl SeqOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeqOp::Semi => ";",
            SeqOp::And => "&&",
            SeqOp::Or => "||",
            SeqOp::Amp => "&",
        }
    }
}

/// Union of the evaluable command shapes. Left-associative by construction:
/// `a; b; c` parses as `Seq(Seq(a, b), c)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShCommand {
    Pipeline(Pipeline),
    Seq {
        lhs: Box<ShCommand>,
        op: SeqOp,
        rhs: Box<ShCommand>,
    },
}

impl fmt::Display for ShCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShCommand::Pipeline(p) => write!(f, "{}", p),
            ShCommand::Seq { lhs, op, rhs } => write!(f, "{} {} {}", lhs, op.as_str(), rhs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Token {
        Token::Literal(s.to_string())
    }

    #[test]
    fn test_token_text_and_glob_flag() {
        assert_eq!(lit("echo").text(), "echo");
        assert!(!lit("echo").is_glob());
        assert!(Token::Glob("*.txt".to_string()).is_glob());
    }

    #[test]
    fn test_command_display_with_redirect() {
        let cmd = Command::new(
            vec![lit("echo"), lit("hi")],
            vec![Redirect {
                kind: RedirectKind::Out { fd: None },
                target: lit("out.txt"),
            }],
        );
        assert_eq!(cmd.to_string(), "echo hi > out.txt");
    }

    #[test]
    fn test_pipeline_display_negated() {
        let pipeline = Pipeline {
            commands: vec![
                Command::new(vec![lit("a")], vec![]),
                Command::new(vec![lit("b")], vec![]),
            ],
            negate: true,
            pipefail: false,
        };
        assert_eq!(pipeline.to_string(), "! a | b");
    }

    #[test]
    fn test_fd_qualified_op_display() {
        assert_eq!(RedirectKind::Dup { fd: Some(2) }.op_str(), "2>&");
        assert_eq!(RedirectKind::Append { fd: Some(1) }.op_str(), "1>>");
        assert_eq!(RedirectKind::MergeOutErr.op_str(), "&>");
    }

    #[test]
    fn test_literal_name_ignores_glob() {
        let cmd = Command::new(vec![Token::Glob("ec*".to_string())], vec![]);
        assert_eq!(cmd.literal_name(), None);
        let cmd = Command::new(vec![lit("cd"), lit("/tmp")], vec![]);
        assert_eq!(cmd.literal_name(), Some("cd"));
    }

    #[test]
    fn test_seq_display_left_fold() {
        let leaf = |name: &str| {
            ShCommand::Pipeline(Pipeline {
                commands: vec![Command::new(vec![lit(name)], vec![])],
                negate: false,
                pipefail: false,
            })
        };
        let seq = ShCommand::Seq {
            lhs: Box::new(ShCommand::Seq {
                lhs: Box::new(leaf("a")),
                op: SeqOp::And,
                rhs: Box::new(leaf("b")),
            }),
            op: SeqOp::Or,
            rhs: Box::new(leaf("c")),
        };
        assert_eq!(seq.to_string(), "a && b || c");
    }
}
