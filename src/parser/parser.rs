//! Command-Line Parser
//!
//! Builds the Sequence/Pipeline/Command AST from the token stream. All
//! sequence operators share one precedence level and fold left, which
//! matches shell evaluation order for `;`, `&&` and `||`.

use crate::ast::types::{Command, Pipeline, Redirect, SeqOp, ShCommand};

use super::lexer::{tokenize, LexToken};
use super::types::ParseError;

/// Parse one command line into an evaluable AST.
///
/// `win32_escapes` disables backslash escaping outside quotes (paths);
/// `pipefail` is stamped onto every pipeline produced.
pub fn parse_sh_command(
    line: &str,
    win32_escapes: bool,
    pipefail: bool,
) -> Result<ShCommand, ParseError> {
    let tokens = tokenize(line, win32_escapes)?;
    ShParser {
        tokens,
        pos: 0,
        pipefail,
    }
    .parse()
}

struct ShParser {
    tokens: Vec<LexToken>,
    pos: usize,
    pipefail: bool,
}

impl ShParser {
    fn peek(&self) -> Option<&LexToken> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<LexToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse(mut self) -> Result<ShCommand, ParseError> {
        let mut tree = ShCommand::Pipeline(self.parse_pipeline()?);
        loop {
            let op = match self.peek() {
                Some(LexToken::Semi) => SeqOp::Semi,
                Some(LexToken::AndAnd) => SeqOp::And,
                Some(LexToken::OrOr) => SeqOp::Or,
                Some(LexToken::Amp) => SeqOp::Amp,
                Some(other) => {
                    return Err(ParseError::UnexpectedToken {
                        token: other.describe(),
                    })
                }
                None => break,
            };
            self.pos += 1;
            if self.peek().is_none() {
                return Err(ParseError::TrailingOperator {
                    op: op.as_str().to_string(),
                });
            }
            let rhs = ShCommand::Pipeline(self.parse_pipeline()?);
            tree = ShCommand::Seq {
                lhs: Box::new(tree),
                op,
                rhs: Box::new(rhs),
            };
        }
        Ok(tree)
    }

    fn parse_pipeline(&mut self) -> Result<Pipeline, ParseError> {
        let mut negate = false;
        if matches!(self.peek(), Some(LexToken::Bang)) {
            negate = true;
            self.pos += 1;
        }
        let mut commands = vec![self.parse_command()?];
        while matches!(self.peek(), Some(LexToken::Pipe)) {
            self.pos += 1;
            commands.push(self.parse_command()?);
        }
        Ok(Pipeline {
            commands,
            negate,
            pipefail: self.pipefail,
        })
    }

    fn parse_command(&mut self) -> Result<Command, ParseError> {
        let mut args = Vec::new();
        let mut redirects = Vec::new();
        loop {
            match self.peek() {
                Some(LexToken::Word(_)) => {
                    if let Some(LexToken::Word(token)) = self.next() {
                        args.push(token);
                    }
                }
                Some(LexToken::Redirect(kind)) => {
                    let kind = *kind;
                    self.pos += 1;
                    match self.next() {
                        Some(LexToken::Word(target)) => {
                            redirects.push(Redirect { kind, target })
                        }
                        _ => {
                            return Err(ParseError::MissingRedirectTarget {
                                op: kind.op_str(),
                            })
                        }
                    }
                }
                _ => break,
            }
        }
        if args.is_empty() {
            return Err(ParseError::EmptyCommand);
        }
        Ok(Command::new(args, redirects))
    }
}
