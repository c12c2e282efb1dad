//! Lexer for Test-Script Command Lines
//!
//! Tokenizes a single shell-like command line into words and operators.
//! Quoting rules: single quotes are literal, double quotes honor `\"` and
//! `\\`, a bare backslash escapes the next character. With `win32_escapes`
//! the backslash is an ordinary path character outside quotes. There is no
//! variable expansion; `$` is literal.

use crate::ast::types::{RedirectKind, Token};

use super::types::ParseError;

/// One lexed token: a word (literal or glob) or an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexToken {
    Word(Token),
    Semi,
    AndAnd,
    OrOr,
    Amp,
    Pipe,
    Bang,
    Redirect(RedirectKind),
}

impl LexToken {
    pub fn describe(&self) -> String {
        match self {
            LexToken::Word(t) => t.text().to_string(),
            LexToken::Semi => ";".to_string(),
            LexToken::AndAnd => "&&".to_string(),
            LexToken::OrOr => "||".to_string(),
            LexToken::Amp => "&".to_string(),
            LexToken::Pipe => "|".to_string(),
            LexToken::Bang => "!".to_string(),
            LexToken::Redirect(kind) => kind.op_str(),
        }
    }
}

/// Tokenize one command line.
pub fn tokenize(line: &str, win32_escapes: bool) -> Result<Vec<LexToken>, ParseError> {
    let chars: Vec<char> = line.chars().collect();
    let mut pos = 0;
    let mut tokens = Vec::new();
    while pos < chars.len() {
        let c = chars[pos];
        if c.is_whitespace() {
            pos += 1;
            continue;
        }
        match c {
            ';' => {
                tokens.push(LexToken::Semi);
                pos += 1;
            }
            '&' => {
                if chars.get(pos + 1) == Some(&'&') {
                    tokens.push(LexToken::AndAnd);
                    pos += 2;
                } else if chars.get(pos + 1) == Some(&'>') {
                    tokens.push(LexToken::Redirect(RedirectKind::MergeOutErr));
                    pos += 2;
                } else {
                    tokens.push(LexToken::Amp);
                    pos += 1;
                }
            }
            '|' => {
                if chars.get(pos + 1) == Some(&'|') {
                    tokens.push(LexToken::OrOr);
                    pos += 2;
                } else {
                    tokens.push(LexToken::Pipe);
                    pos += 1;
                }
            }
            '<' | '>' => {
                let kind = lex_redirect(&chars, &mut pos, None);
                tokens.push(LexToken::Redirect(kind));
            }
            _ => {
                let (word, has_glob, quoted) = lex_word(&chars, &mut pos, win32_escapes)?;
                // An all-digit unquoted word juxtaposed to `>` is the fd
                // qualifier of the redirect that follows (`2>`, `2>>`, `2>&1`).
                if !quoted
                    && !word.is_empty()
                    && word.chars().all(|ch| ch.is_ascii_digit())
                    && chars.get(pos) == Some(&'>')
                {
                    let fd = word.parse::<u32>().ok();
                    let kind = lex_redirect(&chars, &mut pos, fd);
                    tokens.push(LexToken::Redirect(kind));
                } else if !quoted && word == "!" {
                    tokens.push(LexToken::Bang);
                } else if has_glob {
                    tokens.push(LexToken::Word(Token::Glob(word)));
                } else {
                    tokens.push(LexToken::Word(Token::Literal(word)));
                }
            }
        }
    }
    Ok(tokens)
}

/// Lex a redirect operator with `pos` on `<` or `>`.
fn lex_redirect(chars: &[char], pos: &mut usize, fd: Option<u32>) -> RedirectKind {
    if chars.get(*pos) == Some(&'<') {
        *pos += 1;
        return RedirectKind::In;
    }
    match chars.get(*pos + 1) {
        Some('>') => {
            *pos += 2;
            RedirectKind::Append { fd }
        }
        Some('&') => {
            *pos += 2;
            RedirectKind::Dup { fd }
        }
        _ => {
            *pos += 1;
            RedirectKind::Out { fd }
        }
    }
}

/// Lex one word. Returns (text, saw-unquoted-glob-char, saw-quoting).
fn lex_word(
    chars: &[char],
    pos: &mut usize,
    win32_escapes: bool,
) -> Result<(String, bool, bool), ParseError> {
    let mut word = String::new();
    let mut has_glob = false;
    let mut quoted = false;
    while *pos < chars.len() {
        let c = chars[*pos];
        match c {
            c if c.is_whitespace() => break,
            ';' | '&' | '|' | '<' | '>' => break,
            '\'' => {
                quoted = true;
                *pos += 1;
                loop {
                    match chars.get(*pos) {
                        Some('\'') => {
                            *pos += 1;
                            break;
                        }
                        Some(&ch) => {
                            word.push(ch);
                            *pos += 1;
                        }
                        None => return Err(ParseError::UnterminatedQuote),
                    }
                }
            }
            '"' => {
                quoted = true;
                *pos += 1;
                loop {
                    match chars.get(*pos) {
                        Some('"') => {
                            *pos += 1;
                            break;
                        }
                        Some('\\') if !win32_escapes => match chars.get(*pos + 1) {
                            Some(&next) if next == '"' || next == '\\' => {
                                word.push(next);
                                *pos += 2;
                            }
                            _ => {
                                word.push('\\');
                                *pos += 1;
                            }
                        },
                        Some(&ch) => {
                            word.push(ch);
                            *pos += 1;
                        }
                        None => return Err(ParseError::UnterminatedQuote),
                    }
                }
            }
            '\\' if !win32_escapes => match chars.get(*pos + 1) {
                Some(&next) => {
                    word.push(next);
                    *pos += 2;
                }
                None => {
                    word.push('\\');
                    *pos += 1;
                }
            },
            '*' | '?' | '[' => {
                has_glob = true;
                word.push(c);
                *pos += 1;
            }
            _ => {
                word.push(c);
                *pos += 1;
            }
        }
    }
    Ok((word, has_glob, quoted))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(tokens: &[LexToken]) -> Vec<String> {
        tokens
            .iter()
            .filter_map(|t| match t {
                LexToken::Word(w) => Some(w.text().to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_simple_words() {
        let tokens = tokenize("echo hello world", false).unwrap();
        assert_eq!(words(&tokens), vec!["echo", "hello", "world"]);
    }

    #[test]
    fn test_single_quotes_literal() {
        let tokens = tokenize("echo 'a b' c", false).unwrap();
        assert_eq!(words(&tokens), vec!["echo", "a b", "c"]);
    }

    #[test]
    fn test_double_quote_escapes() {
        let tokens = tokenize(r#"echo "a \"b\" \\c""#, false).unwrap();
        assert_eq!(words(&tokens), vec!["echo", r#"a "b" \c"#]);
    }

    #[test]
    fn test_backslash_escapes_metachar() {
        let tokens = tokenize(r"echo a\ b", false).unwrap();
        assert_eq!(words(&tokens), vec!["echo", "a b"]);
    }

    #[test]
    fn test_win32_backslash_is_path_char() {
        let tokens = tokenize(r"type C:\tmp\file", true).unwrap();
        assert_eq!(words(&tokens), vec!["type", r"C:\tmp\file"]);
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(
            tokenize("echo 'oops", false),
            Err(ParseError::UnterminatedQuote)
        );
    }

    #[test]
    fn test_glob_word() {
        let tokens = tokenize("ls *.txt", false).unwrap();
        assert_eq!(
            tokens[1],
            LexToken::Word(Token::Glob("*.txt".to_string()))
        );
    }

    #[test]
    fn test_quoted_glob_stays_literal() {
        let tokens = tokenize("ls '*.txt'", false).unwrap();
        assert_eq!(
            tokens[1],
            LexToken::Word(Token::Literal("*.txt".to_string()))
        );
    }

    #[test]
    fn test_operators() {
        let tokens = tokenize("a && b || c; d | e", false).unwrap();
        assert!(tokens.contains(&LexToken::AndAnd));
        assert!(tokens.contains(&LexToken::OrOr));
        assert!(tokens.contains(&LexToken::Semi));
        assert!(tokens.contains(&LexToken::Pipe));
    }

    #[test]
    fn test_fd_qualified_redirect() {
        let tokens = tokenize("cmd 2> err.txt", false).unwrap();
        assert_eq!(
            tokens[1],
            LexToken::Redirect(RedirectKind::Out { fd: Some(2) })
        );
    }

    #[test]
    fn test_digit_word_with_space_is_not_fd() {
        let tokens = tokenize("echo 2 > f", false).unwrap();
        assert_eq!(tokens[1], LexToken::Word(Token::Literal("2".to_string())));
        assert_eq!(tokens[2], LexToken::Redirect(RedirectKind::Out { fd: None }));
    }

    #[test]
    fn test_dup_redirect() {
        let tokens = tokenize("cmd > f 2>&1", false).unwrap();
        assert_eq!(
            tokens[3],
            LexToken::Redirect(RedirectKind::Dup { fd: Some(2) })
        );
        assert_eq!(tokens[4], LexToken::Word(Token::Literal("1".to_string())));
    }

    #[test]
    fn test_merge_out_err() {
        let tokens = tokenize("cmd &> all.txt", false).unwrap();
        assert_eq!(tokens[1], LexToken::Redirect(RedirectKind::MergeOutErr));
    }

    #[test]
    fn test_append_and_input() {
        let tokens = tokenize("cmd >> log < in", false).unwrap();
        assert_eq!(
            tokens[1],
            LexToken::Redirect(RedirectKind::Append { fd: None })
        );
        assert_eq!(tokens[3], LexToken::Redirect(RedirectKind::In));
    }

    #[test]
    fn test_bang() {
        let tokens = tokenize("! cmd", false).unwrap();
        assert_eq!(tokens[0], LexToken::Bang);
    }
}
