//! Directive Extraction
//!
//! Scans a test source for `KEYWORD:` lines from a configured vocabulary,
//! producing ordered `(line, keyword, value)` tuples. One alternation regex
//! over the escaped keywords drives the scan; line numbers come from
//! counting newlines between successive match positions.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use regex_lite::Regex;
use tracing::warn;

/// How a keyword's directive payload is interpreted by the layers above
/// the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserKind {
    Tag,
    Command,
    List,
    BooleanExpr,
    Custom,
}

lazy_static! {
    /// Keyword suffixes each parser kind permits. Immutable after startup.
    static ref ALLOWED_SUFFIXES: HashMap<ParserKind, &'static [char]> = {
        let mut table = HashMap::new();
        table.insert(ParserKind::Tag, &['.'][..]);
        table.insert(ParserKind::Command, &[':'][..]);
        table.insert(ParserKind::List, &[':'][..]);
        table.insert(ParserKind::BooleanExpr, &[':'][..]);
        table.insert(ParserKind::Custom, &[':', '.'][..]);
        table
    };
}

impl ParserKind {
    pub fn allowed_suffixes(self) -> &'static [char] {
        ALLOWED_SUFFIXES.get(&self).copied().unwrap_or(&[])
    }

    pub fn kind_str(self) -> &'static str {
        match self {
            ParserKind::Tag => "TAG",
            ParserKind::Command => "COMMAND",
            ParserKind::List => "LIST",
            ParserKind::BooleanExpr => "BOOLEAN_EXPR",
            ParserKind::Custom => "CUSTOM",
        }
    }

    /// A directive keyword must end in one of the kind's suffixes.
    pub fn is_valid_keyword(self, keyword: &str) -> bool {
        keyword
            .chars()
            .last()
            .map_or(false, |c| self.allowed_suffixes().contains(&c))
    }
}

/// One scanned directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedDirective {
    pub line_number: usize,
    pub keyword: String,
    pub value: String,
}

/// Scan `source_path` for directive lines. Unreadable files and malformed
/// keyword vocabularies yield an empty list with a warning.
pub fn parse_integrated_test_script_commands(
    source_path: &Path,
    keywords: &[String],
) -> Vec<ScannedDirective> {
    let mut content = match fs::read_to_string(source_path) {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %source_path.display(), error = %e, "could not open input file");
            return Vec::new();
        }
    };
    if content.is_empty() {
        return Vec::new();
    }
    if !content.ends_with('\n') {
        content.push('\n');
    }

    let alternation = keywords
        .iter()
        .map(|keyword| regex_lite::escape(keyword))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!("({})(.*)\n", alternation);
    let regex = match Regex::new(&pattern) {
        Ok(regex) => regex,
        Err(e) => {
            warn!(error = %e, "regex syntax error");
            return Vec::new();
        }
    };

    let mut directives = Vec::new();
    let mut line_number = 1usize;
    let mut last_match_position = 0usize;
    for captures in regex.captures_iter(&content) {
        let (position, keyword, value) = match (captures.get(0), captures.get(1), captures.get(2))
        {
            (Some(whole), Some(keyword), Some(value)) => {
                (whole.start(), keyword.as_str(), value.as_str())
            }
            _ => continue,
        };
        line_number += content[last_match_position..position].matches('\n').count();
        last_match_position = position;
        directives.push(ScannedDirective {
            line_number,
            keyword: keyword.to_string(),
            value: value.trim().to_string(),
        });
    }
    directives
}
