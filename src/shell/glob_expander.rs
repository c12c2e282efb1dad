//! Glob Expansion Against the Real Filesystem
//!
//! Argv tokens are expanded immediately before dispatch or spawn. A token
//! without glob metacharacters passes through verbatim with no existence
//! check; a glob that matches nothing removes its argv slot. Results are
//! lexicographic, so expansion is deterministic for a fixed tree and cwd.

use std::path::Path;

use crate::ast::types::Token;

/// Check if a string contains glob metacharacters (`*`, `?`, `[...]`).
pub fn is_glob_pattern(s: &str) -> bool {
    s.contains('*') || s.contains('?') || s.contains('[')
}

/// Expand one pattern against `cwd`, yielding matched paths in
/// lexicographic order. Relative patterns yield cwd-relative results.
pub fn expand_glob(pattern: &str, cwd: &Path) -> Vec<String> {
    if !is_glob_pattern(pattern) {
        return vec![pattern.to_string()];
    }
    let absolute = Path::new(pattern).is_absolute();
    let full = if absolute {
        pattern.to_string()
    } else {
        cwd.join(pattern).to_string_lossy().into_owned()
    };
    let paths = match glob::glob(&full) {
        Ok(paths) => paths,
        // A malformed pattern is passed through untouched; the spawned
        // command reports the unmatched argument.
        Err(_) => return vec![pattern.to_string()],
    };
    let mut matches: Vec<String> = paths
        .flatten()
        .map(|entry| {
            if absolute {
                entry.to_string_lossy().into_owned()
            } else {
                entry
                    .strip_prefix(cwd)
                    .map(|rel| rel.to_string_lossy().into_owned())
                    .unwrap_or_else(|_| entry.to_string_lossy().into_owned())
            }
        })
        .collect();
    matches.sort();
    matches
}

/// Expand one argv token. Literals pass through untouched.
pub fn expand_token(token: &Token, cwd: &Path) -> Vec<String> {
    match token {
        Token::Literal(s) => vec![s.clone()],
        Token::Glob(pattern) => expand_glob(pattern, cwd),
    }
}

/// Expand a full argv, preserving order. The command name is never
/// expanded; a glob slot with no matches disappears.
pub fn expand_args(args: &[Token], cwd: &Path) -> Vec<String> {
    let mut result = Vec::new();
    let mut iter = args.iter();
    if let Some(first) = iter.next() {
        result.push(first.text().to_string());
    }
    for token in iter {
        result.extend(expand_token(token, cwd));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.txt", "a.txt", "c.rs"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/nested.txt"), "x").unwrap();
        dir
    }

    #[test]
    fn test_is_glob_pattern() {
        assert!(is_glob_pattern("*.txt"));
        assert!(is_glob_pattern("file?.c"));
        assert!(is_glob_pattern("[ab].c"));
        assert!(!is_glob_pattern("plain.txt"));
    }

    #[test]
    fn test_no_metachars_passthrough_without_existence_check() {
        let dir = setup();
        assert_eq!(
            expand_glob("no-such-file", dir.path()),
            vec!["no-such-file"]
        );
    }

    #[test]
    fn test_expand_sorted() {
        let dir = setup();
        assert_eq!(expand_glob("*.txt", dir.path()), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_expand_subdir() {
        let dir = setup();
        let expanded = expand_glob("sub/*.txt", dir.path());
        assert_eq!(expanded, vec![format!("sub{}nested.txt", std::path::MAIN_SEPARATOR)]);
    }

    #[test]
    fn test_expand_absolute() {
        let dir = setup();
        let pattern = format!("{}/*.rs", dir.path().display());
        let expanded = expand_glob(&pattern, Path::new("/"));
        assert_eq!(expanded.len(), 1);
        assert!(expanded[0].ends_with("c.rs"));
    }

    #[test]
    fn test_no_match_yields_empty() {
        let dir = setup();
        assert!(expand_glob("*.zip", dir.path()).is_empty());
    }

    #[test]
    fn test_expand_args_removes_empty_slot() {
        let dir = setup();
        let args = vec![
            Token::Literal("rm".to_string()),
            Token::Glob("*.zip".to_string()),
            Token::Literal("keep".to_string()),
        ];
        assert_eq!(expand_args(&args, dir.path()), vec!["rm", "keep"]);
    }

    #[test]
    fn test_expand_args_keeps_command_name() {
        let dir = setup();
        let args = vec![Token::Glob("*.txt".to_string())];
        // argv[0] is never expanded, even when marked as a glob
        assert_eq!(expand_args(&args, dir.path()), vec!["*.txt"]);
    }

    #[test]
    fn test_expand_args_concatenates_in_order() {
        let dir = setup();
        let args = vec![
            Token::Literal("cat".to_string()),
            Token::Glob("*.rs".to_string()),
            Token::Glob("*.txt".to_string()),
        ];
        assert_eq!(
            expand_args(&args, dir.path()),
            vec!["cat", "c.rs", "a.txt", "b.txt"]
        );
    }
}
