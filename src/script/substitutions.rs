//! Substitution Engine
//!
//! Builds the default `%`-substitution table for a test and applies an
//! ordered substitution list to a composed script line by line. Order is
//! part of the contract: the `%%` guard comes first, its inverse last, and
//! colon-qualified keys precede the bare keys so `%s` cannot shadow them.

use std::path::Path;

use regex_lite::Regex;
use tracing::warn;

use crate::config::Test;

/// Ordered `(pattern, replacement)` pairs.
pub type SubstitutionList = Vec<(String, String)>;

const MARKER: &str = "#_MARKER_#";

/// Strip the drive colon and leading separator so the path can be embedded
/// in another file name.
pub fn colon_normalize_path(path: &str) -> String {
    #[cfg(windows)]
    {
        let forward = path.replace('\\', "/");
        match forward.split_once(':') {
            Some((drive, rest)) if drive.len() == 1 => format!("{}{}", drive, rest),
            _ => forward,
        }
    }
    #[cfg(not(windows))]
    {
        path.strip_prefix('/').unwrap_or(path).to_string()
    }
}

/// Default substitution table for `test`.
pub fn get_default_substitutions(
    test: &Test,
    temp_dir: &Path,
    temp_base: &Path,
    normalize_slashes: bool,
) -> SubstitutionList {
    let mut source_path = test.source_path().display().to_string();
    let mut source_dir = test
        .source_path()
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let mut temp_dir = temp_dir.display().to_string();
    let mut temp_base = temp_base.display().to_string();
    if normalize_slashes {
        for path in [
            &mut source_path,
            &mut source_dir,
            &mut temp_dir,
            &mut temp_base,
        ] {
            *path = path.replace('\\', "/");
        }
    }
    let temp_name = format!("{}.temp", temp_base);
    let base_name = Path::new(&temp_name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    // The marker hides %% while every other substitution runs.
    let mut list: SubstitutionList = vec![("%%".to_string(), MARKER.to_string())];
    list.extend(test.config().substitutions.iter().cloned());
    // Colon-qualified variants first: their keys contain the bare keys.
    for (pattern, replacement) in [
        ("%s:p", colon_normalize_path(&source_dir)),
        ("%s:t", colon_normalize_path(&temp_name)),
        ("%s:T", colon_normalize_path(&temp_dir)),
        ("%:s", colon_normalize_path(&source_path)),
        ("%:S", colon_normalize_path(&source_dir)),
    ] {
        list.push((pattern.to_string(), replacement));
    }
    for (pattern, replacement) in [
        ("%s", source_path),
        ("%S", source_dir.clone()),
        ("%P", source_dir),
        ("%basename_t", base_name),
        ("%t", temp_name),
        ("%T", temp_dir),
        (r"%\{pathseq\}", std::path::MAIN_SEPARATOR.to_string()),
        (MARKER, "%".to_string()),
    ] {
        list.push((pattern.to_string(), replacement));
    }
    list
}

/// Apply the substitutions to every line of `script`, in order. Each
/// pattern is a regex replaced across the whole line; replacements are
/// literal text.
pub fn apply_substitutions(script: &str, substitutions: &SubstitutionList) -> Vec<String> {
    let mut lines = Vec::new();
    for line in script.lines() {
        let mut current = line.to_string();
        for (pattern, replacement) in substitutions {
            let regex = match Regex::new(pattern) {
                Ok(regex) => regex,
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "skipping malformed substitution");
                    continue;
                }
            };
            let literal = replacement.replace('$', "$$");
            current = regex.replace_all(&current, literal.as_str()).into_owned();
        }
        lines.push(current);
    }
    lines
}
