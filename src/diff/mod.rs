//! Line-Oriented File Comparison
//!
//! Unified diff with three lines of context, optional whitespace and
//! trailing-CR filters, and binary-versus-text detection. Used by the
//! `diff` built-in and standalone. Exit codes: 0 identical, 1 different,
//! 2 unreadable input.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};
use similar::{ChangeTag, TextDiff};

/// Whitespace and mode filters for one comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffFlags {
    /// `--strip-trailing-cr`: drop one trailing `\r` per line.
    pub strip_trailing_cr: bool,
    /// `-w`: ignore all whitespace.
    pub ignore_all_space: bool,
    /// `-b`: ignore changes in the amount of whitespace.
    pub ignore_space_change: bool,
    /// `--binary`: force a byte-oriented comparison.
    pub binary: bool,
}

/// Outcome of comparing two files.
#[derive(Debug, Default)]
pub struct DiffOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl DiffOutcome {
    fn unreadable(path: &Path, error: &std::io::Error) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("open file {} error : {}\n", path.display(), error),
            exit_code: 2,
        }
    }
}

/// Compare two files under the given filters.
pub fn compare_files(lhs: &Path, rhs: &Path, flags: DiffFlags) -> DiffOutcome {
    let lhs_bytes = match fs::read(lhs) {
        Ok(bytes) => bytes,
        Err(e) => return DiffOutcome::unreadable(lhs, &e),
    };
    let rhs_bytes = match fs::read(rhs) {
        Ok(bytes) => bytes,
        Err(e) => return DiffOutcome::unreadable(rhs, &e),
    };
    let binary = flags.binary || is_binary_content(&lhs_bytes) || is_binary_content(&rhs_bytes);
    if binary {
        compare_binary(lhs, rhs, &lhs_bytes, &rhs_bytes)
    } else {
        compare_text(lhs, rhs, &lhs_bytes, &rhs_bytes, flags)
    }
}

/// Content-based binary detection: a NUL byte in the leading window or
/// invalid UTF-8 classifies the file as binary.
pub fn is_binary_content(content: &[u8]) -> bool {
    let probe = &content[..content.len().min(8192)];
    if probe.contains(&0) {
        return true;
    }
    match std::str::from_utf8(probe) {
        Ok(_) => false,
        // The window may cut a multi-byte sequence at its edge; only an
        // error before the tail counts.
        Err(e) => e.valid_up_to() + 4 < probe.len(),
    }
}

/// Apply the per-line filters before comparison.
pub fn filter_text_line(line: &str, flags: DiffFlags) -> String {
    let line = if flags.strip_trailing_cr {
        line.strip_suffix('\r').unwrap_or(line)
    } else {
        line
    };
    if flags.ignore_all_space {
        line.split_whitespace().collect::<Vec<_>>().join("")
    } else if flags.ignore_space_change {
        line.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        line.to_string()
    }
}

fn compare_text(
    lhs: &Path,
    rhs: &Path,
    lhs_bytes: &[u8],
    rhs_bytes: &[u8],
    flags: DiffFlags,
) -> DiffOutcome {
    let lhs_filtered = filter_content(&String::from_utf8_lossy(lhs_bytes), flags);
    let rhs_filtered = filter_content(&String::from_utf8_lossy(rhs_bytes), flags);
    if lhs_filtered == rhs_filtered {
        return DiffOutcome::default();
    }
    DiffOutcome {
        stdout: render_unified(lhs, rhs, &lhs_filtered, &rhs_filtered),
        stderr: String::new(),
        exit_code: 1,
    }
}

fn compare_binary(lhs: &Path, rhs: &Path, lhs_bytes: &[u8], rhs_bytes: &[u8]) -> DiffOutcome {
    if lhs_bytes == rhs_bytes {
        return DiffOutcome::default();
    }
    let lhs_text = String::from_utf8_lossy(lhs_bytes).into_owned();
    let rhs_text = String::from_utf8_lossy(rhs_bytes).into_owned();
    DiffOutcome {
        stdout: render_unified(lhs, rhs, &lhs_text, &rhs_text),
        stderr: String::new(),
        exit_code: 1,
    }
}

fn filter_content(content: &str, flags: DiffFlags) -> String {
    content
        .split('\n')
        .map(|line| filter_text_line(line, flags))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `--- lhs\tmtime` / `+++ rhs\tmtime` headers followed by unified hunks
/// with three lines of context.
fn render_unified(lhs: &Path, rhs: &Path, lhs_text: &str, rhs_text: &str) -> String {
    let mut output = String::new();
    output.push_str(&format!("--- {}\t{}\n", lhs.display(), mtime_stamp(lhs)));
    output.push_str(&format!("+++ {}\t{}\n", rhs.display(), mtime_stamp(rhs)));

    let diff = TextDiff::from_lines(lhs_text, rhs_text);
    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        output.push_str(&format!("{}\n", hunk.header()));
        for change in hunk.iter_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            output.push_str(sign);
            output.push_str(change.value());
            if !change.value().ends_with('\n') {
                output.push('\n');
                output.push_str("\\ No newline at end of file\n");
            }
        }
    }
    output
}

fn mtime_stamp(path: &Path) -> String {
    let mtime = fs::metadata(path).and_then(|meta| meta.modified());
    match mtime {
        Ok(time) => {
            let stamp: DateTime<Local> = time.into();
            stamp.format("%Y-%m-%d %H:%M:%S %z").to_string()
        }
        Err(_) => String::new(),
    }
}
