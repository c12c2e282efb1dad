//! Test Configuration
//!
//! Read-only projection of the configuration the execution core consumes,
//! plus the per-test paths. Loading configuration files is a front-end
//! concern and lives outside this crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;

#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Extra `(pattern, replacement)` pairs applied after the `%%` guard
    /// and before the built-in path substitutions.
    pub substitutions: Vec<(String, String)>,
    /// Environment handed to child processes, overriding the host's.
    pub environment: IndexMap<String, String>,
    pub pipefail: bool,
    pub is_windows: bool,
    /// Interpreter for external execution; `/bin/sh` when absent on POSIX,
    /// `cmd /c` when absent on Windows.
    pub bash_path: Option<PathBuf>,
    pub echo_all_commands: bool,
    pub use_valgrind: bool,
    pub valgrind_args: Vec<String>,
    /// Per-test timeout; zero disables supervision.
    pub max_individual_test_time: Duration,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            substitutions: Vec::new(),
            environment: IndexMap::new(),
            pipefail: true,
            is_windows: cfg!(windows),
            bash_path: None,
            echo_all_commands: false,
            use_valgrind: false,
            valgrind_args: Vec::new(),
            max_individual_test_time: Duration::ZERO,
        }
    }
}

/// A single test: where its source lives, where it executes, and how.
#[derive(Debug, Clone)]
pub struct Test {
    source_path: PathBuf,
    exec_path: PathBuf,
    config: TestConfig,
}

impl Test {
    pub fn new(
        source_path: impl Into<PathBuf>,
        exec_path: impl Into<PathBuf>,
        config: TestConfig,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            exec_path: exec_path.into(),
            config,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn exec_path(&self) -> &Path {
        &self.exec_path
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Temporary location, relative to the execution tree: the `Output`
    /// directory beside the exec path and the per-test base inside it.
    pub fn temp_paths(&self) -> (PathBuf, PathBuf) {
        let exec_dir = self
            .exec_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let exec_base = self
            .exec_path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("test"));
        let temp_dir = exec_dir.join("Output");
        let temp_base = temp_dir.join(exec_base);
        (temp_dir, temp_base)
    }
}
