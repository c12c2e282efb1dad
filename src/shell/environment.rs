//! Shell Environment
//!
//! Per-evaluation working directory and environment map. One instance is
//! exclusively owned by an evaluation tree; child processes receive copies.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

#[derive(Debug, Clone)]
pub struct ShellEnvironment {
    cwd: PathBuf,
    env: IndexMap<String, String>,
}

impl ShellEnvironment {
    pub fn new(cwd: impl Into<PathBuf>, env: IndexMap<String, String>) -> Self {
        Self {
            cwd: cwd.into(),
            env,
        }
    }

    /// Build an environment from the host process environment overridden by
    /// the given map.
    pub fn from_host(cwd: impl Into<PathBuf>, overrides: &IndexMap<String, String>) -> Self {
        let mut env: IndexMap<String, String> = std::env::vars().collect();
        for (key, value) in overrides {
            env.insert(key.clone(), value.clone());
        }
        Self::new(cwd, env)
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn env(&self) -> &IndexMap<String, String> {
        &self.env
    }

    /// Change the working directory. Relative paths are resolved against the
    /// current cwd and canonicalized; when canonicalization fails the lexical
    /// join is kept. `cd` always succeeds, and later spawns surface a missing
    /// directory.
    pub fn set_cwd(&mut self, dir: impl AsRef<Path>) {
        let dir = dir.as_ref();
        if dir.is_absolute() {
            self.cwd = dir.to_path_buf();
        } else {
            let joined = self.cwd.join(dir);
            self.cwd = fs::canonicalize(&joined).unwrap_or(joined);
        }
    }

    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    /// Join a path against the cwd unless it is already absolute.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}
