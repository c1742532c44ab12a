//! Throwaway shell scripts to use as child processes.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::TempDir;

/// Interpreter the scripts are handed to.
pub const SH: &str = "/bin/sh";

/// A `/bin/sh` script living in its own temp dir.
///
/// Run it as `[SH, script.path()]` rather than executing the file itself:
/// a freshly written file can still be open for writing in a sibling
/// test's forked child, and `execve` on it then fails with `ETXTBSY`.
///
/// The directory (and the script) is removed when this is dropped.
pub struct Script {
    _dir: TempDir,
    path: PathBuf,
}

impl Script {
    pub fn new(body: &str) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("child.sh");
        fs::write(&path, format!("{body}\n"))?;
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
