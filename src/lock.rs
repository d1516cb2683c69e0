//! Advisory lock serializing whole tool invocations.
//!
//! Two concurrent invocations would race on the manifest file and the
//! staging directory. The lock queues them instead: acquisition blocks
//! until the holder exits. Per-version build isolation inside one
//! invocation is handled structurally by the generated Makefile, not here.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

pub const LOCK_FILENAME: &str = "driver-builder.lock";

/// RAII guard: exclusively locked while alive, lock file removed on drop.
#[derive(Debug)]
pub struct InvocationLock {
    _file: File,
    path: PathBuf,
}

impl InvocationLock {
    /// Block until the exclusive lock under `dir` is acquired.
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILENAME);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("creating lock file '{}'", path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("acquiring invocation lock '{}'", path.display()))?;
        Ok(Self { _file: file, path })
    }
}

impl Drop for InvocationLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
