use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const LOCK_FILE: &str = ".init.lock";

/// Exclusive claim on creating the index in a directory. Removed on drop.
#[derive(Debug)]
pub struct InitLock {
    path: PathBuf,
}

impl InitLock {
    /// Returns `Ok(None)` when another creator already holds the lock.
    pub fn try_acquire(dir: &Path) -> std::io::Result<Option<Self>> {
        let path = dir.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                file.sync_all()?;
                Ok(Some(Self { path }))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for InitLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("failed to remove {}: {}", self.path.display(), e);
        }
    }
}
