//! Advisory destination locking
//!
//! Two concurrent runs against one destination would each scan a listing
//! the other is mutating; a lock file at the destination root serializes
//! them. The lock is advisory and best-effort released on drop.

use crate::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lock file name at the destination root. Dot-prefixed so the artifact
/// scanner never sees it.
pub const LOCK_FILE: &str = ".cumulus.lock";

#[derive(Debug)]
pub struct DestinationLock {
    path: PathBuf,
}

impl DestinationLock {
    /// Create the lock file, failing if another run already holds it.
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                debug!("Acquired destination lock {:?}", path);
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(Error::LockHeld { path }),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for DestinationLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
