//! External collaborator boundaries
//!
//! The actual copy/diff, archiving, remote transfer, and database dump are
//! delegated to existing tools (rsync, 7z/zip, rclone, mysqldump). Each is
//! modeled as one narrow trait so the pipeline can be tested without
//! spawning real processes.

pub mod archiver;
pub mod mysqldump;
pub mod rclone;
pub mod rsync;

pub use archiver::CommandArchiver;
pub use mysqldump::MysqlDumper;
pub use rclone::RcloneTransport;
pub use rsync::RsyncTool;

use crate::chain::BaseChain;
use crate::Result;
use std::path::Path;

/// Copies one source tree into the artifact directory, diffing against a
/// base chain in incremental mode.
pub trait SyncTool {
    fn sync(&self, src: &Path, dest: &Path, base: Option<&BaseChain>) -> Result<()>;
}

/// Compresses (and optionally encrypts) a synced tree into a single
/// archive file at `dest`.
pub trait Archiver {
    fn archive(&self, tree: &Path, dest: &Path, password: Option<&str>) -> Result<()>;
}

/// Uploads artifacts and lists/deletes remote objects.
pub trait RemoteTransport {
    fn ensure_folder(&self, remote: &str) -> Result<()>;
    fn upload(&self, file: &Path, remote: &str) -> Result<()>;
    /// Object names at the remote folder.
    fn list(&self, remote: &str) -> Result<Vec<String>>;
    fn delete(&self, remote: &str, object: &str) -> Result<()>;
}

/// Dumps all databases into the artifact directory.
pub trait DbDumper {
    fn dump(&self, dest_dir: &Path) -> Result<()>;
}
