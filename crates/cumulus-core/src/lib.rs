//! cumulus-core - chain-aware directory backups
//!
//! This library backs up source trees to a destination as full or
//! differential (incremental) artifacts, names them so the whole chain can
//! be reconstructed from a plain directory listing, and prunes old
//! artifacts by age without breaking an active chain. The heavy lifting
//! (copy/diff, compression, remote transfer, database dump) is delegated
//! to external tools behind narrow trait boundaries.

pub mod artifact;
pub mod chain;
pub mod config;
pub mod error;
pub mod exec;
pub mod lock;
pub mod naming;
pub mod pipeline;
pub mod retention;
pub mod tools;

pub use error::{Error, Result};
pub use naming::{ArchiveFormat, ArtifactKind, ArtifactName};
pub use pipeline::{Pipeline, RunOutcome, Stage};
