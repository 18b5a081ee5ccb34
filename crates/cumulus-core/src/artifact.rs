//! Artifact model and location scanning
//!
//! The filesystem listing is the only source of truth: no manifest database
//! is kept, so a location's chain state must always be reconstructable from
//! the names alone. The scanners therefore refuse ambiguous listings
//! (duplicate timestamps, damaged-looking names) instead of guessing.

use crate::naming::{ArtifactKind, ArtifactName};
use crate::{Error, Result};
use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// One backup unit at a local destination: a raw directory tree or an
/// archive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: ArtifactName,
    pub path: PathBuf,
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        self.name.kind
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.name.created_at
    }

    /// Whether this is an archive file rather than a raw tree.
    pub fn archived(&self) -> bool {
        self.name.format.is_some()
    }

    /// Bytes occupied on disk. Best effort; unreadable entries count as 0.
    pub fn disk_size(&self) -> u64 {
        WalkDir::new(&self.path)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.metadata().ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum()
    }
}

/// One backup archive on remote storage, known only by its object name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArtifact {
    pub name: ArtifactName,
    pub object: String,
}

impl RemoteArtifact {
    pub fn kind(&self) -> ArtifactKind {
        self.name.kind
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.name.created_at
    }
}

/// Scan a local destination for artifacts, sorted by creation time.
///
/// Dot-entries (the lock file, staging directories) are ignored. A name with
/// a timestamp stem but an unknown tail, or two artifacts of different kinds
/// sharing one timestamp, make the chain order undecidable and are fatal.
pub fn scan_local(dir: &Path) -> Result<Vec<Artifact>> {
    let mut artifacts = Vec::new();

    if !dir.is_dir() {
        return Ok(artifacts);
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let name_str = file_name.to_string_lossy();

        if name_str.starts_with('.') {
            continue;
        }

        let name = match ArtifactName::parse(&name_str) {
            Ok(Some(name)) => name,
            Ok(None) => continue,
            Err(Error::InvalidName(n)) => {
                return Err(Error::AmbiguousChainState {
                    location: dir.to_path_buf(),
                    detail: format!("unparseable artifact name {n:?}"),
                });
            }
            Err(e) => return Err(e),
        };

        debug!("Found artifact: {}", name.render());
        artifacts.push(Artifact {
            name,
            path: entry.path(),
        });
    }

    artifacts.sort_by_key(|a| (a.created_at(), a.archived()));
    check_timestamp_consistency(dir, &artifacts)?;
    Ok(artifacts)
}

/// Scan a remote object listing for backup archives.
///
/// Remote locations only ever hold archive files; raw-tree names or
/// unrelated objects in the listing are skipped.
pub fn scan_remote(location: &str, names: &[String]) -> Result<Vec<RemoteArtifact>> {
    let mut artifacts = Vec::new();

    for object in names {
        let name = match ArtifactName::parse(object) {
            Ok(Some(name)) if name.format.is_some() => name,
            _ => continue,
        };
        artifacts.push(RemoteArtifact {
            name,
            object: object.clone(),
        });
    }

    artifacts.sort_by_key(|a| a.created_at());
    for pair in artifacts.windows(2) {
        if pair[0].created_at() == pair[1].created_at() && pair[0].kind() != pair[1].kind() {
            return Err(Error::AmbiguousChainState {
                location: PathBuf::from(location),
                detail: format!(
                    "objects {:?} and {:?} share one timestamp",
                    pair[0].object, pair[1].object
                ),
            });
        }
    }
    Ok(artifacts)
}

/// A raw tree and its archived copy legitimately share a timestamp; two
/// artifacts of different kinds, or two raw trees, never can.
fn check_timestamp_consistency(dir: &Path, artifacts: &[Artifact]) -> Result<()> {
    for pair in artifacts.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.created_at() != b.created_at() {
            continue;
        }
        if a.kind() != b.kind() || (!a.archived() && !b.archived()) {
            return Err(Error::AmbiguousChainState {
                location: dir.to_path_buf(),
                detail: format!(
                    "artifacts {:?} and {:?} share one timestamp",
                    a.name.render(),
                    b.name.render()
                ),
            });
        }
    }
    Ok(())
}
