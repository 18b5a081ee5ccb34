//! Backup chain resolution
//!
//! A chain is one full backup followed by the incrementals built on it.
//! Only raw directory trees participate: archives are derived copies, and
//! the sync tool needs directories to diff against.

use crate::artifact::Artifact;
use crate::naming::ArtifactKind;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The base a new incremental backup diffs against: the latest full backup
/// plus every incremental created after it, in chain order.
#[derive(Debug, Clone)]
pub struct BaseChain {
    pub full: Artifact,
    pub diffs: Vec<Artifact>,
}

impl BaseChain {
    /// Chain members in restoration order, full first.
    pub fn members(&self) -> Vec<&Artifact> {
        let mut members = vec![&self.full];
        members.extend(self.diffs.iter());
        members
    }

    /// Absolute paths of the chain members, full first.
    pub fn member_paths(&self) -> Vec<PathBuf> {
        self.members().iter().map(|a| a.path.clone()).collect()
    }

    /// The most recent member, i.e. what a restore would end on.
    pub fn tail(&self) -> &Artifact {
        self.diffs.last().unwrap_or(&self.full)
    }
}

/// The most recent full backup among raw trees, if any.
pub fn find_latest_full(artifacts: &[Artifact]) -> Option<&Artifact> {
    artifacts
        .iter()
        .filter(|a| !a.archived() && a.kind() == ArtifactKind::Full)
        .max_by_key(|a| a.created_at())
}

/// The most recent raw-tree artifact overall, full or incremental.
pub fn find_chain_tail(artifacts: &[Artifact]) -> Option<&Artifact> {
    artifacts
        .iter()
        .filter(|a| !a.archived())
        .max_by_key(|a| a.created_at())
}

/// Resolve the base chain for an incremental backup at `location`.
///
/// Fails with [`Error::NoBaseAvailable`] when no full backup exists yet.
/// There is no fallback to a full backup: silently changing the backup kind
/// would break the documented contract of differential mode.
pub fn resolve_base(location: &Path, artifacts: &[Artifact]) -> Result<BaseChain> {
    let full = find_latest_full(artifacts)
        .cloned()
        .ok_or_else(|| Error::NoBaseAvailable {
            location: location.to_path_buf(),
        })?;

    let diffs: Vec<Artifact> = artifacts
        .iter()
        .filter(|a| {
            !a.archived()
                && a.kind() == ArtifactKind::Incremental
                && a.created_at() > full.created_at()
        })
        .cloned()
        .collect();

    debug!(
        "Resolved base chain: full {} + {} diff(s)",
        full.name.render(),
        diffs.len()
    );

    Ok(BaseChain { full, diffs })
}
