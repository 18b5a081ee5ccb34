//! Canonical artifact naming
//!
//! Backup artifacts are identified purely by their file or directory name:
//! `YYYYMMDD_HHMMSS` for a full raw tree, with an `_diff` suffix for
//! incrementals and a `.7z`/`.zip` extension for archived copies. The name
//! round-trips to `{kind, created_at, format}` without any external index,
//! so the whole chain state can be rebuilt from a plain directory listing.

use crate::{Error, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp layout shared by every artifact name.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Prefix for in-progress artifacts. Entries carrying it are renamed into
/// their final name only once their terminal stage succeeds, and are
/// invisible to the chain scanner until then.
pub const STAGING_PREFIX: &str = ".partial-";

const DIFF_SUFFIX: &str = "_diff";
const STEM_LEN: usize = 15; // YYYYMMDD_HHMMSS

/// Kind of backup a name describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    Full,
    Incremental,
}

impl ArtifactKind {
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Full => "full",
            ArtifactKind::Incremental => "diff",
        }
    }
}

/// Archive container format for compressed artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveFormat {
    SevenZ,
    Zip,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::SevenZ => "7z",
            ArchiveFormat::Zip => "zip",
        }
    }
}

/// A parsed artifact name. `format` is `None` for raw directory trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub kind: ArtifactKind,
    pub created_at: NaiveDateTime,
    pub format: Option<ArchiveFormat>,
}

impl ArtifactName {
    pub fn new(kind: ArtifactKind, created_at: NaiveDateTime) -> Self {
        Self {
            kind,
            created_at,
            format: None,
        }
    }

    /// The same artifact identity, as an archive file name.
    pub fn archived(&self, format: ArchiveFormat) -> Self {
        Self {
            format: Some(format),
            ..self.clone()
        }
    }

    /// Timestamp stem shared by a raw tree and its archived copies.
    pub fn stem(&self) -> String {
        let mut s = self.created_at.format(TIMESTAMP_FORMAT).to_string();
        if self.kind == ArtifactKind::Incremental {
            s.push_str(DIFF_SUFFIX);
        }
        s
    }

    /// Canonical file or directory name.
    pub fn render(&self) -> String {
        let mut s = self.stem();
        if let Some(format) = self.format {
            s.push('.');
            s.push_str(format.extension());
        }
        s
    }

    /// Staging name used while the artifact is being written.
    pub fn render_staging(&self) -> String {
        format!("{}{}", STAGING_PREFIX, self.render())
    }

    /// Parse a directory entry name.
    ///
    /// Returns `Ok(None)` for names that are not artifacts at all (lock
    /// files, staging entries, unrelated files). Names that carry a valid
    /// timestamp stem but an unrecognized tail are an error: the scanner
    /// must not silently skip something that looks like a damaged artifact.
    pub fn parse(name: &str) -> Result<Option<Self>> {
        if !has_timestamp_stem(name) {
            return Ok(None);
        }

        let created_at = NaiveDateTime::parse_from_str(&name[..STEM_LEN], TIMESTAMP_FORMAT)
            .map_err(|_| Error::InvalidName(name.to_string()))?;

        let (kind, rest) = match name[STEM_LEN..].strip_prefix(DIFF_SUFFIX) {
            Some(rest) => (ArtifactKind::Incremental, rest),
            None => (ArtifactKind::Full, &name[STEM_LEN..]),
        };

        let format = match rest {
            "" => None,
            ".7z" => Some(ArchiveFormat::SevenZ),
            ".zip" => Some(ArchiveFormat::Zip),
            _ => return Err(Error::InvalidName(name.to_string())),
        };

        Ok(Some(Self {
            kind,
            created_at,
            format,
        }))
    }
}

fn has_timestamp_stem(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.len() < STEM_LEN {
        return false;
    }
    bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[8] == b'_'
        && bytes[9..STEM_LEN].iter().all(u8::is_ascii_digit)
}
