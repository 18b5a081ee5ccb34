//! Age-based and keep-latest retention
//!
//! Planning is a pure function over a location's artifact listing, so a
//! dry run reports exactly what a real run would delete. Application is a
//! separate step and is the only destructive part.

use crate::artifact::{Artifact, RemoteArtifact};
use crate::naming::ArtifactKind;
use crate::{Error, Result};
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// Retention policy for one location. Derived from the CLI, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Delete artifacts older than the threshold, keeping chains intact.
    AgeThreshold { days: i64 },
    /// Keep only the single newest artifact, whatever its kind. May leave
    /// an orphaned incremental behind; that is the documented contract.
    KeepLatestOnly,
}

/// One artifact identity at a location: a raw tree and its archived copies
/// share a stem and are deleted all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StemEntry {
    pub kind: ArtifactKind,
    pub created_at: NaiveDateTime,
    pub stem: String,
    /// Local paths or remote object names backing this stem.
    pub targets: Vec<String>,
    pub bytes: Option<u64>,
}

/// The computed deletion set. Deterministic for a given listing and clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetentionPlan {
    pub delete: Vec<PlannedDeletion>,
    pub kept: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedDeletion {
    pub stem: String,
    pub kind: &'static str,
    pub targets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
}

impl RetentionPlan {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty()
    }
}

/// Group a local listing into stems (raw tree + archives per timestamp).
pub fn stems_from_local(artifacts: &[Artifact]) -> Vec<StemEntry> {
    let mut stems: Vec<StemEntry> = Vec::new();
    for artifact in artifacts {
        let target = artifact.path.to_string_lossy().into_owned();
        let bytes = artifact.disk_size();
        match stems
            .iter_mut()
            .find(|s| s.created_at == artifact.created_at())
        {
            Some(stem) => {
                stem.targets.push(target);
                stem.bytes = Some(stem.bytes.unwrap_or(0) + bytes);
            }
            None => stems.push(StemEntry {
                kind: artifact.kind(),
                created_at: artifact.created_at(),
                stem: artifact.name.stem(),
                targets: vec![target],
                bytes: Some(bytes),
            }),
        }
    }
    stems
}

/// Group a remote listing into stems.
pub fn stems_from_remote(artifacts: &[RemoteArtifact]) -> Vec<StemEntry> {
    let mut stems: Vec<StemEntry> = Vec::new();
    for artifact in artifacts {
        match stems
            .iter_mut()
            .find(|s| s.created_at == artifact.created_at())
        {
            Some(stem) => stem.targets.push(artifact.object.clone()),
            None => stems.push(StemEntry {
                kind: artifact.kind(),
                created_at: artifact.created_at(),
                stem: artifact.name.stem(),
                targets: vec![artifact.object.clone()],
                bytes: None,
            }),
        }
    }
    stems
}

/// Compute the deletion set for `entries` (sorted by creation time) under
/// `policy` as of `now`.
///
/// Age mode guarantees:
/// - an entry is eligible only when strictly older than the threshold;
/// - the newest entry overall is never deleted (it is the chain tail a
///   future incremental will diff against);
/// - a full backup survives while any surviving incremental chains from it,
///   and the most recent full survives unconditionally;
/// - deletion order is oldest first, with a full ordered after the expired
///   incrementals that depended on it.
pub fn plan(entries: &[StemEntry], policy: RetentionPolicy, now: NaiveDateTime) -> Result<RetentionPlan> {
    for pair in entries.windows(2) {
        if pair[0].created_at >= pair[1].created_at {
            return Err(Error::RetentionCompute(format!(
                "listing is not strictly ordered at {:?}",
                pair[1].stem
            )));
        }
    }

    let delete = match policy {
        RetentionPolicy::KeepLatestOnly => entries
            .iter()
            .take(entries.len().saturating_sub(1))
            .map(planned)
            .collect(),
        RetentionPolicy::AgeThreshold { days } => plan_by_age(entries, days, now),
    };

    Ok(RetentionPlan {
        kept: entries.len() - delete.len(),
        delete,
    })
}

fn plan_by_age(entries: &[StemEntry], days: i64, now: NaiveDateTime) -> Vec<PlannedDeletion> {
    let threshold = now - Duration::days(days);
    let expired = |e: &StemEntry| e.created_at < threshold;
    let tail_at = entries.last().map(|e| e.created_at);
    let latest_full_at = entries
        .iter()
        .filter(|e| e.kind == ArtifactKind::Full)
        .map(|e| e.created_at)
        .max();

    // Split into chains: each full starts one; incrementals before the
    // first full are orphans with no base left to protect.
    let mut delete = Vec::new();
    let mut chain_start = 0;
    let mut groups: Vec<&[StemEntry]> = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        if entry.kind == ArtifactKind::Full && i > chain_start {
            groups.push(&entries[chain_start..i]);
            chain_start = i;
        }
    }
    if chain_start < entries.len() {
        groups.push(&entries[chain_start..]);
    }

    for group in groups {
        let (full, diffs) = match group.first() {
            Some(first) if first.kind == ArtifactKind::Full => (Some(first), &group[1..]),
            _ => (None, group),
        };

        let mut expired_diffs = Vec::new();
        let mut survivor = false;
        for diff in diffs {
            if expired(diff) && Some(diff.created_at) != tail_at {
                expired_diffs.push(diff);
            } else {
                survivor = true;
            }
        }
        delete.extend(expired_diffs.into_iter().map(planned));

        if let Some(full) = full {
            let is_latest_full = Some(full.created_at) == latest_full_at;
            if expired(full) && !is_latest_full && !survivor && Some(full.created_at) != tail_at {
                delete.push(planned(full));
            }
        }
    }

    delete
}

fn planned(entry: &StemEntry) -> PlannedDeletion {
    PlannedDeletion {
        stem: entry.stem.clone(),
        kind: entry.kind.label(),
        targets: entry.targets.clone(),
        bytes: entry.bytes,
    }
}

/// Delete the planned local targets. Reports each deletion; in dry-run
/// nothing is touched.
pub fn apply_local(plan: &RetentionPlan, dry_run: bool) -> Result<()> {
    for deletion in &plan.delete {
        for target in &deletion.targets {
            let path = PathBuf::from(target);
            info!("Deleting {} backup {:?}", deletion.kind, path);
            if dry_run {
                continue;
            }
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
    }
    debug!("Local retention kept {} artifact(s)", plan.kept);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn entry(kind: ArtifactKind, created_at: NaiveDateTime) -> StemEntry {
        let stem = match kind {
            ArtifactKind::Full => created_at.format("%Y%m%d_%H%M%S").to_string(),
            ArtifactKind::Incremental => created_at.format("%Y%m%d_%H%M%S_diff").to_string(),
        };
        StemEntry {
            kind,
            created_at,
            targets: vec![format!("/backups/{stem}")],
            stem,
            bytes: None,
        }
    }

    fn stems_of(plan: &RetentionPlan) -> Vec<&str> {
        plan.delete.iter().map(|d| d.stem.as_str()).collect()
    }

    #[test]
    fn test_age_threshold_keeps_referenced_full() {
        // Full at day 1, diffs at day 2 and 3; clean after 1 day at day 4.
        // Only the day-2 diff is old enough and not the tail; the full is
        // still the base of the surviving day-3 diff.
        let entries = vec![
            entry(ArtifactKind::Full, at(1, 0)),
            entry(ArtifactKind::Incremental, at(2, 0)),
            entry(ArtifactKind::Incremental, at(3, 0)),
        ];
        let plan = plan(&entries, RetentionPolicy::AgeThreshold { days: 1 }, at(4, 0)).unwrap();
        assert_eq!(stems_of(&plan), vec!["20260302_000000_diff"]);
        assert_eq!(plan.kept, 2);
    }

    #[test]
    fn test_age_threshold_strict_comparison() {
        // Exactly N days old is not "older than N days".
        let entries = vec![
            entry(ArtifactKind::Full, at(1, 0)),
            entry(ArtifactKind::Full, at(3, 0)),
        ];
        let plan = plan(&entries, RetentionPolicy::AgeThreshold { days: 2 }, at(3, 0)).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_expired_chain_deletes_diffs_then_full() {
        let entries = vec![
            entry(ArtifactKind::Full, at(1, 0)),
            entry(ArtifactKind::Incremental, at(2, 0)),
            entry(ArtifactKind::Full, at(10, 0)),
            entry(ArtifactKind::Incremental, at(11, 0)),
        ];
        let plan = plan(
            &entries,
            RetentionPolicy::AgeThreshold { days: 3 },
            at(20, 0),
        )
        .unwrap();
        // Whole first chain expired: diff ordered before its full. The
        // second chain's full is the latest full and survives; its diff is
        // expired but is the chain tail.
        assert_eq!(
            stems_of(&plan),
            vec!["20260302_000000_diff", "20260301_000000"]
        );
    }

    #[test]
    fn test_latest_full_never_deleted() {
        let entries = vec![entry(ArtifactKind::Full, at(1, 0))];
        let plan = plan(
            &entries,
            RetentionPolicy::AgeThreshold { days: 1 },
            at(30, 0),
        )
        .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_orphan_diffs_are_deletable() {
        // Incrementals with no preceding full (e.g. after a keep-latest
        // cleanup) have no base to protect.
        let entries = vec![
            entry(ArtifactKind::Incremental, at(1, 0)),
            entry(ArtifactKind::Incremental, at(2, 0)),
            entry(ArtifactKind::Full, at(10, 0)),
        ];
        let plan = plan(
            &entries,
            RetentionPolicy::AgeThreshold { days: 3 },
            at(20, 0),
        )
        .unwrap();
        assert_eq!(
            stems_of(&plan),
            vec!["20260301_000000_diff", "20260302_000000_diff"]
        );
    }

    #[test]
    fn test_keep_latest_only_keeps_single_newest() {
        // Full(T0), diff(T1), diff(T2): only diff(T2) survives, even though
        // its base is gone afterwards. Documented trade-off.
        let entries = vec![
            entry(ArtifactKind::Full, at(1, 0)),
            entry(ArtifactKind::Incremental, at(2, 0)),
            entry(ArtifactKind::Incremental, at(3, 0)),
        ];
        let plan = plan(&entries, RetentionPolicy::KeepLatestOnly, at(3, 1)).unwrap();
        assert_eq!(
            stems_of(&plan),
            vec!["20260301_000000", "20260302_000000_diff"]
        );
        assert_eq!(plan.kept, 1);
    }

    #[test]
    fn test_keep_latest_only_on_empty_location() {
        let plan = plan(&[], RetentionPolicy::KeepLatestOnly, at(1, 0)).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.kept, 0);
    }

    #[test]
    fn test_dry_run_plan_is_deterministic() {
        let entries = vec![
            entry(ArtifactKind::Full, at(1, 0)),
            entry(ArtifactKind::Incremental, at(2, 0)),
            entry(ArtifactKind::Full, at(5, 0)),
        ];
        let now = at(9, 0);
        let first = plan(&entries, RetentionPolicy::AgeThreshold { days: 2 }, now).unwrap();
        let second = plan(&entries, RetentionPolicy::AgeThreshold { days: 2 }, now).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_unordered_listing_is_rejected() {
        let entries = vec![
            entry(ArtifactKind::Full, at(2, 0)),
            entry(ArtifactKind::Full, at(1, 0)),
        ];
        let err = plan(&entries, RetentionPolicy::KeepLatestOnly, at(3, 0)).unwrap_err();
        assert!(matches!(err, Error::RetentionCompute(_)));
    }

    #[test]
    fn test_surviving_diffs_always_have_a_base() {
        // Randomized chains and thresholds: after applying the plan, every
        // surviving incremental that had a full base still has it.
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..200 {
            let mut entries = Vec::new();
            let mut hour = 0u32;
            let mut day = 1u32;
            let n = rng.gen_range(1..12);
            for _ in 0..n {
                hour += 1;
                if hour >= 24 {
                    hour = 0;
                    day += 1;
                }
                let kind = if entries.is_empty() || rng.gen_bool(0.3) {
                    ArtifactKind::Full
                } else {
                    ArtifactKind::Incremental
                };
                entries.push(entry(kind, at(day, hour)));
                if rng.gen_bool(0.2) {
                    day += 1;
                }
            }

            let days = rng.gen_range(0..10);
            let now = at(day + rng.gen_range(0..10), hour);
            let plan = plan(&entries, RetentionPolicy::AgeThreshold { days }, now).unwrap();

            let deleted: Vec<&str> = plan.delete.iter().map(|d| d.stem.as_str()).collect();
            let survivors: Vec<&StemEntry> = entries
                .iter()
                .filter(|e| !deleted.contains(&e.stem.as_str()))
                .collect();

            for (i, survivor) in survivors.iter().enumerate() {
                if survivor.kind != ArtifactKind::Incremental {
                    continue;
                }
                // The nearest full preceding this diff is its base
                let base = entries
                    .iter()
                    .filter(|e| {
                        e.kind == ArtifactKind::Full && e.created_at < survivor.created_at
                    })
                    .last();
                let Some(base) = base else { continue };
                let base_survived = survivors[..i].iter().any(|e| e.stem == base.stem);
                assert!(
                    base_survived,
                    "diff {} survived without base {} (deleted: {:?})",
                    survivor.stem, base.stem, deleted
                );
            }
        }
    }

    #[test]
    fn test_apply_local_dry_run_touches_nothing() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let tree = temp_dir.path().join("20260301_000000");
        std::fs::create_dir(&tree).unwrap();

        let plan = RetentionPlan {
            delete: vec![PlannedDeletion {
                stem: "20260301_000000".to_string(),
                kind: "full",
                targets: vec![tree.to_string_lossy().into_owned()],
                bytes: None,
            }],
            kept: 0,
        };

        apply_local(&plan, true).unwrap();
        assert!(tree.exists());

        apply_local(&plan, false).unwrap();
        assert!(!tree.exists());
    }
}
