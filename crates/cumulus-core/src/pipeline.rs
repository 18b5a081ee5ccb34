//! Backup pipeline
//!
//! One run is a strictly sequential stage machine: resolve chain → sync →
//! dump → archive → upload → clean local → clean remote. Each stage's
//! output is the next stage's input, and a failure aborts the pipeline at
//! that stage without rolling back what already completed: a successful
//! sync with a failed archive step still leaves a restorable raw tree.
//!
//! The new artifact is written under a staging name and renamed into its
//! canonical name only on success, so a concurrent or later listing never
//! sees a half-written artifact.

use crate::artifact;
use crate::chain;
use crate::config::RunConfig;
use crate::lock::DestinationLock;
use crate::naming::{ArtifactKind, ArtifactName};
use crate::retention::{self, RetentionPlan, RetentionPolicy};
use crate::tools::{Archiver, DbDumper, RemoteTransport, SyncTool};
use crate::{Error, Result};
use chrono::{Local, NaiveDateTime, Timelike};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolvingChain,
    Syncing,
    DumpingDatabase,
    Archiving,
    Uploading,
    CleaningLocal,
    CleaningRemote,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::ResolvingChain => "chain resolution",
            Stage::Syncing => "sync",
            Stage::DumpingDatabase => "database dump",
            Stage::Archiving => "archive",
            Stage::Uploading => "upload",
            Stage::CleaningLocal => "local cleanup",
            Stage::CleaningRemote => "remote cleanup",
        };
        f.write_str(s)
    }
}

/// What a completed run produced. Paths are the canonical artifact
/// locations; under dry-run nothing was actually written to them.
#[derive(Debug)]
pub struct RunOutcome {
    pub artifact_dir: PathBuf,
    pub archive_file: Option<PathBuf>,
    pub local_plan: Option<RetentionPlan>,
    pub remote_plan: Option<RetentionPlan>,
    /// Cleanup failures. They never undo a successful backup; callers
    /// report them as partial success.
    pub cleanup_errors: Vec<String>,
}

impl RunOutcome {
    pub fn partial(&self) -> bool {
        !self.cleanup_errors.is_empty()
    }
}

pub struct Pipeline<'a> {
    config: &'a RunConfig,
    sync: &'a dyn SyncTool,
    archiver: &'a dyn Archiver,
    transport: &'a dyn RemoteTransport,
    dumper: &'a dyn DbDumper,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a RunConfig,
        sync: &'a dyn SyncTool,
        archiver: &'a dyn Archiver,
        transport: &'a dyn RemoteTransport,
        dumper: &'a dyn DbDumper,
    ) -> Self {
        Self {
            config,
            sync,
            archiver,
            transport,
            dumper,
        }
    }

    pub fn run(&self) -> Result<RunOutcome> {
        let cfg = self.config;
        let dest = &cfg.destination;

        if !dest.is_dir() {
            return Err(Error::Config(format!(
                "destination {dest:?} does not exist or is not a directory"
            )));
        }

        // Serialize runs against this destination. Dry runs mutate nothing
        // and take no lock.
        let _lock = if cfg.dry_run {
            None
        } else {
            Some(DestinationLock::acquire(dest)?)
        };

        // ResolvingChain: listing is the only source of truth
        let artifacts = artifact::scan_local(dest)?;
        let base = if cfg.incremental {
            Some(chain::resolve_base(dest, &artifacts)?)
        } else {
            None
        };
        if let Some(chain) = &base {
            info!(
                "Differential base: {} (+{} diff)",
                chain.full.name.render(),
                chain.diffs.len()
            );
        }

        let created_at = now_seconds();
        if artifacts.iter().any(|a| a.created_at() == created_at) {
            return Err(Error::AmbiguousChainState {
                location: dest.clone(),
                detail: format!(
                    "an artifact with timestamp {} already exists; \
                     runs less than a second apart cannot be ordered",
                    created_at.format(crate::naming::TIMESTAMP_FORMAT)
                ),
            });
        }

        let kind = if cfg.incremental {
            ArtifactKind::Incremental
        } else {
            ArtifactKind::Full
        };
        let name = ArtifactName::new(kind, created_at);
        let final_dir = dest.join(name.render());
        let staging_dir = dest.join(name.render_staging());
        info!("Local output folder: {:?}", final_dir);

        // Syncing: all sources become entries of the same artifact
        if !cfg.dry_run {
            fs::create_dir(&staging_dir)?;
        }
        for src in &cfg.sources {
            if !src.exists() {
                warn!("Source path {:?} doesn't exist", src);
                continue;
            }
            self.sync.sync(src, &staging_dir, base.as_ref())?;
        }

        if cfg.mysql {
            self.dumper.dump(&staging_dir)?;
        }

        // The raw tree is complete; rename makes it visible to scanners
        if !cfg.dry_run {
            fs::rename(&staging_dir, &final_dir)?;
        }
        info!("Backup {} complete", name.render());

        // Archiving
        let archive_file = if cfg.compress {
            let archive_name = name.archived(cfg.format);
            let final_archive = dest.join(archive_name.render());
            let staging_archive = dest.join(archive_name.render_staging());
            self.archiver
                .archive(&final_dir, &staging_archive, cfg.password.as_deref())?;
            if !cfg.dry_run {
                fs::rename(&staging_archive, &final_archive)?;
            }
            Some(final_archive)
        } else {
            None
        };

        // Uploading
        if let Some(remote) = &cfg.remote {
            self.transport.ensure_folder(remote)?;
            match &archive_file {
                Some(file) => self.transport.upload(file, remote)?,
                // Raw tree: upload under its artifact name so the remote
                // listing stays parseable
                None => {
                    let target = format!("{}/{}", remote, name.render());
                    self.transport.upload(&final_dir, &target)?;
                }
            }
        }

        let mut outcome = RunOutcome {
            artifact_dir: final_dir,
            archive_file,
            local_plan: None,
            remote_plan: None,
            cleanup_errors: Vec::new(),
        };

        // Cleanup stages never fail the backup that just succeeded
        if cfg.cleans_local() {
            match self.clean_local(outcome.archive_file.as_ref()) {
                Ok(plan) => outcome.local_plan = plan,
                Err(e) => {
                    error!("{} failed: {e}", Stage::CleaningLocal);
                    outcome
                        .cleanup_errors
                        .push(format!("{}: {e}", Stage::CleaningLocal));
                }
            }
        }

        if cfg.clean_remote_after.is_some() && cfg.remote.is_some() {
            match self.clean_remote() {
                Ok(plan) => outcome.remote_plan = Some(plan),
                Err(e) => {
                    error!("{} failed: {e}", Stage::CleaningRemote);
                    outcome
                        .cleanup_errors
                        .push(format!("{}: {e}", Stage::CleaningRemote));
                }
            }
        }

        Ok(outcome)
    }

    /// Local retention. An ephemeral destination is removed wholesale; a
    /// persistent one is pruned per policy. When a remote copy exists the
    /// local archive file of the new backup is dropped too: the remote
    /// copy is the durable one.
    fn clean_local(&self, archive_file: Option<&PathBuf>) -> Result<Option<RetentionPlan>> {
        let cfg = self.config;

        if cfg.ephemeral {
            info!("Removing temporary destination {:?}", cfg.destination);
            if !cfg.dry_run {
                fs::remove_dir_all(&cfg.destination)?;
            }
            return Ok(None);
        }

        if let (Some(file), Some(_)) = (archive_file, &cfg.remote) {
            info!("Removing local archive {:?} (remote copy kept)", file);
            if !cfg.dry_run {
                fs::remove_file(file)?;
            }
        }

        let policy = match (cfg.clean_all, cfg.clean_local_after) {
            (true, _) => RetentionPolicy::KeepLatestOnly,
            (false, Some(days)) => RetentionPolicy::AgeThreshold { days },
            (false, None) => return Ok(None),
        };

        let artifacts = artifact::scan_local(&cfg.destination)?;
        let stems = retention::stems_from_local(&artifacts);
        let plan = retention::plan(&stems, policy, now_seconds())?;

        if plan.is_empty() {
            info!("No local artifacts eligible for deletion");
        }
        retention::apply_local(&plan, cfg.dry_run)?;
        Ok(Some(plan))
    }

    fn clean_remote(&self) -> Result<RetentionPlan> {
        let cfg = self.config;
        let remote = cfg
            .remote
            .as_ref()
            .ok_or_else(|| Error::Config("remote cleanup requires --remote".to_string()))?;
        let days = cfg
            .clean_remote_after
            .ok_or_else(|| Error::Config("remote cleanup requires an age threshold".to_string()))?;

        let names = self.transport.list(remote)?;
        let artifacts = artifact::scan_remote(remote, &names)?;
        let stems = retention::stems_from_remote(&artifacts);
        let plan = retention::plan(&stems, RetentionPolicy::AgeThreshold { days }, now_seconds())?;

        if plan.is_empty() {
            info!("No remote objects eligible for deletion");
        }
        for deletion in &plan.delete {
            for object in &deletion.targets {
                info!("Deleting remote {} backup {remote}/{object}", deletion.kind);
                if !cfg.dry_run {
                    self.transport.delete(remote, object)?;
                }
            }
        }
        Ok(plan)
    }
}

/// Artifact timestamps have second resolution; truncate so equality
/// against parsed names is exact.
fn now_seconds() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}
