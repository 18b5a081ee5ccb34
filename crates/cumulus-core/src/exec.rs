//! External command execution
//!
//! All external tools run through [`Runner`], which echoes the full command
//! line and honors dry-run: destructive commands are skipped, read-only
//! listing commands still execute so a dry run can report a real plan.

use crate::pipeline::Stage;
use crate::{Error, Result};
use std::process::{Command, Stdio};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct Runner {
    pub dry_run: bool,
}

impl Runner {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Run a command to completion; non-zero exit is a stage failure.
    /// Skipped entirely under dry-run.
    pub fn run(&self, stage: Stage, cmd: &mut Command) -> Result<()> {
        let rendered = render(cmd);
        info!("{rendered}");

        if self.dry_run {
            return Ok(());
        }

        let status = cmd.status()?;
        if !status.success() {
            return Err(Error::ExternalToolFailure {
                stage,
                command: rendered,
                code: status.code(),
            });
        }
        Ok(())
    }

    /// Like [`Runner::run`] but a non-zero exit is an answer, not an error.
    /// Used for existence probes (`rclone lsd`). Dry-run reports success.
    pub fn run_ok(&self, cmd: &mut Command) -> Result<bool> {
        let rendered = render(cmd);
        debug!("{rendered}");

        if self.dry_run {
            return Ok(true);
        }

        let status = cmd.stdout(Stdio::null()).stderr(Stdio::null()).status()?;
        Ok(status.success())
    }

    /// Run a read-only command and capture stdout. Always executes, even in
    /// dry-run: the retention plan must be computed from a real listing.
    pub fn run_capture(&self, stage: Stage, cmd: &mut Command) -> Result<String> {
        let rendered = render(cmd);
        debug!("{rendered}");

        let output = cmd.stdout(Stdio::piped()).output()?;
        if !output.status.success() {
            return Err(Error::ExternalToolFailure {
                stage,
                command: rendered,
                code: output.status.code(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Resolve a path against the current directory without touching the
/// filesystem. Tools that change their working directory need arguments
/// that stay valid after the change.
pub(crate) fn absolute(path: &std::path::Path) -> std::path::PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn render(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}
