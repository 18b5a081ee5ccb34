//! rclone-backed remote transport

use super::RemoteTransport;
use crate::exec::Runner;
use crate::pipeline::Stage;
use crate::Result;
use std::path::Path;
use std::process::Command;
use tracing::info;

pub struct RcloneTransport {
    binary: String,
    runner: Runner,
}

impl RcloneTransport {
    pub fn new(binary: impl Into<String>, runner: Runner) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }

    fn command(&self) -> Command {
        Command::new(&self.binary)
    }
}

impl RemoteTransport for RcloneTransport {
    fn ensure_folder(&self, remote: &str) -> Result<()> {
        let exists = self
            .runner
            .run_ok(self.command().arg("lsd").arg(remote))?;
        if exists {
            return Ok(());
        }
        info!("Creating remote folder {remote}");
        self.runner
            .run(Stage::Uploading, self.command().arg("mkdir").arg(remote))
    }

    fn upload(&self, file: &Path, remote: &str) -> Result<()> {
        info!("Uploading {:?} to {remote}", file);
        self.runner.run(
            Stage::Uploading,
            self.command().arg("copy").arg(file).arg(remote),
        )
    }

    fn list(&self, remote: &str) -> Result<Vec<String>> {
        let stdout = self
            .runner
            .run_capture(Stage::CleaningRemote, self.command().arg("ls").arg(remote))?;
        Ok(parse_listing(&stdout))
    }

    fn delete(&self, remote: &str, object: &str) -> Result<()> {
        let path = format!("{remote}/{object}");
        info!("Deleting remote object {path}");
        self.runner
            .run(Stage::CleaningRemote, self.command().arg("delete").arg(path))
    }
}

/// `rclone ls` prints `<size> <name>` per line, size right-aligned.
fn parse_listing(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let _size = parts.next()?;
            parts.next().map(|name| name.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing() {
        let out = "  1048576 20260101_000000.7z\n      512 20260102_000000_diff.7z\n\n";
        assert_eq!(
            parse_listing(out),
            vec!["20260101_000000.7z", "20260102_000000_diff.7z"]
        );
    }

    #[test]
    fn test_parse_listing_empty() {
        assert!(parse_listing("").is_empty());
    }
}
