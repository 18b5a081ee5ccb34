//! rsync-backed sync driver

use super::SyncTool;
use crate::chain::BaseChain;
use crate::exec::{absolute, Runner};
use crate::pipeline::Stage;
use crate::Result;
use std::path::Path;
use std::process::Command;
use tracing::info;

pub struct RsyncTool {
    binary: String,
    runner: Runner,
}

impl RsyncTool {
    pub fn new(binary: impl Into<String>, runner: Runner) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }
}

impl SyncTool for RsyncTool {
    fn sync(&self, src: &Path, dest: &Path, base: Option<&BaseChain>) -> Result<()> {
        // A single file lands under its own basename, like `cp` would
        let dest = if src.is_file() {
            match src.file_name() {
                Some(name) => dest.join(name),
                None => dest.to_path_buf(),
            }
        } else {
            dest.to_path_buf()
        };

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-ah");

        // One --compare-dest per chain member, full first: files unchanged
        // anywhere in the chain are skipped
        if let Some(chain) = base {
            for member in chain.member_paths() {
                cmd.arg("--compare-dest").arg(absolute(&member));
            }
        }

        cmd.arg(src).arg(&dest);

        info!("Copying {:?} to {:?}", src, dest);
        self.runner.run(Stage::Syncing, &mut cmd)
    }
}
