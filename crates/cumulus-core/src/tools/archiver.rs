//! 7z/zip-backed archiver

use super::Archiver;
use crate::exec::{absolute, Runner};
use crate::naming::ArchiveFormat;
use crate::pipeline::Stage;
use crate::{Error, Result};
use std::path::Path;
use std::process::Command;
use tracing::info;

pub struct CommandArchiver {
    format: ArchiveFormat,
    binary: String,
    runner: Runner,
}

impl CommandArchiver {
    pub fn new(format: ArchiveFormat, binary: impl Into<String>, runner: Runner) -> Self {
        Self {
            format,
            binary: binary.into(),
            runner,
        }
    }
}

impl Archiver for CommandArchiver {
    /// Archives `tree` into `dest`. Runs from the tree's parent so entry
    /// paths inside the archive start at the tree name.
    fn archive(&self, tree: &Path, dest: &Path, password: Option<&str>) -> Result<()> {
        let parent = tree
            .parent()
            .ok_or_else(|| Error::Config(format!("tree {tree:?} has no parent directory")))?;
        let tree_name = tree
            .file_name()
            .ok_or_else(|| Error::Config(format!("tree {tree:?} has no name")))?;

        // The working directory changes, so the output path must survive it
        let dest_abs = absolute(dest);
        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(parent);

        match self.format {
            ArchiveFormat::SevenZ => {
                cmd.arg("a").arg("-r");
                if let Some(pw) = password {
                    // -mhe also encrypts the entry listing
                    cmd.arg(format!("-p{pw}")).arg("-mhe=on");
                }
                cmd.arg(&dest_abs).arg(tree_name);
            }
            ArchiveFormat::Zip => {
                cmd.arg("-r").arg("-9").arg("-y");
                if let Some(pw) = password {
                    cmd.arg("-e").arg("-P").arg(pw);
                }
                cmd.arg(&dest_abs).arg(tree_name);
            }
        }

        info!("Archiving {:?} to {:?}", tree, dest);
        self.runner.run(Stage::Archiving, &mut cmd)
    }
}
