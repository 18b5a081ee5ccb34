//! mysqldump-backed database dumper

use super::DbDumper;
use crate::exec::Runner;
use crate::pipeline::Stage;
use crate::Result;
use std::path::Path;
use std::process::Command;
use tracing::info;

const DUMP_FILE: &str = "mysqldump_all_database.sql";

pub struct MysqlDumper {
    binary: String,
    runner: Runner,
}

impl MysqlDumper {
    pub fn new(binary: impl Into<String>, runner: Runner) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }
}

impl DbDumper for MysqlDumper {
    fn dump(&self, dest_dir: &Path) -> Result<()> {
        let dest_file = dest_dir.join(DUMP_FILE);
        info!("Dumping all MySQL databases to {:?}", dest_file);

        let mut cmd = Command::new(&self.binary);
        cmd.arg("--all-databases")
            .arg("-C")
            .arg("--result-file")
            .arg(&dest_file);

        self.runner.run(Stage::DumpingDatabase, &mut cmd)
    }
}
