//! cumulus - chain-aware directory backup to local or cloud storage
//!
//! Backs up one or more source trees as full or differential artifacts,
//! optionally archives them with 7z/zip, uploads them with rclone, and
//! prunes old backups by age on both sides.

use anyhow::Result;
use clap::Parser;
use cumulus_core::config::{Config, RunConfig};
use cumulus_core::tools::{CommandArchiver, MysqlDumper, RcloneTransport, RsyncTool};
use cumulus_core::{exec::Runner, ArchiveFormat, Pipeline, RunOutcome};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Back up folders to a local or cloud destination, with full/differential
/// chains and age-based cleanup.
#[derive(Parser)]
#[command(name = "cumulus")]
#[command(author, version, about = "Chain-aware directory backup to local or cloud storage", long_about = None)]
struct Cli {
    /// Source folder(s). Can be specified multiple times
    #[arg(short = 's', long = "src", required = true, value_name = "path")]
    src: Vec<PathBuf>,

    /// Remote path (<rclone remote name>:<remote folder>) (ex. gdrive:backup)
    #[arg(short = 'r', long, value_name = "<rclone path>")]
    remote: Option<String>,

    /// Output folder, a temporary one is created if omitted
    #[arg(short = 'd', long, value_name = "folder")]
    dst: Option<PathBuf>,

    /// Backup differential from the latest full+diff backup
    #[arg(short = 'i', long)]
    incremental: bool,

    /// If specified, encrypt the archive with the given password
    #[arg(short = 'P', long, value_name = "password")]
    password: Option<String>,

    /// Use zip instead of the default 7z
    #[arg(short = 'z', long)]
    zip: bool,

    /// Skip compression; keep the backup as a raw folder
    #[arg(long)]
    nocompress: bool,

    /// Save all MySQL databases too (may require root privilege).
    /// Has no differential mode, so it conflicts with -i
    #[arg(long, conflicts_with = "incremental")]
    mysql: bool,

    /// Dry run: report every action, perform none
    #[arg(short = 'n', long)]
    noexec: bool,

    /// Verbose mode
    #[arg(short = 'v', long, conflicts_with = "quiet")]
    verbose: bool,

    /// Quiet mode
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Delete local backups older than the specified days
    #[arg(long = "clean_local_after", value_name = "days")]
    clean_local_after: Option<i64>,

    /// Delete everything but the latest archive (local only)
    #[arg(long)]
    cleanall: bool,

    /// Delete remote files older than the specified days
    #[arg(long = "clean_remote_after", value_name = "days", requires = "remote")]
    clean_remote_after: Option<i64>,
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("warn")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    match run() {
        Ok(outcome) => {
            if outcome.partial() {
                for e in &outcome.cleanup_errors {
                    error!("{e}");
                }
                // Backup portion succeeded; only cleanup failed
                process::exit(5);
            }
            process::exit(0);
        }
        Err(e) => {
            error!("{e}");
            process::exit(exit_code(&e));
        }
    }
}

fn run() -> Result<RunOutcome> {
    let cli = Cli::parse();

    // Dry runs report everything they would do
    setup_logging(cli.verbose || cli.noexec, cli.quiet);

    let file_config = Config::load_or_default();
    let runner = Runner::new(cli.noexec);

    let (destination, ephemeral) = match cli.dst {
        Some(dst) => (dst, false),
        None => {
            let dir = tempfile::Builder::new()
                .prefix("cumulus-")
                .tempdir()?
                .into_path();
            info!("Created temporary folder {:?}", dir);
            (dir, true)
        }
    };

    let config = RunConfig {
        sources: cli.src,
        destination,
        ephemeral,
        remote: cli.remote.or(file_config.defaults.remote),
        incremental: cli.incremental,
        password: cli.password,
        format: if cli.zip {
            ArchiveFormat::Zip
        } else {
            ArchiveFormat::SevenZ
        },
        compress: !cli.nocompress,
        mysql: cli.mysql,
        dry_run: cli.noexec,
        clean_local_after: cli.clean_local_after,
        clean_all: cli.cleanall,
        clean_remote_after: cli.clean_remote_after,
        tools: file_config.tools,
    };

    if config.clean_remote_after.is_some() && config.remote.is_none() {
        warn!("--clean_remote_after has no effect without --remote");
    }

    let sync = RsyncTool::new(config.tools.rsync.as_str(), runner);
    let archiver_binary = match config.format {
        ArchiveFormat::SevenZ => config.tools.seven_zip.as_str(),
        ArchiveFormat::Zip => config.tools.zip.as_str(),
    };
    let archiver = CommandArchiver::new(config.format, archiver_binary, runner);
    let transport = RcloneTransport::new(config.tools.rclone.as_str(), runner);
    let dumper = MysqlDumper::new(config.tools.mysqldump.as_str(), runner);

    let outcome = Pipeline::new(&config, &sync, &archiver, &transport, &dumper).run()?;

    if config.dry_run {
        print_plans(&outcome)?;
    }
    info!("Backup finished: {:?}", outcome.artifact_dir);
    Ok(outcome)
}

/// Machine-readable deletion plan on stdout, for dry-run automation.
fn print_plans(outcome: &RunOutcome) -> Result<()> {
    if let Some(plan) = &outcome.local_plan {
        println!("local: {}", serde_json::to_string_pretty(plan)?);
    }
    if let Some(plan) = &outcome.remote_plan {
        println!("remote: {}", serde_json::to_string_pretty(plan)?);
    }
    Ok(())
}

/// Exit codes:
/// - 0: success
/// - 2: chain resolution failure (no base, ambiguous chain, locked)
/// - 3: configuration error
/// - 4: external tool failure
/// - 5: partial success (backup ok, cleanup failed)
/// - 1: anything else
fn exit_code(err: &anyhow::Error) -> i32 {
    use cumulus_core::Error;

    match err.downcast_ref::<Error>() {
        Some(Error::NoBaseAvailable { .. })
        | Some(Error::AmbiguousChainState { .. })
        | Some(Error::InvalidName(_))
        | Some(Error::LockHeld { .. }) => 2,
        Some(Error::Config(_)) => 3,
        Some(Error::ExternalToolFailure { .. }) => 4,
        Some(Error::RetentionCompute(_)) => 5,
        _ => 1,
    }
}
