//! CLI integration tests. Only paths that never spawn external tools are
//! exercised: argument validation, chain-resolution failures, and dry runs.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cumulus() -> Command {
    Command::cargo_bin("cumulus").unwrap()
}

#[test]
fn test_cli_help() {
    cumulus()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Chain-aware directory backup"));
}

#[test]
fn test_cli_version() {
    cumulus()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cumulus"));
}

#[test]
fn test_src_is_required() {
    cumulus().assert().failure();
}

#[test]
fn test_mysql_conflicts_with_incremental() {
    let temp = TempDir::new().unwrap();
    cumulus()
        .arg("-s")
        .arg(temp.path())
        .arg("--mysql")
        .arg("-i")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_clean_remote_requires_remote() {
    let temp = TempDir::new().unwrap();
    cumulus()
        .arg("-s")
        .arg(temp.path())
        .arg("--clean_remote_after")
        .arg("7")
        .assert()
        .failure();
}

#[test]
fn test_incremental_against_empty_destination() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    let dst = temp.path().join("dst");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dst).unwrap();
    fs::write(src.join("file.txt"), b"data").unwrap();

    cumulus()
        .arg("-s")
        .arg(&src)
        .arg("-d")
        .arg(&dst)
        .arg("-i")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("full backup"));

    // Zero filesystem mutation
    assert_eq!(fs::read_dir(&dst).unwrap().count(), 0);
}

#[test]
fn test_noexec_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    let dst = temp.path().join("dst");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dst).unwrap();
    fs::write(src.join("file.txt"), b"data").unwrap();

    cumulus()
        .arg("-s")
        .arg(&src)
        .arg("-d")
        .arg(&dst)
        .arg("--noexec")
        .arg("--nocompress")
        .assert()
        .success();

    assert_eq!(fs::read_dir(&dst).unwrap().count(), 0);
}

#[test]
fn test_noexec_retention_report_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    let dst = temp.path().join("dst");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dst).unwrap();
    fs::write(src.join("file.txt"), b"data").unwrap();

    // An expired chain plus a survivor diff
    fs::create_dir(dst.join("20200101_000000")).unwrap();
    fs::create_dir(dst.join("20200102_000000_diff")).unwrap();
    fs::create_dir(dst.join("20200103_000000_diff")).unwrap();

    let run = || {
        let output = cumulus()
            .arg("-s")
            .arg(&src)
            .arg("-d")
            .arg(&dst)
            .arg("--noexec")
            .arg("--nocompress")
            .arg("--clean_local_after")
            .arg("30")
            .output()
            .unwrap();
        assert!(output.status.success());
        String::from_utf8(output.stdout).unwrap()
    };

    let first = run();
    let second = run();

    // Same deletion-set report both times, and nothing was deleted
    assert_eq!(first, second);
    assert!(first.contains("20200102_000000_diff"));
    assert_eq!(fs::read_dir(&dst).unwrap().count(), 3);
}
