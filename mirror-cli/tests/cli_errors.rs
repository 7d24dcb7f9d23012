use std::process::Command;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;
use predicates::str::contains;

/// Nothing listens on port 1; connections are refused immediately.
const UNREACHABLE: &str = "http://127.0.0.1:1";

fn mirror_cmd(cwd: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mirror"));
    cmd.current_dir(cwd.path())
        .env_remove("MIRROR_TARGET_URL")
        .env_remove("MIRROR_TARGET_TOKEN")
        .env_remove("MIRROR_BATCH_SIZE")
        .env_remove("MIRROR_MAX_PARALLEL")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

fn archive_with_dashboard(dir: &TempDir) {
    dir.child("archive/dashboards").create_dir_all().expect("mkdir");
    dir.child("archive/dashboards/a.json")
        .write_str(r#"{"dashboard": {"uid": "a", "title": "A"}}"#)
        .expect("write dashboard");
    dir.child("archive/folders").create_dir_all().expect("mkdir");
}

#[test]
fn help_lists_commands() {
    let dir = TempDir::new().expect("tmp");
    mirror_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("sync").and(contains("plan")));
}

#[test]
fn unreachable_target_exits_one_without_report() {
    let dir = TempDir::new().expect("tmp");
    archive_with_dashboard(&dir);

    mirror_cmd(&dir)
        .args(["sync", "--target-url", UNREACHABLE, "--target-token", "t"])
        .assert()
        .code(1)
        .stderr(contains("inventory unavailable"));

    dir.child("outputs").assert(predicate::path::missing());
}

#[test]
fn missing_token_is_a_config_error() {
    let dir = TempDir::new().expect("tmp");
    archive_with_dashboard(&dir);

    mirror_cmd(&dir)
        .args(["sync", "--target-url", UNREACHABLE])
        .assert()
        .code(1)
        .stderr(contains("target.token"));
}

#[test]
fn token_is_read_from_environment() {
    let dir = TempDir::new().expect("tmp");
    archive_with_dashboard(&dir);

    mirror_cmd(&dir)
        .env("MIRROR_TARGET_URL", UNREACHABLE)
        .env("MIRROR_TARGET_TOKEN", "from-env")
        .arg("plan")
        .assert()
        .code(1)
        .stderr(contains("inventory unavailable"))
        .stderr(contains("from-env").not());
}

#[test]
fn missing_archive_is_reported() {
    let dir = TempDir::new().expect("tmp");

    mirror_cmd(&dir)
        .args(["sync", "--target-url", UNREACHABLE, "--target-token", "t"])
        .args(["--archive-dir", "nope"])
        .assert()
        .code(1)
        .stderr(contains("failed to open archive"));
}

#[test]
fn config_file_in_working_directory_is_used() {
    let dir = TempDir::new().expect("tmp");
    archive_with_dashboard(&dir);
    dir.child("mirror.yaml")
        .write_str("target:\n  url: http://127.0.0.1:1\n  token: from-file\nbatch_size: 0\n")
        .expect("write config");

    mirror_cmd(&dir)
        .arg("sync")
        .assert()
        .code(1)
        .stderr(contains("batch_size"));
}

#[test]
fn non_http_url_is_rejected() {
    let dir = TempDir::new().expect("tmp");
    archive_with_dashboard(&dir);

    mirror_cmd(&dir)
        .args(["plan", "--target-url", "ftp://x", "--target-token", "t"])
        .assert()
        .code(1)
        .stderr(contains("http://"));
}
