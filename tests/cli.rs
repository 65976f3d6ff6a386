// Command-line surface of the `alist-upload` binary. Nothing here reaches
// a server: every case fails or exits before login.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cmd(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("alist-upload").unwrap();
    cmd.current_dir(workdir.path())
        .env_remove("ALIST_HOST")
        .env_remove("ALIST_USERNAME")
        .env_remove("ALIST_PASSWORD")
        .env_remove("ALIST_CONCURRENCY")
        .env_remove("ALIST_REQUEST_TIMEOUT")
        .env_remove("ALIST_JOIN_TIMEOUT");
    cmd
}

fn empty_config(workdir: &TempDir) -> String {
    let path = workdir.path().join("config.toml");
    std::fs::write(&path, "").unwrap();
    path.display().to_string()
}

#[test]
fn help_lists_the_three_modes() {
    let tmp = TempDir::new().unwrap();
    cmd(&tmp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("zip"))
        .stdout(predicate::str::contains("raw"))
        .stdout(predicate::str::contains("generic"));
}

#[test]
fn a_mode_is_required() {
    let tmp = TempDir::new().unwrap();
    cmd(&tmp).assert().failure();
}

#[test]
fn missing_host_fails_before_login() {
    let tmp = TempDir::new().unwrap();
    let config = empty_config(&tmp);
    cmd(&tmp)
        .args(["--config", &config, "raw"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no host configured"));
}

#[test]
fn explicit_config_file_must_exist() {
    let tmp = TempDir::new().unwrap();
    cmd(&tmp)
        .args(["--config", "does-not-exist.toml", "zip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.toml"));
}

#[test]
fn zero_concurrency_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = empty_config(&tmp);
    cmd(&tmp)
        .args(["--config", &config, "--host", "drive.example", "-j", "0", "zip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency must be at least 1"));
}

#[test]
fn unknown_timeout_action_is_rejected_by_the_parser() {
    let tmp = TempDir::new().unwrap();
    cmd(&tmp)
        .args(["--on-timeout", "explode", "zip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("explode"));
}
