use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("lector")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("read"))
        .stdout(predicate::str::contains("split"))
        .stdout(predicate::str::contains("summarize"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_read_help_shows_options() {
    cargo_bin_cmd!("lector")
        .args(["read", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--visible-chars"))
        .stdout(predicate::str::contains("--tier"));
}

#[test]
fn test_read_rejects_unknown_tier() {
    let dir = tempfile::tempdir().unwrap();

    cargo_bin_cmd!("lector")
        .env("LECTOR_HOME", dir.path())
        .args(["read", "-", "--tier", "gold"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown speech tier"));
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("lector")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1"));
}
