//! Binary-level tests for the `lakeload` command

#![allow(clippy::unwrap_used, clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn lakeload(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lakeload").unwrap();
    // No inherited credentials and no .env from the repository
    cmd.env_clear().current_dir(dir.path());
    cmd
}

#[test]
fn test_no_subcommand_exits_with_usage_error() {
    let dir = TempDir::new().unwrap();

    lakeload(&dir)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("A subcommand is required"));
}

#[test]
fn test_help_lists_stages() {
    let dir = TempDir::new().unwrap();

    lakeload(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("publish-secret"))
        .stdout(predicate::str::contains("reconcile"));
}

#[test]
fn test_etl_help_documents_no_run() {
    let dir = TempDir::new().unwrap();

    lakeload(&dir)
        .args(["etl", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-run"));
}

#[test]
fn test_missing_environment_fails_with_variable_name() {
    let dir = TempDir::new().unwrap();

    lakeload(&dir)
        .arg("run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("AWS_ACCESS_KEY_ID"));
}

#[test]
fn test_dotenv_file_is_read() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(".env"),
        "AWS_ACCESS_KEY_ID=AKIATEST\nAWS_SECRET_ACCESS_KEY=secret\n",
    )
    .unwrap();

    // The next missing variable is reported, so the file was loaded
    lakeload(&dir)
        .arg("deploy")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("AWS_DEFAULT_REGION"));
}

#[test]
fn test_markdown_help() {
    let dir = TempDir::new().unwrap();

    lakeload(&dir)
        .arg("--markdown-help")
        .assert()
        .success()
        .stdout(predicate::str::contains("lakeload"));
}

#[test]
fn test_dotenv_logging_settings_apply() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".env"), "LOG_FORMAT=json\n").unwrap();

    lakeload(&dir)
        .arg("deploy")
        .assert()
        .code(1)
        .stderr(predicate::str::contains(r#""level":"ERROR""#));
}
