//! CLI integration tests
//!
//! Tests the console-link CLI using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;

fn console_link() -> Command {
    Command::cargo_bin("console-link")
        .expect("Failed to locate console-link binary - ensure it's built before running tests")
}

fn write_config(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_cli_help() {
    console_link()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("console-link"))
        .stdout(predicate::str::contains("console user"));
}

#[test]
fn test_cli_version() {
    console_link()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("console-link"));
}

#[test]
fn test_cli_shell_help() {
    console_link()
        .args(["shell", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shell command"));
}

#[test]
fn test_cli_select_input_source_help() {
    console_link()
        .args(["select-input-source", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--input-source-id"));
}

#[test]
fn test_cli_socket_path() {
    console_link()
        .args(["socket-path", "501", "--socket-root", "/tmp/console-link-test"])
        .assert()
        .success()
        .stdout(predicate::str::diff("/tmp/console-link-test/501/receiver\n"));
}

#[test]
fn test_cli_socket_path_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, "socket_root_dir = \"/srv/receivers\"\n");

    console_link()
        .arg("--config")
        .arg(&config)
        .args(["socket-path", "502"])
        .assert()
        .success()
        .stdout(predicate::str::diff("/srv/receivers/502/receiver\n"));
}

#[test]
fn test_cli_missing_config_fails() {
    console_link()
        .args(["--config", "/nonexistent/console-link.toml", "socket-path", "501"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_cli_oversized_shell_command_rejected() {
    console_link()
        .args(["shell", &"x".repeat(256)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("shell_command"));
}

#[test]
fn test_cli_oversized_selector_field_rejected() {
    let long = "m".repeat(256);
    console_link()
        .args(["select-input-source", "--language", "en", "--input-mode-id", &long])
        .assert()
        .failure()
        .stderr(predicate::str::contains("input_mode_id is too long"));
}

#[test]
fn test_cli_empty_selector_rejected() {
    console_link()
        .arg("select-input-source")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to select"));
}

#[test]
fn test_cli_shell_times_out_without_console_user() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        &dir,
        &format!(
            "socket_root_dir = {:?}\nconsole_device = {:?}\n",
            dir.path().join("sockets"),
            dir.path().join("no-console"),
        ),
    );

    console_link()
        .arg("--config")
        .arg(&config)
        .args(["shell", "echo hi", "--timeout", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Timed out waiting for a console user"));
}
