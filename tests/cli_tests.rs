//! CLI integration tests
//!
//! Drives the built binary with assert_cmd.

mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

use common::{invalid_config_fixture, valid_config_fixture};

fn progress_cmd() -> Command {
    let mut cmd = Command::cargo_bin("rebels-progress").unwrap();
    cmd.env_remove("REBELS_CONFIG")
        .env_remove("REBELS_STORE_PATH")
        .env_remove("REBELS_LOG_FILE");
    cmd
}

// ─────────────────────────────────────────────────────────────────
// Help and Version
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_help() {
    progress_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("ranks"))
        .stdout(predicate::str::contains("leaderboard"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_command() {
    progress_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rebels-progress"))
        .stdout(predicate::str::contains("Build Information"));
}

#[test]
fn test_version_flag() {
    progress_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rebels-progress"));
}

#[test]
fn test_unknown_command() {
    progress_cmd()
        .arg("promote-everyone")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_missing_subcommand() {
    progress_cmd().assert().failure();
}

// ─────────────────────────────────────────────────────────────────
// Config Command
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_config_show_fixture() {
    progress_cmd()
        .args(["config", "show", "--config"])
        .arg(valid_config_fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("[progression]"))
        .stdout(predicate::str::contains("[[ranks]]"))
        .stdout(predicate::str::contains("Grimward"));
}

#[test]
fn test_config_validate_fixture() {
    progress_cmd()
        .args(["config", "validate", "--config"])
        .arg(valid_config_fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("3 ranks, 2 schools"));
}

#[test]
fn test_config_validate_rejects_unordered_ranks() {
    progress_cmd()
        .args(["config", "validate", "--config"])
        .arg(invalid_config_fixture())
        .assert()
        .failure()
        .code(10)
        .stderr(predicate::str::contains("E102"));
}

#[test]
fn test_config_validate_missing_file() {
    progress_cmd()
        .args(["config", "validate", "--config", "/nonexistent/progress.toml"])
        .assert()
        .failure()
        .code(10)
        .stderr(predicate::str::contains("E100"));
}

#[test]
fn test_config_init_then_validate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("progress.toml");

    progress_cmd()
        .args(["config", "init", "--path"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration file created"));

    progress_cmd()
        .args(["config", "validate", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("9 ranks, 3 schools"));

    progress_cmd()
        .args(["config", "init", "--path"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

// ─────────────────────────────────────────────────────────────────
// Ranks and Leaderboard
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_ranks_lists_fixture_table() {
    progress_cmd()
        .args(["ranks", "--config"])
        .arg(valid_config_fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("Wretch"))
        .stdout(predicate::str::contains("Ember"))
        .stdout(predicate::str::contains("Seeker"));
}

#[test]
fn test_leaderboard_empty_store() {
    progress_cmd()
        .args(["leaderboard", "--config"])
        .arg(valid_config_fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("No members yet."));
}

// ─────────────────────────────────────────────────────────────────
// Serve
// ─────────────────────────────────────────────────────────────────

fn responses(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn by_request<'a>(responses: &'a [Value], id: &str) -> &'a Value {
    responses
        .iter()
        .find(|r| r["request_id"] == id)
        .unwrap_or_else(|| panic!("no response for request {}", id))
}

#[test]
fn test_serve_answers_each_line() {
    let input = [
        r#"{"request_id":"start","caller":{"member_id":"42","display_name":"Ava"},"command":"study_start"}"#,
        r#"{"request_id":"grant","caller":{"member_id":"42","display_name":"Ava"},"command":"add_points","member_id":"7","delta":5}"#,
        r#"{"request_id":"ranks","caller":{"member_id":"42","display_name":"Ava"},"command":"leaderboard"}"#,
        "",
        "this is not json",
    ]
    .join("\n");

    let output = progress_cmd()
        .args(["serve", "--config"])
        .arg(valid_config_fixture())
        .write_stdin(input)
        .output()
        .unwrap();
    assert!(output.status.success());

    let responses = responses(&output.stdout);
    assert_eq!(responses.len(), 4);

    let start = by_request(&responses, "start");
    assert_eq!(start["ok"], true);
    assert_eq!(start["result"]["kind"], "session_started");

    let grant = by_request(&responses, "grant");
    assert_eq!(grant["ok"], false);
    assert_eq!(grant["error"]["kind"], "permission_denied");

    assert_eq!(by_request(&responses, "ranks")["result"]["kind"], "leaderboard");

    let malformed = responses
        .iter()
        .find(|r| r["request_id"].is_null())
        .unwrap();
    assert_eq!(malformed["error"]["code"], "E305");
}

#[test]
fn test_serve_with_file_store_feeds_leaderboard() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("progress.json");
    let input = r#"{"caller":{"member_id":"1","display_name":"Kai","privileged":true},"command":"study_start","member_id":"7","display_name":"Mira"}"#;

    progress_cmd()
        .args(["serve", "--config"])
        .arg(valid_config_fixture())
        .env("REBELS_STORE_PATH", &store)
        .write_stdin(input)
        .assert()
        .success();

    progress_cmd()
        .args(["leaderboard", "--config"])
        .arg(valid_config_fixture())
        .env("REBELS_STORE_PATH", &store)
        .assert()
        .success()
        .stdout(predicate::str::contains("Mira"))
        .stdout(predicate::str::contains("Wretch"));
}

#[test]
fn test_serve_with_missing_config() {
    progress_cmd()
        .args(["serve", "--config", "/nonexistent/progress.toml"])
        .write_stdin("")
        .assert()
        .failure()
        .code(10);
}
