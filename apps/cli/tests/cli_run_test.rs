//! Integration tests for the `conduit` binary using the mock provider.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// A command isolated from the user's config files and environment.
fn conduit(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("conduit").unwrap();
    cmd.current_dir(temp_dir.path())
        .env("HOME", temp_dir.path())
        .env_remove("GEMINI_API_KEY")
        .env_remove("CONDUIT_PROVIDER")
        .env_remove("CONDUIT_MODEL")
        .env_remove("CONDUIT_LOG_LEVEL");
    cmd
}

#[test]
fn test_run_greeting() {
    let temp_dir = TempDir::new().unwrap();

    conduit(&temp_dir)
        .args(["run", "hi", "--provider", "mock"])
        .assert()
        .success()
        .stdout(predicate::str::contains("conversational_answer"))
        .stdout(predicate::str::contains("Hello! How can I help you today?"));
}

#[test]
fn test_run_json_output() {
    let temp_dir = TempDir::new().unwrap();

    let output = conduit(&temp_dir).args(["run", "hello", "--provider", "mock", "--json"]).output().unwrap();

    assert!(output.status.success());
    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["status"], "success");
    assert_eq!(response["task_type"], "conversation");
    assert_eq!(response["logs"][0]["status"], "completed");
}

#[test]
fn test_run_without_input_fails() {
    let temp_dir = TempDir::new().unwrap();

    conduit(&temp_dir)
        .args(["run", "--provider", "mock"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to run"));
}

#[test]
fn test_unknown_provider_fails() {
    let temp_dir = TempDir::new().unwrap();

    conduit(&temp_dir)
        .args(["run", "hi", "--provider", "carrier-pigeon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("carrier-pigeon"));
}

#[test]
fn test_local_config_selects_provider() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join(".conduitrc"), "[model]\nprovider = \"mock\"\n").unwrap();

    conduit(&temp_dir)
        .args(["run", "hey"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello! How can I help you today?"));
}

#[test]
fn test_explicit_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("conduit.toml");
    fs::write(&config_path, "history_limit = 5\n\n[model]\nprovider = \"mock\"\nmodel_id = \"mock-1\"\n").unwrap();

    conduit(&temp_dir)
        .arg("--config")
        .arg(&config_path)
        .args(["run", "hi"])
        .assert()
        .success();
}

#[test]
fn test_bare_pdf_asks_for_clarification() {
    let temp_dir = TempDir::new().unwrap();
    let pdf = temp_dir.path().join("report.pdf");
    fs::write(&pdf, b"%PDF-1.4 not much of a document").unwrap();

    let output = conduit(&temp_dir)
        .args(["run", "--provider", "mock", "--json", "--file"])
        .arg(&pdf)
        .output()
        .unwrap();

    assert!(output.status.success());
    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["status"], "needs_clarification");
    assert!(response["clarification_question"].as_str().unwrap().contains("PDF"));
}

#[test]
fn test_chat_session() {
    let temp_dir = TempDir::new().unwrap();

    conduit(&temp_dir)
        .args(["chat", "--provider", "mock"])
        .write_stdin("hi\n/clear\n/quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello! How can I help you today?"))
        .stdout(predicate::str::contains("Conversation history cleared."))
        .stdout(predicate::str::contains("Goodbye!"));
}
