//! End-to-end integration tests for kafkette-cli
//!
//! These tests build and run the binary through cargo and are gated behind
//! the `integration` feature flag. Run with:
//!
//! ```sh
//! cargo test -p kafkette-cli --features integration
//! ```

#![cfg(feature = "integration")]

use std::io::Write;
use std::process::{Command, Stdio};

use tempfile::TempDir;

fn kafkette(project_dir: &TempDir) -> Command {
    let mut command = Command::new("cargo");
    command
        .args(["run", "-q", "-p", "kafkette-cli", "--"])
        .env("KAFKETTE_PROJECT_CONFIG_DIR", project_dir.path());
    command
}

/// Test that kafkette --help works
#[test]
fn kafkette_help_works() {
    let project = TempDir::new().unwrap();
    let output = kafkette(&project)
        .arg("--help")
        .output()
        .expect("Failed to run kafkette --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("serve"));
    assert!(stdout.contains("config"));
}

/// Test that kafkette config show prints the project layer
#[test]
fn kafkette_config_show_uses_project_config() {
    let project = TempDir::new().unwrap();
    std::fs::write(
        project.path().join("config.toml"),
        "store = \"memory\"\n[log.append]\nmax_attempts = 7\n",
    )
    .unwrap();

    let output = kafkette(&project)
        .args(["config", "show"])
        .output()
        .expect("Failed to run kafkette config show");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("store = \"memory\""));
    assert!(stdout.contains("max_attempts = 7"));
}

/// Test that kafkette config path names the project override
#[test]
fn kafkette_config_path_shows_paths() {
    let project = TempDir::new().unwrap();
    let output = kafkette(&project)
        .args(["config", "path"])
        .output()
        .expect("Failed to run kafkette config path");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("User config:"));
    assert!(stdout.contains("Project config:"));
}

/// Test a full session against the in-memory store over stdio
///
/// Replies go to stdout, one per line; logs go to stderr.
#[test]
fn kafkette_serve_memory_round_trip() {
    let project = TempDir::new().unwrap();
    let mut child = kafkette(&project)
        .args(["serve", "--store", "memory"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn kafkette serve");

    let requests = [
        r#"{"src":"c0","dest":"n1","body":{"type":"init","msg_id":1,"node_id":"n1","node_ids":["n1"]}}"#,
        r#"{"src":"c1","dest":"n1","body":{"type":"send","msg_id":2,"key":"k1","msg":100}}"#,
    ];
    let mut stdin = child.stdin.take().unwrap();
    for request in requests {
        writeln!(stdin, "{request}").unwrap();
    }
    drop(stdin);

    let output = child
        .wait_with_output()
        .expect("Failed to wait for process");

    assert!(
        output.status.success(),
        "Expected success, got: {:?}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let replies: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(replies.len(), 2, "stdout: {stdout}");
    assert!(replies.iter().any(|r| r["body"]["type"] == "init_ok"));
    assert!(
        replies
            .iter()
            .any(|r| r["body"]["type"] == "send_ok" && r["body"]["offset"] == 0)
    );
}
