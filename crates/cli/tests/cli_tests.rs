//! CLI integration tests

use std::process::Command;

fn nexusctl() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_nexusctl"));
    // Keep a user config file out of the picture
    let home = tempfile::tempdir().expect("Failed to create temp home");
    cmd.env("HOME", home.into_path());
    cmd.env_remove("NEXUS_API_URL");
    cmd
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = nexusctl()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Nexus server selector"), "Should show app name");
    assert!(stdout.contains("servers"), "Should show servers command");
    assert!(stdout.contains("round"), "Should show round command");
    assert!(stdout.contains("series"), "Should show series command");
    assert!(stdout.contains("health"), "Should show health command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = nexusctl()
        .arg("--version")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("nexusctl"), "Should show binary name");
}

/// Test series subcommand help
#[test]
fn test_series_help() {
    let output = nexusctl()
        .args(["series", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Series help should succeed");
    assert!(stdout.contains("--last"), "Should show last option");
    assert!(stdout.contains("<SERVER>"), "Should show server argument");
}

/// Test that series requires a server
#[test]
fn test_series_requires_server() {
    let output = nexusctl()
        .arg("series")
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Series without a server should fail");
}

/// Test invalid format value
#[test]
fn test_invalid_format() {
    let output = nexusctl()
        .args(["--format", "yaml", "servers"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Unknown format should fail");
}

/// Test that an unreachable daemon is reported as an error
#[test]
fn test_connection_error() {
    let output = nexusctl()
        .args(["--api-url", "http://127.0.0.1:1", "servers"])
        .output()
        .expect("Failed to execute command");

    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Unreachable API should fail");
    assert!(
        stderr.contains("Failed to send request"),
        "Should report the request failure"
    );
}

/// Test JSON output against a mock daemon
#[test]
fn test_servers_json_output() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/api/v1/servers")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"session": {"started_at": "2026-01-05T10:00:00Z", "last_round_at": null, "rounds": 1},
                "servers": [{"server": "edge", "reachable": true,
                    "forecast": {"rtt": 0.01, "load": 10.0, "health": 90.0, "error_rate": 0.0, "bandwidth": null, "anomaly": false},
                    "score": 0.1, "selections": 1}]}"#,
        )
        .create();

    let output = nexusctl()
        .args(["--api-url", &server.url(), "--format", "json", "servers"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Servers should succeed");
    let body: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Output should be JSON");
    assert_eq!(body["servers"][0]["server"], "edge");
    assert_eq!(body["session"]["rounds"], 1);
}
