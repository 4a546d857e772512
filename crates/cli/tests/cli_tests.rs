//! CLI integration tests

use std::process::{Command, Output};

fn agm(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "agm-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = agm(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Agri Market Intelligence"), "Should show app name");
    for command in [
        "predict",
        "commodities",
        "chat",
        "export",
        "dashboard",
        "diagnose",
        "signup",
        "login",
        "logout",
        "health",
    ] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = agm(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("agm"), "Should show binary name");
}

#[test]
fn test_predict_help() {
    let output = agm(&["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Predict help should succeed");
    assert!(stdout.contains("<COMMODITY>"), "Should show commodity argument");
    assert!(stdout.contains("--weeks"), "Should show weeks option");
}

#[test]
fn test_export_help() {
    let output = agm(&["export", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Export help should succeed");
    assert!(stdout.contains("--state"), "Should show state option");
    assert!(stdout.contains("--district"), "Should show district option");
    assert!(stdout.contains("--commodity"), "Should show commodity option");
    assert!(stdout.contains("--file-format"), "Should show file-format option");
    assert!(stdout.contains("--output"), "Should show output option");
}

#[test]
fn test_dashboard_show_help() {
    let output = agm(&["dashboard", "show", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Dashboard show help should succeed");
    assert!(stdout.contains("--commodity"), "Should show commodity option");
    assert!(stdout.contains("--district"), "Should show district option");
}

#[test]
fn test_login_help() {
    let output = agm(&["login", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Login help should succeed");
    assert!(stdout.contains("--username"), "Should show username option");
    assert!(stdout.contains("AGM_PASSWORD"), "Should show password env var");
}

/// Test format and api-url options
#[test]
fn test_global_options() {
    let output = agm(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
    assert!(stdout.contains("--api-url"), "Should show api-url option");
    assert!(stdout.contains("AGM_API_URL"), "Should show env var");
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = agm(&["invalid-command"]);
    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

/// Test missing required argument error handling
#[test]
fn test_missing_argument() {
    let output = agm(&["diagnose"]);
    assert!(!output.status.success(), "Missing argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("required") || stderr.contains("error"),
        "Should show error about missing argument"
    );
}

/// An unreachable server is reported, not a panic
#[test]
fn test_unreachable_server() {
    let output = agm(&["--api-url", "http://127.0.0.1:9", "commodities"]);
    assert!(!output.status.success(), "Request to a closed port should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to send request"), "Should report send failure");
}
