//! Integration tests for the Open-SAS CLI.
//!
//! These tests verify that the CLI commands work correctly end-to-end.

use std::process::Command;

/// Helper to get fixture path.
fn fixture(name: &str) -> std::path::PathBuf {
    let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

/// Run the CLI with given arguments and return (stdout, stderr, success).
fn run_cli(args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_osas"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_help_command() {
    let (stdout, _, success) = run_cli(&["--help"]);
    assert!(success);
    assert!(stdout.contains("run"));
    assert!(stdout.contains("check"));
    assert!(stdout.contains("repl"));
}

#[test]
fn test_version_command() {
    let (stdout, _, success) = run_cli(&["--version"]);
    assert!(success);
    assert!(stdout.contains("osas"));
}

#[test]
fn test_run_people() {
    let people = fixture("people.sas");
    let (stdout, stderr, success) = run_cli(&["run", people.to_str().unwrap(), "--set", "oldest=cy"]);
    assert!(success, "Command failed with stderr: {}", stderr);

    let cy = stdout.find("cy").unwrap();
    let ann = stdout.find("ann").unwrap();
    let bob = stdout.find("bob").unwrap();
    assert!(cy < ann && ann < bob, "Output: {}", stdout);
    assert!(stdout.contains("Oldest is cy"), "Output: {}", stdout);
    assert!(stderr.contains("4 statement(s), 0 failed"), "Stderr: {}", stderr);
}

#[test]
fn test_run_unresolved_macro_is_reported() {
    let people = fixture("people.sas");
    let (_, stderr, success) = run_cli(&["run", people.to_str().unwrap()]);
    assert!(success);
    assert!(stderr.contains("osas::macro_unresolved"), "Stderr: {}", stderr);
    assert!(stderr.contains("1 failed"), "Stderr: {}", stderr);
}

#[test]
fn test_run_failure_continues() {
    let failing = fixture("failing.sas");
    let (_, stderr, success) = run_cli(&["run", failing.to_str().unwrap()]);
    assert!(success, "Stderr: {}", stderr);
    assert!(stderr.contains("ERROR[osas::missing_source] line 1"), "Stderr: {}", stderr);
    assert!(stderr.contains("2 statement(s), 1 failed"), "Stderr: {}", stderr);
}

#[test]
fn test_run_fail_on_error() {
    let failing = fixture("failing.sas");
    let (_, _, success) = run_cli(&["run", failing.to_str().unwrap(), "--fail-on-error"]);
    assert!(!success);
}

#[test]
fn test_run_json() {
    let failing = fixture("failing.sas");
    let (stdout, stderr, success) = run_cli(&["run", failing.to_str().unwrap(), "--format", "json"]);
    assert!(success, "Stderr: {}", stderr);

    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["statements"], 2);
    assert_eq!(json["failures"], 1);
    assert_eq!(json["summary"]["errors"], 1);
    assert_eq!(json["diagnostics"][0]["code"], "osas::missing_source");
    assert_eq!(json["tables"][0]["name"], "work.b");
    assert_eq!(json["tables"][0]["rows"], 1);
}

#[test]
fn test_run_with_config_and_library() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("osas.json");
    std::fs::write(&config, r#"{"echo_reports": false}"#).unwrap();
    let script = dir.path().join("save.sas");
    std::fs::write(&script, "data out.nums;\n  x = 7;\nrun;\nproc print data=out.nums;\nrun;\n").unwrap();
    let store = dir.path().join("store");

    let lib = format!("out={}", store.display());
    let (stdout, stderr, success) = run_cli(&[
        "run",
        script.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
        "--lib",
        &lib,
    ]);
    assert!(success, "Stderr: {}", stderr);
    assert!(stdout.trim().is_empty(), "Output: {}", stdout);
    assert!(store.join("nums.json").exists());
}

#[test]
fn test_run_bad_lib_argument() {
    let failing = fixture("failing.sas");
    let (_, stderr, success) = run_cli(&["run", failing.to_str().unwrap(), "--lib", "nopath"]);
    assert!(!success);
    assert!(stderr.contains("NAME=VALUE"), "Stderr: {}", stderr);
}

#[test]
fn test_run_missing_file() {
    let (_, stderr, success) = run_cli(&["run", "does/not/exist.sas"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read script"), "Stderr: {}", stderr);
}

#[test]
fn test_check_lists_blocks() {
    let people = fixture("people.sas");
    let (stdout, stderr, success) = run_cli(&["check", people.to_str().unwrap()]);
    assert!(success, "Check command failed: {}", stderr);
    assert!(stdout.contains("data work.people;"), "Output: {}", stdout);
    assert!(stdout.contains("proc sort data=people out=by_age;"), "Output: {}", stdout);
    assert!(stdout.contains("4 block(s)"), "Output: {}", stdout);
}

#[test]
fn test_check_json_lines() {
    let people = fixture("people.sas");
    let (stdout, _, success) = run_cli(&["check", people.to_str().unwrap(), "--format", "json"]);
    assert!(success);

    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let blocks = json["blocks"].as_array().unwrap();
    let kinds: Vec<&str> = blocks.iter().map(|b| b["kind"].as_str().unwrap()).collect();
    assert_eq!(kinds, vec!["data", "proc", "proc", "%put"]);
    assert_eq!(blocks[0]["line"], 2);
    assert_eq!(blocks[1]["line"], 11);
}

#[test]
fn test_check_unterminated() {
    let script = fixture("unterminated.sas");
    let (stdout, _, success) = run_cli(&["check", script.to_str().unwrap()]);
    assert!(!success);
    assert!(stdout.contains("(unterminated)"), "Output: {}", stdout);
}

#[test]
fn test_repl_runs_statements() {
    use std::io::Write;
    use std::process::Stdio;

    let mut child = Command::new(env!("CARGO_BIN_EXE_osas"))
        .arg("repl")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn repl");
    {
        let stdin = child.stdin.as_mut().unwrap();
        stdin
            .write_all(b"%let n = 5;\ndata t;\n  y = &n + 2;\nrun;\n:tables\n%put y is ready;\n:quit\n")
            .unwrap();
    }
    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("work.t  (1 rows, 1 columns)"), "Output: {}", stdout);
    assert!(stdout.contains("y is ready"), "Output: {}", stdout);
}
