use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn leo() -> Command {
    let mut cmd = Command::cargo_bin("leo-setup").unwrap();
    cmd.env_remove("LEO_TARGET")
        .env_remove("LEO_AUTHTOKEN")
        .env_remove("LEO_BROKERID")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_options_and_exits_nonzero() {
    leo()
        .arg("--help")
        .assert()
        .failure()
        .stdout(predicate::str::contains("--authtoken"))
        .stdout(predicate::str::contains("--alldefault"))
        .stdout(predicate::str::contains("--configfile"));
}

#[test]
fn test_short_help_exits_nonzero() {
    leo().arg("-h").assert().failure();
}

#[test]
fn test_unknown_option_fails() {
    leo()
        .arg("--no-such-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--no-such-flag"));
}

#[test]
fn test_non_numeric_broker_id_fails() {
    leo().args(["--brokerid", "chicago"]).assert().failure();
}

#[test]
fn test_missing_components_dir_fails_before_any_prompt() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("components");

    leo()
        .args(["--target", "10.0.0.5", "--authtoken", "abc123", "--brokerid", "42"])
        .arg("--alldefault")
        .arg("--components")
        .arg(&missing)
        .arg("--api-url")
        .arg("http://127.0.0.1:9")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load component"));
}

#[test]
fn test_bad_broker_id_in_environment_fails() {
    leo()
        .env("LEO_BROKERID", "not-a-number")
        .args(["--target", "10.0.0.5", "--alldefault"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("LEO_BROKERID"));
}

#[test]
fn test_failure_is_reported_once() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("components");

    let output = leo()
        .args(["--target", "10.0.0.5", "--authtoken", "abc123", "--brokerid", "42"])
        .arg("--alldefault")
        .arg("--components")
        .arg(&missing)
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("Failed to load component").count(), 1, "{}", stderr);
}
