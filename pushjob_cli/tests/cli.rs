use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_interval_flags() {
    Command::cargo_bin("pushjob")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--push-interval"))
        .stdout(predicate::str::contains("--job-interval"));
}

#[test]
fn test_rejects_unparseable_interval() {
    Command::cargo_bin("pushjob")
        .unwrap()
        .args(["--push-interval", "often"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_rejects_non_http_gateway() {
    Command::cargo_bin("pushjob")
        .unwrap()
        .args(["--gateway", "ftp://gateway:21", "--listen", "127.0.0.1:0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}
