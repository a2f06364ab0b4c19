//! Smoke tests for the codetutor binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn codetutor() -> Command {
    let mut cmd = Command::cargo_bin("codetutor").unwrap();
    cmd.env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .env("CODETUTOR_API_BASE_URL", "http://127.0.0.1:9")
        .env("CODETUTOR_AI_BASE_URL", "http://127.0.0.1:9");
    cmd
}

#[test]
fn test_help_lists_commands() {
    codetutor()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("submit"))
        .stdout(predicate::str::contains("signin"));
}

#[test]
fn test_whoami_without_session() {
    let dir = tempfile::tempdir().unwrap();
    codetutor()
        .env("CODETUTOR_SESSION_FILE", dir.path().join("session.json"))
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in"));
}

#[test]
fn test_submit_requires_sign_in() {
    let dir = tempfile::tempdir().unwrap();
    let code = dir.path().join("solution.py");
    std::fs::write(&code, "print(1)").unwrap();
    codetutor()
        .env("CODETUTOR_SESSION_FILE", dir.path().join("session.json"))
        .args(["submit", "--problem", "1", "--file"])
        .arg(&code)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Not signed in"));
}

#[test]
fn test_bad_config_exits_with_config_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("codetutor.toml");
    std::fs::write(&config, "ai_base_url = \"ftp://nope\"\n").unwrap();
    codetutor()
        .env_remove("CODETUTOR_AI_BASE_URL")
        .env("CODETUTOR_SESSION_FILE", dir.path().join("session.json"))
        .arg("--config")
        .arg(&config)
        .arg("whoami")
        .assert()
        .code(2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_playground_run_exits_non_zero() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/examples/run"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "p1"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/examples/result/p1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"status": "failed", "error": "NameError: x"})),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let code = dir.path().join("broken.py");
    std::fs::write(&code, "print(x)").unwrap();
    let base = server.uri();
    let session = dir.path().join("session.json");

    tokio::task::spawn_blocking(move || {
        codetutor()
            .env("CODETUTOR_API_BASE_URL", &base)
            .env("CODETUTOR_SESSION_FILE", session)
            .args(["run", "--file"])
            .arg(&code)
            .assert()
            .code(1)
            .stdout(predicate::str::contains("Error: NameError: x"))
            .stderr(predicate::str::contains("Job failed: NameError: x"));
    })
    .await
    .unwrap();
}
