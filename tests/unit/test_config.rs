//! Unit tests for configuration loading and session persistence.

use codetutor::config::Config;
use codetutor::session::{Session, SessionHandle, SessionStore};
use std::path::PathBuf;

#[test]
fn test_full_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("codetutor.toml");
    std::fs::write(
        &path,
        r#"
api_base_url = "https://api.tutor.example"
ai_base_url = "https://ai.tutor.example/"
request_timeout_secs = 45
history_page_size = 25
session_file = "/var/tmp/codetutor-session.json"

[polling.problem]
interval_ms = 750
max_attempts = 12
"#,
    )
    .unwrap();

    let config = Config::load(path.to_str()).unwrap();
    assert_eq!(config.ai_base(), "https://ai.tutor.example");
    assert_eq!(config.history_page_size, 25);
    assert_eq!(config.polling.problem.max_attempts, 12);
    assert_eq!(config.polling.submit.max_attempts, 20);
    assert_eq!(
        config.session_path(),
        Some(PathBuf::from("/var/tmp/codetutor-session.json"))
    );
}

#[test]
fn test_invalid_base_url_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "api_base_url = \"not a url\"\n").unwrap();

    let err = Config::load(path.to_str()).unwrap_err();
    assert_eq!(
        codetutor::errors::get_exit_code(&err),
        codetutor::errors::EXIT_CONFIG_ERROR
    );
}

#[test]
fn test_session_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let first = SessionHandle::open(SessionStore::new(&path)).unwrap();
    let playground = first.playground_session_id();

    let reopened = SessionHandle::open(SessionStore::new(&path)).unwrap();
    assert_eq!(reopened.playground_session_id(), playground);
    assert_eq!(
        reopened.snapshot(),
        Session {
            playground_session_id: Some(playground),
            ..Session::default()
        }
    );
}
