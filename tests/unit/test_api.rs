//! Unit tests for the API module
//!
//! Tests cover:
//! - Request descriptions and error body extraction
//! - Job and result wire types
//! - Error classification and exit codes

use codetutor::api::types::{ApiRequest, ErrorBody, JobSubmitted};
use codetutor::errors::{
    get_exit_code, is_auth_error, ApiError, AuthError, JobError, TutorError, EXIT_API_ERROR,
    EXIT_AUTH_ERROR, EXIT_CONFIG_ERROR, EXIT_ERROR, EXIT_TIMEOUT,
};
use codetutor::executor::types::{
    ExecutionJob, JobStatus, ProblemRunEnvelope, SubmissionEnvelope, TutorAction,
};

// ============================================================================
// Request Tests
// ============================================================================

mod request_tests {
    use super::*;

    #[test]
    fn test_post_with_body() {
        let req = ApiRequest::post("http://localhost:8080/api/examples/run")
            .json(serde_json::json!({"code": "print(1)"}));
        assert_eq!(req.method, reqwest::Method::POST);
        assert_eq!(req.body.unwrap()["code"], "print(1)");
    }

    #[test]
    fn test_error_body_prefers_message() {
        let raw = r#"{"message":"Problem not found","error":"Not Found"}"#;
        assert_eq!(ErrorBody::extract(raw), "Problem not found");
    }

    #[test]
    fn test_job_submitted_ignores_extra_fields() {
        let parsed: JobSubmitted =
            serde_json::from_str(r#"{"job_id":"abc","queued_at":"now"}"#).unwrap();
        assert_eq!(parsed.job_id.as_deref(), Some("abc"));
    }
}

// ============================================================================
// Wire Type Tests
// ============================================================================

mod wire_tests {
    use super::*;

    #[test]
    fn test_playground_result() {
        let job: ExecutionJob =
            serde_json::from_str(r#"{"status":"finished","output":"[3,2,1]\n"}"#).unwrap();
        assert_eq!(job.status, JobStatus::Finished);
        assert!(job.status.is_terminal());
        assert_eq!(job.output.as_deref(), Some("[3,2,1]\n"));
        assert!(job.results.is_none());
    }

    #[test]
    fn test_problem_envelope_without_result() {
        let env: ProblemRunEnvelope = serde_json::from_str(r#"{"action":null}"#).unwrap();
        assert!(env.result.is_none());
        assert!(env.action.is_none());
    }

    #[test]
    fn test_all_known_actions() {
        for (raw, expected) in [
            ("give_hint", TutorAction::GiveHint),
            ("show_motivation", TutorAction::ShowMotivation),
            ("increase_difficulty", TutorAction::IncreaseDifficulty),
            ("decrease_difficulty", TutorAction::DecreaseDifficulty),
        ] {
            let parsed: TutorAction = serde_json::from_value(serde_json::json!(raw)).unwrap();
            assert_eq!(parsed, expected);
        }
    }

    #[test]
    fn test_submission_pending_has_no_submission() {
        let env: SubmissionEnvelope =
            serde_json::from_str(r#"{"result":{"totalTestCases":0,"passedTestCases":0}}"#).unwrap();
        assert!(env.result.unwrap().submission.is_none());
    }
}

// ============================================================================
// Error Tests
// ============================================================================

mod error_tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            get_exit_code(&AuthError::SessionExpired.into()),
            EXIT_AUTH_ERROR
        );
        assert_eq!(
            get_exit_code(&TutorError::Config("bad".into()).into()),
            EXIT_CONFIG_ERROR
        );
        assert_eq!(
            get_exit_code(
                &ApiError::HttpStatus {
                    status: 500,
                    message: "boom".into()
                }
                .into()
            ),
            EXIT_API_ERROR
        );
        assert_eq!(
            get_exit_code(&TutorError::Job(JobError::TimedOut { attempts: 20 }).into()),
            EXIT_TIMEOUT
        );
        assert_eq!(get_exit_code(&anyhow::anyhow!("other")), EXIT_ERROR);
    }

    #[test]
    fn test_auth_error_detection_through_wrapper() {
        let err: anyhow::Error = TutorError::Auth(AuthError::NotSignedIn).into();
        assert!(is_auth_error(&err));
        assert!(!is_auth_error(&anyhow::anyhow!("nope")));
    }

    #[test]
    fn test_session_expired_message_asks_to_sign_in() {
        assert!(AuthError::SessionExpired
            .to_string()
            .contains("sign in again"));
    }
}
