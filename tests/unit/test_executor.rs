//! Tests for job submission and polling against a mock execution backend.

use codetutor::api::ApiClient;
use codetutor::config::{Config, PollSettings, PollingConfig};
use codetutor::executor::report::{render_playground, render_problem_run};
use codetutor::executor::types::{ExecutionJob, ProblemRunEnvelope, SubmissionEnvelope, TutorAction};
use codetutor::executor::{ActionClock, JobExecutor, JobOutcome, JobTarget};
use codetutor::session::{Session, SessionHandle};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_polling() -> PollingConfig {
    let fast = PollSettings {
        interval_ms: 10,
        max_attempts: 6,
    };
    PollingConfig {
        playground: fast,
        problem: fast,
        submit: fast,
    }
}

fn executor_for(server: &MockServer) -> JobExecutor<ApiClient> {
    let config = Config {
        api_base_url: server.uri(),
        polling: fast_polling(),
        ..Config::default()
    };
    let session = Session {
        access_token: Some("tok".to_string()),
        user_id: Some("7".to_string()),
        ..Session::default()
    };
    let client = ApiClient::new(&config, SessionHandle::new(session)).unwrap();
    JobExecutor::new(client, config.polling.clone())
}

#[tokio::test]
async fn test_problem_run_abc_scenario() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/problems/1/run-user-code"))
        .and(body_json(serde_json::json!({
            "userCode": "solve",
            "testCases": [{"id": 1, "input": "[1,2,3]"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "abc"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/problems/result-problem/abc"))
        .and(header("problem-id", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"result": {"status": "pending"}, "action": null})),
        )
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/problems/result-problem/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "result": {
                "status": "finished",
                "output": "[3,2,1]",
                "results": [{
                    "id": 1, "passed": true, "input": "[1,2,3]",
                    "solutionOutput": "[3,2,1]", "userOutput": "[3,2,1]"
                }]
            },
            "action": "show_motivation"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let executor = executor_for(&server);
    let target = JobTarget::ProblemRun {
        problem_id: 1,
        code: "solve".to_string(),
        inputs: vec!["[1,2,3]".to_string()],
    };
    let outcome: JobOutcome<ProblemRunEnvelope> = executor
        .execute(&target, &mut ActionClock::start(), &CancellationToken::new())
        .await
        .unwrap();

    let rendered = render_problem_run(&outcome);
    assert_eq!(
        rendered,
        "Testcase 1: ✅ Passed\nInput: [1,2,3]\nExpected: [3,2,1]\nYour Output: [3,2,1]\n"
    );
    match outcome {
        JobOutcome::Finished(env) => assert_eq!(env.action, Some(TutorAction::ShowMotivation)),
        other => panic!("expected finished, got {:?}", other),
    }
}

#[tokio::test]
async fn test_playground_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/examples/run"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "slow"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/examples/result/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "pending"})))
        .expect(6)
        .mount(&server)
        .await;

    let executor = executor_for(&server);
    let outcome: JobOutcome<ExecutionJob> = executor
        .execute(
            &JobTarget::Playground {
                code: "import time; time.sleep(60)".to_string(),
            },
            &mut ActionClock::start(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, JobOutcome::TimedOut { attempts: 6, .. }));
    assert_eq!(render_playground(&outcome), "Timed out waiting for result.");
    assert!(outcome.into_result().is_err());
}

#[tokio::test]
async fn test_submit_sends_user_and_lesson() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/problems/2/submit"))
        .and(body_json(serde_json::json!({"userCode": "code", "userId": 7})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "s1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/problems/result-submit/s1"))
        .and(header("problem-id", "2"))
        .and(header("lesson-id", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "result": {
                "submission": {"runtime": 0.02, "memory": 4.1, "status": "Accepted"},
                "totalTestCases": 4,
                "passedTestCases": 4,
                "xpGained": 10
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let executor = executor_for(&server);
    let target = JobTarget::Submit {
        problem_id: 2,
        code: "code".to_string(),
        user_id: Some(7),
        lesson_id: Some(5),
    };
    let outcome: JobOutcome<SubmissionEnvelope> = executor
        .execute(&target, &mut ActionClock::start(), &CancellationToken::new())
        .await
        .unwrap();

    let result = outcome.into_result().unwrap().result.unwrap();
    assert!(result.accepted());
    assert_eq!(result.xp_gained, Some(10));
}

#[tokio::test]
async fn test_missing_job_id_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/examples/run"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let executor = executor_for(&server);
    let err = executor
        .execute::<ExecutionJob>(
            &JobTarget::Playground {
                code: "1".to_string(),
            },
            &mut ActionClock::start(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("job id"));
}

#[tokio::test]
async fn test_pre_cancelled_action_submits_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "x"})))
        .expect(0)
        .mount(&server)
        .await;

    let executor = executor_for(&server);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = executor
        .execute::<ExecutionJob>(
            &JobTarget::Playground {
                code: "1".to_string(),
            },
            &mut ActionClock::start(),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(outcome, JobOutcome::Cancelled);
}
