//! Tests for the tutor chat flow against a mock orchestration service.

use codetutor::api::ApiClient;
use codetutor::assistant::{
    classify, Assistant, AssistantContext, Conversation, NextProblem, Origin, ReplyOutcome,
    SuggestionKind,
};
use codetutor::config::Config;
use codetutor::session::{Session, SessionHandle};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ApiClient {
    let config = Config {
        api_base_url: server.uri(),
        ai_base_url: server.uri(),
        ..Config::default()
    };
    let session = Session {
        access_token: Some("tok".to_string()),
        refresh_token: Some("ref".to_string()),
        user_id: Some("7".to_string()),
        level: Some("beginner".to_string()),
        ..Session::default()
    };
    ApiClient::new(&config, SessionHandle::new(session)).unwrap()
}

#[tokio::test]
async fn test_ask_lesson_question_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/orchestrate"))
        .and(header("authorization", "Bearer tok"))
        .and(body_partial_json(serde_json::json!({
            "userInput": "What is a loop?",
            "extra": {"lesson_id": 3, "topic": "Loops", "user_id": "7", "user_level": "beginner"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("A loop repeats a block of code."))
        .expect(1)
        .mount(&server)
        .await;

    let assistant = Assistant::new(client_for(&server));
    let session = Session {
        user_id: Some("7".to_string()),
        level: Some("beginner".to_string()),
        ..Session::default()
    };
    let context = AssistantContext::for_lesson(3, "Loops").with_user(&session);
    let mut conversation = Conversation::new();
    let mut printed = String::new();

    let outcome = assistant
        .ask(
            &mut conversation,
            "What is a loop?",
            &context,
            &CancellationToken::new(),
            |u| printed.push_str(u.delta),
        )
        .await
        .unwrap();

    assert_eq!(outcome, ReplyOutcome::Completed);
    assert_eq!(printed, "A loop repeats a block of code.");
    assert_eq!(conversation.messages()[0].origin, Origin::User);
    assert_eq!(
        conversation.last().unwrap().text,
        "A loop repeats a block of code."
    );
    assert!(conversation.latest_suggestion().is_none());
}

#[tokio::test]
async fn test_suggestion_reply_becomes_link() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/orchestrate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"type":"problem","id":42,"title":"Two Sum"}"#),
        )
        .mount(&server)
        .await;

    let assistant = Assistant::new(client_for(&server));
    let mut conversation = Conversation::new();
    assistant
        .ask(
            &mut conversation,
            "What should I do next?",
            &AssistantContext::for_playground("session-1"),
            &CancellationToken::new(),
            |_| {},
        )
        .await
        .unwrap();

    let suggestion = conversation.latest_suggestion().unwrap();
    assert_eq!(suggestion.kind, SuggestionKind::Problem);
    assert_eq!(suggestion.link(), "/problem-detail/?problemId=42");
    assert_eq!(suggestion.label(), "Go to: Two Sum");
}

#[tokio::test]
async fn test_empty_reply_leaves_only_question() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/orchestrate"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let assistant = Assistant::new(client_for(&server));
    let mut conversation = Conversation::new();
    let outcome = assistant
        .ask(
            &mut conversation,
            "Hello?",
            &AssistantContext::default(),
            &CancellationToken::new(),
            |_| {},
        )
        .await
        .unwrap();

    assert_eq!(outcome, ReplyOutcome::Empty);
    assert_eq!(conversation.len(), 1);
}

#[tokio::test]
async fn test_server_error_is_api_error_and_no_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/orchestrate"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let assistant = Assistant::new(client_for(&server));
    let mut conversation = Conversation::new();
    let err = assistant
        .ask(
            &mut conversation,
            "Hello?",
            &AssistantContext::default(),
            &CancellationToken::new(),
            |_| {},
        )
        .await
        .unwrap_err();

    assert_eq!(
        codetutor::errors::get_exit_code(&err),
        codetutor::errors::EXIT_API_ERROR
    );
    assert_eq!(conversation.len(), 1);
    assert!(!conversation.is_streaming());
}

#[tokio::test]
async fn test_next_problem_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/orchestrate"))
        .and(body_partial_json(serde_json::json!({
            "userInput": "Give me an easier problem",
            "extra": {"problem_id": 9}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"type":"problem","id":"5"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let assistant = Assistant::new(client_for(&server));
    let context = AssistantContext {
        problem_id: Some(9),
        ..AssistantContext::default()
    };
    let suggestion = assistant
        .request_next_problem(NextProblem::Easier, &context, &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(suggestion.id, 5);
    assert_eq!(suggestion.label(), "Go to suggested problem #5");
}

#[test]
fn test_classifier_examples() {
    let s = classify(r#"{"type":"problem","id":42,"title":"X"}"#).unwrap();
    assert_eq!(s.id, 42);
    assert!(classify("Just a normal reply").is_none());
}
