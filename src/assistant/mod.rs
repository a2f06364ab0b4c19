//! Streaming tutor replies
//!
//! A question goes to the orchestration endpoint as `{ userInput, extra }`.
//! The reply is plain text streamed in arbitrary chunks; each chunk is decoded
//! and the single in-flight assistant message is replaced with everything
//! received so far. Once the body ends the message is stabilized and checked
//! for an embedded suggestion.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::types::ApiRequest;
use crate::api::{ensure_success, ApiClient};
use crate::errors::ApiError;
use crate::executor::types::TutorAction;
use crate::session::Session;

pub mod conversation;
pub mod decoder;
pub mod history;
pub mod suggestion;

pub use conversation::{split_markers, AssistantStatus, ChatMessage, Conversation, Origin};
pub use decoder::Utf8Decoder;
pub use suggestion::{classify, Suggestion, SuggestionKind};

/// Raw reply body chunks in arrival order.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Body of an orchestration call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrateRequest {
    pub user_input: String,
    pub extra: AssistantContext,
}

/// Page context sent with every question. Absent fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssistantContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub testcase: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_agent: Option<String>,
}

impl AssistantContext {
    pub fn for_lesson(lesson_id: u64, topic: impl Into<String>) -> Self {
        Self {
            lesson_id: Some(lesson_id),
            topic: Some(topic.into()),
            ..Self::default()
        }
    }

    pub fn for_problem(problem_id: u64) -> Self {
        Self {
            problem_id: Some(problem_id),
            last_agent: Some("hint".to_string()),
            ..Self::default()
        }
    }

    pub fn for_playground(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            last_agent: Some("hint".to_string()),
            ..Self::default()
        }
    }

    /// Attach the signed-in user's id and level (defaulting to beginner).
    pub fn with_user(mut self, session: &Session) -> Self {
        self.user_id = session.user_id.clone();
        self.user_level = Some(
            session
                .level
                .clone()
                .unwrap_or_else(|| "beginner".to_string()),
        );
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.user_code = Some(code.into());
        self
    }

    pub fn with_running_result(mut self, result: Option<String>) -> Self {
        self.running_result = result;
        self
    }

    pub fn with_problem_text(mut self, title: Option<String>, description: Option<String>) -> Self {
        self.problem_title = title;
        self.problem_description = description;
        self
    }

    pub fn with_testcases(mut self, testcases: serde_json::Value) -> Self {
        self.testcase = Some(testcases);
        self
    }
}

/// Anything that can open a streamed reply for a question.
#[async_trait]
pub trait ReplySource: Send + Sync {
    /// Send the question; resolves once response headers have arrived.
    async fn open_reply(&self, request: &OrchestrateRequest) -> Result<ByteStream>;
}

#[async_trait]
impl ReplySource for ApiClient {
    async fn open_reply(&self, request: &OrchestrateRequest) -> Result<ByteStream> {
        let call = orchestrate_call(self, request)?;
        let response = ensure_success(self.send(&call).await?).await?;
        debug!(status = response.status().as_u16(), "Reply stream opened");

        Ok(response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| anyhow::Error::from(ApiError::from_reqwest(&e)))
            })
            .boxed())
    }
}

/// The orchestrate POST. Its body may stream for longer than the request timeout.
fn orchestrate_call(client: &ApiClient, request: &OrchestrateRequest) -> Result<ApiRequest> {
    Ok(ApiRequest::post(client.ai_url("/api/ai/orchestrate"))
        .json(serde_json::to_value(request)?)
        .streaming())
}

/// How a streamed reply ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Completed,
    /// The body carried no bytes; no assistant message was kept
    Empty,
    /// Reading stopped early; whatever arrived is kept
    Cancelled,
}

/// Progress of the in-flight reply, passed to observers after each chunk.
#[derive(Debug, Clone, Copy)]
pub struct ReplyUpdate<'a> {
    /// Newly visible text since the previous update
    pub delta: &'a str,
    pub visible: &'a str,
    pub status: AssistantStatus,
}

/// Read `stream` into a new assistant message at the end of `conversation`.
pub async fn consume_reply<F>(
    conversation: &mut Conversation,
    mut stream: ByteStream,
    cancel: &CancellationToken,
    mut on_update: F,
) -> Result<ReplyOutcome>
where
    F: FnMut(&ReplyUpdate<'_>),
{
    conversation.begin_assistant()?;

    let mut decoder = Utf8Decoder::new();
    let mut accumulated = String::new();
    let mut received = 0usize;
    let mut shown = 0usize;
    let mut cancelled = false;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                cancelled = true;
                break;
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(bytes)) => {
                received += bytes.len();
                accumulated.push_str(&decoder.push(&bytes));
                let message = conversation.replace_in_flight(&accumulated)?;
                let (visible, _) = split_markers(&message.text, true);
                publish(&visible, message.status, &mut shown, &mut on_update);
            }
            Some(Err(e)) => {
                if received == 0 {
                    conversation.abandon_in_flight();
                } else {
                    conversation.finish_in_flight();
                }
                warn!("Reply stream failed after {} bytes: {:#}", received, e);
                return Err(e);
            }
            None => break,
        }
    }

    if received == 0 {
        conversation.abandon_in_flight();
        if cancelled {
            return Ok(ReplyOutcome::Cancelled);
        }
        warn!("Assistant reply had an empty body");
        return Ok(ReplyOutcome::Empty);
    }

    if decoder.has_pending() {
        debug!("Reply ended inside a multi-byte character");
    }
    let tail = decoder.finish();
    if !tail.is_empty() {
        accumulated.push_str(&tail);
        conversation.replace_in_flight(&accumulated)?;
    }

    if let Some(message) = conversation.finish_in_flight() {
        let visible = message.visible_text();
        publish(&visible, message.status, &mut shown, &mut on_update);
        if let Some(s) = &message.suggestion {
            debug!(kind = %s.kind, id = s.id, "Reply carries a suggestion");
        }
    }

    if cancelled {
        info!(bytes = received, "Reply cancelled");
        Ok(ReplyOutcome::Cancelled)
    } else {
        debug!(bytes = received, "Reply complete");
        Ok(ReplyOutcome::Completed)
    }
}

fn publish<F>(visible: &str, status: AssistantStatus, shown: &mut usize, on_update: &mut F)
where
    F: FnMut(&ReplyUpdate<'_>),
{
    let delta = visible.get(*shown..).unwrap_or("");
    on_update(&ReplyUpdate {
        delta,
        visible,
        status,
    });
    *shown = visible.len();
}

/// Follow-up requested after a problem run or an accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextProblem {
    Harder,
    Easier,
    Next,
}

impl NextProblem {
    pub fn from_action(action: Option<&TutorAction>) -> Self {
        match action {
            Some(TutorAction::IncreaseDifficulty) => NextProblem::Harder,
            Some(TutorAction::DecreaseDifficulty) => NextProblem::Easier,
            _ => NextProblem::Next,
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            NextProblem::Harder => "Give me a harder problem",
            NextProblem::Easier => "Give me an easier problem",
            NextProblem::Next => "Give the next problem",
        }
    }
}

/// Tutor chat client over any reply source.
pub struct Assistant<S> {
    source: S,
}

impl<S: ReplySource> Assistant<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Ask a question and stream the reply into `conversation`.
    pub async fn ask<F>(
        &self,
        conversation: &mut Conversation,
        user_input: &str,
        context: &AssistantContext,
        cancel: &CancellationToken,
        on_update: F,
    ) -> Result<ReplyOutcome>
    where
        F: FnMut(&ReplyUpdate<'_>),
    {
        conversation.push_user(user_input);
        let request = OrchestrateRequest {
            user_input: user_input.to_string(),
            extra: context.clone(),
        };

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(ReplyOutcome::Cancelled),
            opened = self.source.open_reply(&request) => opened?,
        };
        consume_reply(conversation, stream, cancel, on_update).await
    }

    /// Ask the orchestrator for a follow-up problem.
    ///
    /// Returns `None` when the reply is not a problem suggestion.
    pub async fn request_next_problem(
        &self,
        next: NextProblem,
        context: &AssistantContext,
        cancel: &CancellationToken,
    ) -> Result<Option<Suggestion>> {
        let mut conversation = Conversation::new();
        let outcome = self
            .ask(&mut conversation, next.prompt(), context, cancel, |_| {})
            .await?;
        if outcome != ReplyOutcome::Completed {
            return Ok(None);
        }

        let suggestion = conversation
            .latest_suggestion()
            .filter(|s| s.kind == SuggestionKind::Problem)
            .cloned();
        if suggestion.is_none() {
            debug!("Next problem reply had no problem suggestion");
        }
        Ok(suggestion)
    }
}
