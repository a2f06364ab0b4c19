//! Chat transcript with a single mutable in-flight assistant message.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::suggestion::{classify, Suggestion};

/// Marker the orchestrator emits when it starts executing the user's code.
pub const RUN_CODE_MARKER: &str = "__RUN_CODE__";
/// Marker emitted once that execution is over.
pub const RUN_CODE_DONE_MARKER: &str = "__RUN_CODE_DONE__";

const MARKERS: [(&str, AssistantStatus); 2] = [
    (RUN_CODE_MARKER, AssistantStatus::RunningCode),
    (RUN_CODE_DONE_MARKER, AssistantStatus::Idle),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    Assistant,
}

/// Transient state the assistant signals in-band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantStatus {
    #[default]
    Idle,
    RunningCode,
}

/// Split raw assistant text into visible prose and the last signalled status.
///
/// While `live`, a trailing fragment that could still grow into a marker is
/// held back so it never flashes on screen.
pub fn split_markers(raw: &str, live: bool) -> (String, AssistantStatus) {
    let mut visible = String::with_capacity(raw.len());
    let mut status = AssistantStatus::Idle;
    let mut rest = raw;

    while let Some((pos, marker, marker_status)) = MARKERS
        .iter()
        .filter_map(|(m, s)| rest.find(m).map(|pos| (pos, *m, *s)))
        .min_by_key(|(pos, _, _)| *pos)
    {
        visible.push_str(&rest[..pos]);
        status = marker_status;
        rest = &rest[pos + marker.len()..];
    }

    let held = if live { partial_marker_len(rest) } else { 0 };
    visible.push_str(&rest[..rest.len() - held]);
    (visible, status)
}

/// Length of the longest suffix of `text` that is a proper prefix of a marker.
fn partial_marker_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    MARKERS
        .iter()
        .flat_map(|(marker, _)| {
            let m = marker.as_bytes();
            (1..m.len()).filter(move |&k| bytes.ends_with(&m[..k]))
        })
        .max()
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub origin: Origin,
    /// Raw text exactly as received
    pub text: String,
    #[serde(default)]
    pub status: AssistantStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<Suggestion>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::User,
            text: text.into(),
            status: AssistantStatus::Idle,
            suggestion: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::Assistant,
            text: text.into(),
            status: AssistantStatus::Idle,
            suggestion: None,
        }
    }

    /// Text to render, with in-band markers removed.
    pub fn visible_text(&self) -> String {
        match self.origin {
            Origin::User => self.text.clone(),
            Origin::Assistant => split_markers(&self.text, false).0,
        }
    }

    /// Classify a stable assistant message. Prior messages are never touched.
    fn stabilize(&mut self) {
        let (visible, status) = split_markers(&self.text, false);
        self.status = status;
        self.suggestion = classify(&visible);
    }
}

/// Ordered transcript. Append-only, except that the one in-flight assistant
/// message may be replaced while its reply streams in.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    in_flight: Option<usize>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_streaming(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::user(text));
    }

    /// Append the empty placeholder that the next reply streams into.
    pub fn begin_assistant(&mut self) -> Result<()> {
        if self.in_flight.is_some() {
            bail!("An assistant reply is already streaming in this conversation");
        }
        self.messages.push(ChatMessage::assistant(String::new()));
        self.in_flight = Some(self.messages.len() - 1);
        Ok(())
    }

    /// Replace the in-flight message with the accumulated reply so far.
    pub fn replace_in_flight(&mut self, accumulated: &str) -> Result<&ChatMessage> {
        let Some(idx) = self.in_flight else {
            bail!("No assistant reply is streaming");
        };
        let message = &mut self.messages[idx];
        message.text.clear();
        message.text.push_str(accumulated);
        message.status = split_markers(accumulated, true).1;
        Ok(&self.messages[idx])
    }

    /// Stabilize the in-flight message and classify it.
    pub fn finish_in_flight(&mut self) -> Option<&ChatMessage> {
        let idx = self.in_flight.take()?;
        self.messages[idx].stabilize();
        Some(&self.messages[idx])
    }

    /// Drop the placeholder of a reply that never produced any bytes.
    pub fn abandon_in_flight(&mut self) {
        if let Some(idx) = self.in_flight.take() {
            self.messages.remove(idx);
        }
    }

    /// Insert an older page of history in front of the transcript.
    pub fn prepend_history(&mut self, older: Vec<ChatMessage>) {
        let n = older.len();
        self.messages.splice(0..0, older);
        if let Some(idx) = self.in_flight.as_mut() {
            *idx += n;
        }
    }

    /// Status signalled by the most recent assistant message.
    pub fn assistant_status(&self) -> AssistantStatus {
        self.messages
            .iter()
            .rev()
            .find(|m| m.origin == Origin::Assistant)
            .map(|m| m.status)
            .unwrap_or_default()
    }

    /// Suggestion carried by the last message, if it is a stable assistant reply.
    pub fn latest_suggestion(&self) -> Option<&Suggestion> {
        if self.in_flight.is_some() {
            return None;
        }
        self.messages
            .last()
            .filter(|m| m.origin == Origin::Assistant)
            .and_then(|m| m.suggestion.as_ref())
    }
}
