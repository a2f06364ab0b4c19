//! Navigation hints embedded in assistant replies.
//!
//! A reply whose entire text is a JSON object such as
//! `{"type":"problem","id":42,"title":"Two Sum"}` is a suggestion rather than
//! prose. Anything that fails to parse is prose; nothing is reported to the user.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Problem,
    Lesson,
}

impl fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuggestionKind::Problem => write!(f, "problem"),
            SuggestionKind::Lesson => write!(f, "lesson"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Suggestion {
    /// Front-end route the suggestion points at.
    pub fn link(&self) -> String {
        match self.kind {
            SuggestionKind::Problem => format!("/problem-detail/?problemId={}", self.id),
            SuggestionKind::Lesson => format!("/lesson/?id={}", self.id),
        }
    }

    pub fn label(&self) -> String {
        match self.title.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(title) => format!("Go to: {}", title),
            None => format!("Go to suggested {} #{}", self.kind, self.id),
        }
    }
}

/// Classify the full, stabilized text of an assistant message.
pub fn classify(text: &str) -> Option<Suggestion> {
    let trimmed = text.trim();
    if !trimmed.starts_with('{') {
        return None;
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(e) => {
            debug!("Reply is not a suggestion object: {}", e);
            return None;
        }
    };

    let kind = match value.get("type").and_then(Value::as_str) {
        Some("problem") => SuggestionKind::Problem,
        Some("lesson") => SuggestionKind::Lesson,
        other => {
            debug!("Unrecognized suggestion type {:?}", other);
            return None;
        }
    };

    let id = match value.get("id") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().ok()
        }
        _ => None,
    };
    let Some(id) = id.filter(|id| *id > 0) else {
        debug!("Suggestion without a usable id");
        return None;
    };

    let title = value
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|t| !t.is_empty());

    Some(Suggestion { kind, id, title })
}
