//! Paged chat history for a lesson.

use anyhow::Result;
use serde::Deserialize;
use tracing::debug;

use super::conversation::{ChatMessage, Conversation};
use crate::api::types::ApiRequest;
use crate::api::ApiClient;

/// One stored question/answer pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    #[serde(default)]
    pub user_query: String,
    #[serde(default)]
    pub ai_response: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub content: Vec<ConversationEntry>,
    /// True when this is the oldest page
    #[serde(default = "default_last")]
    pub last: bool,
}

fn default_last() -> bool {
    true
}

impl HistoryPage {
    /// Flatten into alternating user/assistant messages, oldest first.
    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.content
            .into_iter()
            .flat_map(|entry| {
                [
                    ChatMessage::user(entry.user_query),
                    ChatMessage::assistant(entry.ai_response),
                ]
            })
            .collect()
    }
}

/// Walks a lesson's history backwards one page at a time.
#[derive(Debug, Clone)]
pub struct HistoryCursor {
    lesson_id: u64,
    page: u32,
    size: u32,
    has_more: bool,
}

impl HistoryCursor {
    pub fn new(lesson_id: u64, size: u32) -> Self {
        Self {
            lesson_id,
            page: 0,
            size,
            has_more: true,
        }
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// Fetch the next page and prepend it to `conversation`.
    ///
    /// Returns the number of messages added; zero once history is exhausted.
    pub async fn load_more(&mut self, client: &ApiClient, conversation: &mut Conversation) -> Result<usize> {
        if !self.has_more {
            return Ok(0);
        }

        let request = ApiRequest::get(client.api_url("/api/ai/conversations"))
            .query("lessonId", self.lesson_id)
            .query("page", self.page)
            .query("size", self.size);
        let page: HistoryPage = client.send_json(&request).await?;

        self.has_more = !page.last;
        self.page += 1;
        let messages = page.into_messages();
        let added = messages.len();
        debug!(lesson_id = self.lesson_id, page = self.page - 1, added, "Loaded history page");
        conversation.prepend_history(messages);
        Ok(added)
    }
}
