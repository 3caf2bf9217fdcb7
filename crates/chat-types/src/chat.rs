use serde::{Deserialize, Serialize};

use crate::message::{now_millis, Message, Role};

/// Sentinel title for a chat that has not yet derived one.
pub const NEW_CHAT_TITLE: &str = "New Chat";

/// Titles derived from the first user message are cut at this length.
pub const TITLE_MAX_LEN: usize = 50;

/// A persisted conversation thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    /// Unix milliseconds
    pub created_at: i64,
    /// Unix milliseconds, monotonically non-decreasing
    pub updated_at: i64,
}

impl Chat {
    pub fn new() -> Self {
        let now = now_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: NEW_CHAT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump `updated_at`. The clock can step backwards (NTP); the field must not.
    pub fn touch(&mut self) {
        self.updated_at = self.updated_at.max(now_millis());
    }

    /// Derive the title from the first user message while the title is still
    /// the sentinel. Once derived, the title is stable until an explicit clear.
    pub fn maybe_derive_title(&mut self) {
        if self.title != NEW_CHAT_TITLE {
            return;
        }
        if let Some(title) = derive_title(&self.messages) {
            self.title = title;
        }
    }
}

impl Default for Chat {
    fn default() -> Self {
        Self::new()
    }
}

/// Title from the first user message: trimmed, truncated to
/// [`TITLE_MAX_LEN`] chars with an ellipsis marker.
pub fn derive_title(messages: &[Message]) -> Option<String> {
    let first_user = messages.iter().find(|m| m.role == Role::User)?;
    let title = first_user.content.trim();
    if title.is_empty() {
        return None;
    }
    if title.chars().count() > TITLE_MAX_LEN {
        let cut: String = title.chars().take(TITLE_MAX_LEN).collect();
        Some(format!("{}...", cut))
    } else {
        Some(title.to_string())
    }
}
