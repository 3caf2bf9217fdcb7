//! Chat state machine — the in-memory authoritative view of all chat
//! threads, the active thread, and the in-progress streaming buffer.
//!
//! Every mutating operation writes through to the [`SessionStore`] before
//! returning, but a failed persist never rolls back the in-memory change:
//! in-memory state is the source of truth for the running session.
//!
//! The machine is owned by a single task and mutated through `&mut self`,
//! so no two operations ever execute simultaneously.

use std::collections::HashMap;

use chat_types::chat::{Chat, NEW_CHAT_TITLE};
use chat_types::message::{Message, Role};

use crate::session_store::SessionStore;

/// Outcome of a state-machine operation. Guard hits (unknown chat id,
/// no active chat) are ignored rather than raised, but callers and tests
/// can still observe them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpStatus {
    Applied,
    Ignored,
}

pub struct ChatStateMachine {
    chats: HashMap<String, Chat>,
    active_chat_id: Option<String>,
    streaming_content: String,
    is_streaming: bool,
    store: SessionStore,
}

impl ChatStateMachine {
    /// Restore from the session store. If no chats exist, an initial one is
    /// created; the most recently updated chat becomes active.
    pub async fn load(store: SessionStore) -> Self {
        let mut chats = store.get_all_chats().await;
        if chats.is_empty() {
            let chat = store.create_chat().await;
            chats.insert(chat.id.clone(), chat);
        }
        let active_chat_id = most_recently_updated(&chats);
        Self {
            chats,
            active_chat_id,
            streaming_content: String::new(),
            is_streaming: false,
            store,
        }
    }

    // ─── Read accessors ──────────────────────────────────────

    pub fn chats(&self) -> &HashMap<String, Chat> {
        &self.chats
    }

    pub fn active_chat_id(&self) -> Option<&str> {
        self.active_chat_id.as_deref()
    }

    pub fn active_chat(&self) -> Option<&Chat> {
        self.active_chat_id.as_ref().and_then(|id| self.chats.get(id))
    }

    /// Messages of the active chat, empty if none is active.
    pub fn messages(&self) -> &[Message] {
        self.active_chat().map(|c| c.messages.as_slice()).unwrap_or(&[])
    }

    pub fn streaming_content(&self) -> &str {
        &self.streaming_content
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    /// Chats sorted most recently updated first, for listing.
    pub fn sorted_chats(&self) -> Vec<&Chat> {
        let mut chats: Vec<&Chat> = self.chats.values().collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        chats
    }

    // ─── Operations ──────────────────────────────────────────

    /// Create a new empty chat, make it active, and discard any in-flight
    /// streaming buffer.
    pub async fn create_new_chat(&mut self) -> OpStatus {
        let chat = self.store.create_chat().await;
        self.active_chat_id = Some(chat.id.clone());
        self.chats.insert(chat.id.clone(), chat);
        self.clear_streaming();
        OpStatus::Applied
    }

    /// Make an existing chat active. Unknown ids are ignored.
    pub fn switch_chat(&mut self, id: &str) -> OpStatus {
        if !self.chats.contains_key(id) {
            return OpStatus::Ignored;
        }
        self.active_chat_id = Some(id.to_string());
        self.clear_streaming();
        OpStatus::Applied
    }

    /// Remove a chat. If it was active, the most recently updated remaining
    /// chat becomes active; if none remain, a fresh chat is created so the
    /// "at least one chat exists, one is active" invariant is never visible
    /// as violated.
    pub async fn delete_chat(&mut self, id: &str) -> OpStatus {
        if self.chats.remove(id).is_none() {
            return OpStatus::Ignored;
        }
        self.store.delete_chat(id).await;

        if self.active_chat_id.as_deref() == Some(id) {
            match most_recently_updated(&self.chats) {
                Some(next) => self.active_chat_id = Some(next),
                None => {
                    let chat = self.store.create_chat().await;
                    self.active_chat_id = Some(chat.id.clone());
                    self.chats.insert(chat.id.clone(), chat);
                }
            }
        }
        OpStatus::Applied
    }

    /// Empty the active chat's messages and reset its title. The chat itself
    /// is kept.
    pub async fn clear_current_chat(&mut self) -> OpStatus {
        let Some(id) = self.active_chat_id.clone() else {
            return OpStatus::Ignored;
        };
        self.store.clear_chat_messages(&id).await;
        if let Some(chat) = self.chats.get_mut(&id) {
            chat.messages.clear();
            chat.title = NEW_CHAT_TITLE.to_string();
            chat.touch();
        }
        self.clear_streaming();
        OpStatus::Applied
    }

    /// Append a message to the active chat, synthesizing id and timestamp,
    /// and write through to the store.
    pub async fn add_message(&mut self, role: Role, content: impl Into<String>) -> OpStatus {
        let Some(id) = self.active_chat_id.clone() else {
            return OpStatus::Ignored;
        };
        let message = Message::new(role, content);
        let messages = {
            let Some(chat) = self.chats.get_mut(&id) else {
                return OpStatus::Ignored;
            };
            chat.messages.push(message);
            chat.touch();
            chat.maybe_derive_title();
            chat.messages.clone()
        };
        self.store.update_chat(&id, messages).await;
        OpStatus::Applied
    }

    /// Set the in-progress streaming buffer. Called on every delta with the
    /// cumulative text — callers concatenate before calling this.
    pub fn update_streaming_message(&mut self, text: impl Into<String>) {
        self.streaming_content = text.into();
        self.is_streaming = !self.streaming_content.is_empty();
    }

    /// Convert streamed output into a permanent assistant message, then
    /// clear the streaming buffer and flag. This is the only path that may
    /// finalize a stream.
    pub async fn finalize_streaming_message(&mut self, full_text: impl Into<String>) -> OpStatus {
        if self.active_chat_id.is_none() {
            return OpStatus::Ignored;
        }
        let status = self.add_message(Role::Assistant, full_text).await;
        self.clear_streaming();
        status
    }

    fn clear_streaming(&mut self) {
        self.streaming_content.clear();
        self.is_streaming = false;
    }
}

fn most_recently_updated(chats: &HashMap<String, Chat>) -> Option<String> {
    chats
        .values()
        .max_by_key(|c| c.updated_at)
        .map(|c| c.id.clone())
}
