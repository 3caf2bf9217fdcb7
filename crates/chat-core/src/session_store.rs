//! Durable persistence of chat threads.
//!
//! All chats are serialized together as one JSON object (chat id → chat)
//! under a fixed storage key. Every function here is best-effort on the
//! persistence side: a failed write is logged and swallowed, never raised.
//! Reads of an absent or corrupt blob come back as an empty mapping.

use std::collections::HashMap;
use std::sync::Arc;

use chat_types::chat::{Chat, NEW_CHAT_TITLE};
use chat_types::message::Message;
use chat_types::ChatError;

use crate::ports::StoragePort;

/// Fixed key the serialized chat mapping lives under.
pub const CHATS_STORAGE_KEY: &str = "ai_assistant_chats";

pub struct SessionStore {
    storage: Arc<dyn StoragePort>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn StoragePort>) -> Self {
        Self { storage }
    }

    /// The deserialized chat mapping, or empty if absent or corrupt.
    pub async fn get_all_chats(&self) -> HashMap<String, Chat> {
        let blob = match self.storage.get(CHATS_STORAGE_KEY).await {
            Ok(Some(blob)) => blob,
            Ok(None) => return HashMap::new(),
            Err(e) => {
                log::error!("failed to read chats from {}: {e}", self.storage.backend_name());
                return HashMap::new();
            }
        };
        match serde_json::from_slice(&blob) {
            Ok(chats) => chats,
            Err(e) => {
                log::error!("stored chat mapping is corrupt, treating as empty: {e}");
                HashMap::new()
            }
        }
    }

    /// Get a specific chat by id.
    pub async fn get_chat(&self, id: &str) -> Option<Chat> {
        self.get_all_chats().await.remove(id)
    }

    /// Create a new empty chat, merge it into the stored mapping, and
    /// persist. Returns the new chat whether or not the persist succeeded.
    pub async fn create_chat(&self) -> Chat {
        let chat = Chat::new();
        let mut chats = self.get_all_chats().await;
        chats.insert(chat.id.clone(), chat.clone());
        self.persist(&chats).await;
        chat
    }

    /// Replace a chat's message sequence, bump `updated_at`, apply title
    /// derivation, and persist. Unknown ids are logged and ignored.
    pub async fn update_chat(&self, id: &str, messages: Vec<Message>) {
        let mut chats = self.get_all_chats().await;
        let Some(chat) = chats.get_mut(id) else {
            log::error!("update_chat: chat {id} not found");
            return;
        };
        chat.messages = messages;
        chat.touch();
        chat.maybe_derive_title();
        self.persist(&chats).await;
    }

    /// Remove a chat from the stored mapping and persist.
    pub async fn delete_chat(&self, id: &str) {
        let mut chats = self.get_all_chats().await;
        chats.remove(id);
        self.persist(&chats).await;
    }

    /// Empty a chat's messages, reset its title to the sentinel, bump
    /// `updated_at`, and persist. Unknown ids are logged and ignored.
    pub async fn clear_chat_messages(&self, id: &str) {
        let mut chats = self.get_all_chats().await;
        let Some(chat) = chats.get_mut(id) else {
            log::error!("clear_chat_messages: chat {id} not found");
            return;
        };
        chat.messages.clear();
        chat.title = NEW_CHAT_TITLE.to_string();
        chat.touch();
        self.persist(&chats).await;
    }

    /// Serialize and write the whole mapping. Failures are logged and
    /// swallowed; in-memory state stays authoritative for the session.
    async fn persist(&self, chats: &HashMap<String, Chat>) {
        let blob = match serde_json::to_vec(chats) {
            Ok(blob) => blob,
            Err(e) => {
                log::warn!("failed to serialize chat mapping: {e}");
                return;
            }
        };
        match self.storage.set(CHATS_STORAGE_KEY, &blob).await {
            Ok(()) => {}
            Err(ChatError::CapacityExceeded(size)) => {
                log::warn!(
                    "{} capacity exceeded ({size} bytes), chat mapping not persisted",
                    self.storage.backend_name()
                );
            }
            Err(e) => {
                log::warn!("failed to persist chat mapping: {e}");
            }
        }
    }
}
