//! Port traits — the boundary between core logic and platform adapters.
//!
//! These traits are defined here in `chat-core`. Implementations live in
//! `chat-platform`. The core never imports platform code; it only depends
//! on these traits.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use chat_types::Result;

// ─── Completion Port ─────────────────────────────────────────

/// One unit of a streaming completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionEvent {
    /// A partial token
    Delta(String),
    /// Stream finished normally
    Done,
    /// The upstream call failed; no Done follows
    Error(String),
}

pub type CompletionStream = Pin<Box<dyn Stream<Item = CompletionEvent> + Send>>;

/// The upstream completion source: given a prompt, produce a sequence of
/// text deltas terminated by an end signal.
pub trait CompletionPort: Send + Sync {
    fn stream_completion(&self, prompt: &str) -> CompletionStream;
}

// ─── Storage Port ────────────────────────────────────────────

/// Key-value persistence with bounded capacity.
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Get a value by key
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set a value
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Delete a value
    async fn delete(&self, key: &str) -> Result<()>;

    /// Name of this backend (for logging/debug)
    fn backend_name(&self) -> &str;
}
