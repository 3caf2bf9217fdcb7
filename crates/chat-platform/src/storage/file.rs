//! File-backed storage: one file per key under a data directory.
//!
//! An optional byte capacity mirrors the bounded storage medium the session
//! store is written against; oversized writes fail with
//! [`ChatError::CapacityExceeded`] and the caller decides what to log.

use std::path::PathBuf;

use async_trait::async_trait;

use chat_core::ports::StoragePort;
use chat_types::{ChatError, Result};

pub struct FileStorage {
    root: PathBuf,
    capacity: Option<usize>,
}

impl FileStorage {
    /// Open (creating if needed) a storage directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| ChatError::Storage(format!("create {}: {e}", root.display())))?;
        log::info!("file storage at {}", root.display());
        Ok(Self {
            root,
            capacity: None,
        })
    }

    /// Open the default per-user data directory.
    pub fn open_default() -> Result<Self> {
        let base = dirs::data_dir()
            .ok_or_else(|| ChatError::Storage("no data directory on this platform".to_string()))?;
        Self::open(base.join("chat-relay"))
    }

    /// Cap the size of any single value, in bytes.
    pub fn with_capacity(mut self, bytes: usize) -> Self {
        self.capacity = Some(bytes);
        self
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are storage identifiers, not paths; keep them filename-safe.
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.root.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl StoragePort for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ChatError::Storage(format!("read {}: {e}", path.display()))),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        if let Some(capacity) = self.capacity {
            if value.len() > capacity {
                return Err(ChatError::CapacityExceeded(value.len()));
            }
        }
        let path = self.path_for(key);
        tokio::fs::write(&path, value)
            .await
            .map_err(|e| ChatError::Storage(format!("write {}: {e}", path.display())))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ChatError::Storage(format!("delete {}: {e}", path.display()))),
        }
    }

    fn backend_name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        assert!(storage.get("chats").await.unwrap().is_none());
        storage.set("chats", b"{\"a\":1}").await.unwrap();
        assert_eq!(storage.get("chats").await.unwrap().unwrap(), b"{\"a\":1}");

        storage.delete("chats").await.unwrap();
        assert!(storage.get("chats").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        storage.delete("never_written").await.unwrap();
    }

    #[tokio::test]
    async fn test_capacity_limit_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap().with_capacity(4);

        storage.set("k", b"1234").await.unwrap();
        let err = storage.set("k", b"12345").await.unwrap_err();
        assert!(matches!(err, ChatError::CapacityExceeded(5)));
        // The previous value is untouched.
        assert_eq!(storage.get("k").await.unwrap().unwrap(), b"1234");
    }

    #[tokio::test]
    async fn test_keys_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        storage.set("../escape/attempt", b"x").await.unwrap();
        // Whatever the key looked like, the file stays under root.
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
