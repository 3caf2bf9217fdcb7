//! In-memory storage backend.
//! Fastest option but not persistent across process restarts.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use chat_core::ports::StoragePort;
use chat_types::Result;

pub struct MemoryStorage {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoragePort for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.lock().expect("storage poisoned").get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.data
            .lock()
            .expect("storage poisoned")
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.lock().expect("storage poisoned").remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
