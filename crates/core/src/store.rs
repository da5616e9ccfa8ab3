//! KvStore trait: the persistence contract for summaries, markers and sessions.
//!
//! Values are JSON documents; typed wrappers in `dayloop-store` own the
//! (de)serialization. Remote implementations may additionally fail with
//! [`StoreError::Unauthorized`] or [`StoreError::Network`].

use async_trait::async_trait;

use crate::error::StoreError;

/// A key-value store.
///
/// Implementations: in-memory (testing), JSONL file (local cache), HTTP (remote).
#[async_trait]
pub trait KvStore: Send + Sync {
    /// The backend name (e.g., "memory", "file", "http").
    fn name(&self) -> &str;

    /// Fetch the value stored at `key`.
    async fn get(&self, key: &str) -> std::result::Result<Option<serde_json::Value>, StoreError>;

    /// Store `value` at `key`, replacing any previous value.
    async fn put(&self, key: &str, value: serde_json::Value) -> std::result::Result<(), StoreError>;

    /// Remove `key`. Returns whether a value was present.
    async fn delete(&self, key: &str) -> std::result::Result<bool, StoreError>;

    /// All entries whose key starts with `prefix`, ordered by key.
    async fn list(
        &self,
        prefix: &str,
    ) -> std::result::Result<Vec<(String, serde_json::Value)>, StoreError>;
}
