//! File-based store: persistent JSON-lines storage for the local cache.
//!
//! Each line is one `{"key": ..., "value": ...}` record. The whole file is
//! loaded on creation and rewritten on every mutation, which keeps reads
//! fast and writes durable at the sizes a personal dashboard produces.
//!
//! Storage location: `~/.dayloop/store.jsonl`

use async_trait::async_trait;
use dayloop_core::error::StoreError;
use dayloop_core::store::KvStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Serialize, Deserialize)]
struct Line {
    key: String,
    value: Value,
}

/// A file-backed `KvStore` using JSONL (one entry per line).
pub struct FileStore {
    path: PathBuf,
    entries: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// A missing file starts empty and is created on first write.
    pub fn new(path: PathBuf) -> Self {
        let entries = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = entries.len(), "File store loaded");
        Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> BTreeMap<String, Value> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return BTreeMap::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<Line>(line) {
                Ok(entry) => Some((entry.key, entry.value)),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted store line");
                    None
                }
            })
            .collect()
    }

    /// Sibling file each flush is staged in before it replaces the store.
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Rewrite the whole file from `entries`.
    ///
    /// Callers hold the write lock across the flush, so snapshots are
    /// written in mutation order. The file is replaced by rename and is
    /// never left half-written.
    async fn flush(&self, entries: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Storage(format!("Failed to create store directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for (key, value) in entries.iter() {
            let line = serde_json::to_string(&Line {
                key: key.clone(),
                value: value.clone(),
            })
            .map_err(|e| StoreError::Storage(format!("Failed to serialize entry: {e}")))?;
            content.push_str(&line);
            content.push('\n');
        }

        let staging = self.staging_path();
        tokio::fs::write(&staging, &content)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to write store file: {e}")))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to replace store file: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl KvStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value);
        self.flush(&entries).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(key).is_some();
        if removed {
            self.flush(&entries).await?;
        }
        Ok(removed)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_path() -> PathBuf {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp);
        path
    }

    #[tokio::test]
    async fn put_persists_across_reopen() {
        let path = temp_path();

        let store = FileStore::new(path.clone());
        store
            .put("summaries/daily", json!({"content": "A calm day"}))
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("A calm day"));

        let reopened = FileStore::new(path);
        let value = reopened.get("summaries/daily").await.unwrap().unwrap();
        assert_eq!(value["content"], "A calm day");
    }

    #[tokio::test]
    async fn delete_persists() {
        let path = temp_path();

        let store = FileStore::new(path.clone());
        store.put("sessions/a", json!(1)).await.unwrap();
        assert!(store.delete("sessions/a").await.unwrap());

        let reopened = FileStore::new(path);
        assert!(reopened.get("sessions/a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.jsonl");

        let store = FileStore::new(path.clone());
        store.put("k", json!("v")).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn handles_missing_file_gracefully() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("absent.jsonl"));
        assert!(store.list("").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_leave_file_matching_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.jsonl");
        let store = Arc::new(FileStore::new(path.clone()));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let key = format!("sessions/{}", i % 4);
                    if i % 3 == 0 {
                        store.delete(&key).await.unwrap();
                    } else {
                        store.put(&key, json!(i)).await.unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let reopened = FileStore::new(path);
        assert_eq!(
            reopened.list("").await.unwrap(),
            store.list("").await.unwrap()
        );
        assert!(!store.staging_path().exists());
    }

    #[tokio::test]
    async fn flush_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.jsonl");
        let store = FileStore::new(path.clone());
        store.put("a", json!(1)).await.unwrap();
        store.put("b", json!(2)).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["store.jsonl"]);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[tokio::test]
    async fn skips_corrupted_lines() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, r#"{{"key":"sessions/a","value":1}}"#).unwrap();
        writeln!(tmp, "this is not json").unwrap();
        writeln!(tmp, r#"{{"key":"sessions/b","value":2}}"#).unwrap();

        let store = FileStore::new(tmp.path().to_path_buf());
        assert_eq!(store.list("sessions/").await.unwrap().len(), 2);
    }
}
