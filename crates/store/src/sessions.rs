//! Session Merge Store: reconciles the local cache with the remote store.
//!
//! The local cache is always written and always readable. The remote
//! store is authoritative when reachable. Reads merge both with remote
//! winning on `id`. Remote failures are logged and absorbed.

use chrono::NaiveDate;
use dayloop_core::error::StoreError;
use dayloop_core::records::DateWindow;
use dayloop_core::session::{ChatSession, SessionId};
use dayloop_core::store::KvStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const SESSION_PREFIX: &str = "sessions/";

/// Default number of trailing days kept in the local cache.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

pub struct SessionMergeStore {
    local: Arc<dyn KvStore>,
    remote: Option<Arc<dyn KvStore>>,
    retention_days: u32,
}

impl SessionMergeStore {
    /// Build a merge store. `remote` is `None` when no remote is configured.
    pub fn new(local: Arc<dyn KvStore>, remote: Option<Arc<dyn KvStore>>) -> Self {
        Self {
            local,
            remote,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days.max(1);
        self
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn key(id: &SessionId) -> String {
        format!("{SESSION_PREFIX}{id}")
    }

    /// All sessions from both stores, newest first.
    ///
    /// A remote failure degrades to the local cache alone.
    pub async fn list(&self) -> Result<Vec<ChatSession>, StoreError> {
        let remote_read = async {
            match &self.remote {
                Some(remote) => Some(read_all(remote.as_ref()).await),
                None => None,
            }
        };
        let (remote, local) = futures::join!(remote_read, read_all(self.local.as_ref()));

        let remote = match remote {
            Some(Ok(sessions)) => Some(sessions),
            Some(Err(e)) => {
                warn!(error = %e, "Remote session read failed, serving local cache");
                None
            }
            None => None,
        };

        let local = match (local, &remote) {
            (Ok(sessions), _) => sessions,
            (Err(e), Some(_)) => {
                warn!(error = %e, "Local session read failed, serving remote only");
                Vec::new()
            }
            (Err(e), None) => return Err(e),
        };

        Ok(merge(remote.unwrap_or_default(), local))
    }

    /// One session by id, preferring the remote copy.
    pub async fn get(&self, id: &SessionId) -> Result<Option<ChatSession>, StoreError> {
        let key = Self::key(id);
        if let Some(remote) = &self.remote {
            match remote.get(&key).await {
                Ok(Some(value)) => {
                    if let Some(session) = decode(&key, value) {
                        return Ok(Some(session));
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, session = %id, "Remote session get failed"),
            }
        }
        Ok(self.local.get(&key).await?.and_then(|v| decode(&key, v)))
    }

    /// The most recently updated session for `date`, if any.
    pub async fn session_for_day(&self, date: NaiveDate) -> Result<Option<ChatSession>, StoreError> {
        Ok(self.list().await?.into_iter().find(|s| s.date == date))
    }

    /// Write to the remote (best effort) and always to the local cache.
    pub async fn save(&self, session: &ChatSession) -> Result<(), StoreError> {
        let key = Self::key(&session.id);
        let value =
            serde_json::to_value(session).map_err(|e| StoreError::Storage(e.to_string()))?;

        if let Some(remote) = &self.remote
            && let Err(e) = remote.put(&key, value.clone()).await
        {
            warn!(error = %e, session = %session.id, "Remote session write failed");
        }

        self.local.put(&key, value).await?;
        debug!(session = %session.id, messages = session.messages.len(), "Session saved");

        if let Err(e) = self.prune_local(session.date).await {
            warn!(error = %e, "Local session prune failed");
        }
        Ok(())
    }

    /// Delete from the remote (best effort, not retried) and the local cache.
    pub async fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        let key = Self::key(id);
        let mut removed = false;

        if let Some(remote) = &self.remote {
            match remote.delete(&key).await {
                Ok(r) => removed |= r,
                Err(e) => warn!(error = %e, session = %id, "Remote session delete failed"),
            }
        }

        removed |= self.local.delete(&key).await?;
        Ok(removed)
    }

    /// Drop local sessions older than the retention window ending on `today`.
    ///
    /// Returns how many were removed. The remote copy is never touched.
    pub async fn prune_local(&self, today: NaiveDate) -> Result<usize, StoreError> {
        let window = DateWindow::trailing(today, self.retention_days);
        let mut removed = 0;
        for session in read_all(self.local.as_ref()).await? {
            if session.date < window.start && self.local.delete(&Self::key(&session.id)).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, keep_from = %window.start, "Pruned local sessions");
        }
        Ok(removed)
    }
}

/// Merge remote and local sessions: remote wins on `id`, newest first.
pub fn merge(remote: Vec<ChatSession>, local: Vec<ChatSession>) -> Vec<ChatSession> {
    let mut by_id: HashMap<SessionId, ChatSession> = HashMap::new();
    for session in remote {
        by_id.insert(session.id.clone(), session);
    }
    for session in local {
        by_id.entry(session.id.clone()).or_insert(session);
    }

    let mut sessions: Vec<ChatSession> = by_id.into_values().collect();
    sessions.sort_by(|a, b| b.recency().cmp(&a.recency()).then_with(|| a.id.cmp(&b.id)));
    sessions
}

async fn read_all(store: &dyn KvStore) -> Result<Vec<ChatSession>, StoreError> {
    Ok(store
        .list(SESSION_PREFIX)
        .await?
        .into_iter()
        .filter_map(|(key, value)| decode(&key, value))
        .collect())
}

fn decode(key: &str, value: serde_json::Value) -> Option<ChatSession> {
    match serde_json::from_value(value) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(key, error = %e, "Skipping unreadable session");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryStore;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use dayloop_core::message::Message;
    use serde_json::Value;

    /// A remote that always fails.
    struct UnreachableStore;

    #[async_trait]
    impl KvStore for UnreachableStore {
        fn name(&self) -> &str {
            "unreachable"
        }
        async fn get(&self, _key: &str) -> Result<Option<Value>, StoreError> {
            Err(StoreError::Network("connection refused".into()))
        }
        async fn put(&self, _key: &str, _value: Value) -> Result<(), StoreError> {
            Err(StoreError::Unauthorized("expired token".into()))
        }
        async fn delete(&self, _key: &str) -> Result<bool, StoreError> {
            Err(StoreError::Network("connection refused".into()))
        }
        async fn list(&self, _prefix: &str) -> Result<Vec<(String, Value)>, StoreError> {
            Err(StoreError::Network("connection refused".into()))
        }
    }

    /// A local cache that stores writes but cannot enumerate them.
    struct UnlistableStore(InMemoryStore);

    #[async_trait]
    impl KvStore for UnlistableStore {
        fn name(&self) -> &str {
            "unlistable"
        }
        async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
            self.0.get(key).await
        }
        async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
            self.0.put(key, value).await
        }
        async fn delete(&self, key: &str) -> Result<bool, StoreError> {
            self.0.delete(key).await
        }
        async fn list(&self, _prefix: &str) -> Result<Vec<(String, Value)>, StoreError> {
            Err(StoreError::Storage("directory unreadable".into()))
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap()
    }

    fn session(id: &str, updated_hour: u32) -> ChatSession {
        ChatSession {
            id: SessionId::from(id),
            date: at(0).date_naive(),
            messages: vec![Message::user(format!("{id}@{updated_hour}"))],
            created_at: at(0),
            updated_at: Some(at(updated_hour)),
        }
    }

    async fn put(store: &InMemoryStore, s: &ChatSession) {
        store
            .put(&SessionMergeStore::key(&s.id), serde_json::to_value(s).unwrap())
            .await
            .unwrap();
    }

    #[test]
    fn merge_prefers_remote_and_sorts_newest_first() {
        let merged = merge(
            vec![session("a", 5)],
            vec![session("a", 1), session("b", 3)],
        );
        let ids: Vec<_> = merged.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(merged[0].updated_at, Some(at(5)));
        assert_eq!(merged[1].updated_at, Some(at(3)));
    }

    #[test]
    fn merge_falls_back_to_date_for_ordering() {
        let mut old = session("old", 0);
        old.updated_at = None;
        old.date = "2026-02-01".parse().unwrap();
        let merged = merge(vec![], vec![old, session("new", 1)]);
        assert_eq!(merged[0].id.as_str(), "new");
    }

    #[tokio::test]
    async fn list_merges_both_stores() {
        let local = Arc::new(InMemoryStore::new());
        let remote = Arc::new(InMemoryStore::new());
        put(&remote, &session("a", 5)).await;
        put(&local, &session("a", 1)).await;
        put(&local, &session("b", 3)).await;

        let store = SessionMergeStore::new(local, Some(remote));
        let sessions = store.list().await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].messages[0].content, "a@5");
    }

    #[tokio::test]
    async fn remote_failure_serves_local_only() {
        let local = Arc::new(InMemoryStore::new());
        put(&local, &session("b", 3)).await;

        let store = SessionMergeStore::new(local, Some(Arc::new(UnreachableStore)));
        let sessions = store.list().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id.as_str(), "b");

        let fetched = store.get(&SessionId::from("b")).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn save_always_writes_local() {
        let local = Arc::new(InMemoryStore::new());
        let store = SessionMergeStore::new(local.clone(), Some(Arc::new(UnreachableStore)));

        store.save(&session("a", 2)).await.unwrap();
        assert!(local.get("sessions/a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn save_writes_remote_when_reachable() {
        let local = Arc::new(InMemoryStore::new());
        let remote = Arc::new(InMemoryStore::new());
        let store = SessionMergeStore::new(local, Some(remote.clone()));

        store.save(&session("a", 2)).await.unwrap();
        assert!(remote.get("sessions/a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_is_best_effort_remotely() {
        let local = Arc::new(InMemoryStore::new());
        put(&local, &session("a", 1)).await;
        let store = SessionMergeStore::new(local.clone(), Some(Arc::new(UnreachableStore)));

        assert!(store.delete(&SessionId::from("a")).await.unwrap());
        assert!(local.is_empty().await);
    }

    #[tokio::test]
    async fn session_for_day_finds_todays_session() {
        let local = Arc::new(InMemoryStore::new());
        put(&local, &session("today", 4)).await;
        let store = SessionMergeStore::new(local, None);

        let found = store.session_for_day(at(0).date_naive()).await.unwrap();
        assert_eq!(found.unwrap().id.as_str(), "today");
        let missing = store.session_for_day("2026-01-01".parse().unwrap()).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn prune_keeps_trailing_window_locally() {
        let local = Arc::new(InMemoryStore::new());
        let remote = Arc::new(InMemoryStore::new());

        let mut stale = session("stale", 1);
        stale.date = "2026-01-15".parse().unwrap();
        let mut edge = session("edge", 1);
        edge.date = "2026-02-01".parse().unwrap();
        put(&local, &stale).await;
        put(&local, &edge).await;
        put(&remote, &stale).await;

        let store = SessionMergeStore::new(local.clone(), Some(remote.clone())).with_retention_days(30);
        let removed = store.prune_local("2026-03-02".parse().unwrap()).await.unwrap();

        assert_eq!(removed, 1);
        assert!(local.get("sessions/stale").await.unwrap().is_none());
        assert!(local.get("sessions/edge").await.unwrap().is_some());
        assert!(remote.get("sessions/stale").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn save_succeeds_when_prune_fails() {
        let local = Arc::new(UnlistableStore(InMemoryStore::new()));
        let store = SessionMergeStore::new(local.clone(), None);

        store.save(&session("today", 9)).await.unwrap();

        assert!(local.get("sessions/today").await.unwrap().is_some());
    }
}
