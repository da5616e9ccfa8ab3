//! JSON record source: the dashboard's records exported to one file.
//!
//! The file holds a camelCase [`UserRecords`] document. It is re-read on
//! every call so edits made by the dashboard are picked up without a
//! restart. A missing file reads as an empty snapshot.

use async_trait::async_trait;
use dayloop_core::error::StoreError;
use dayloop_core::records::{
    ActivitySession, Expense, HabitProgress, JournalEntry, RecordSource, UserRecords,
};
use std::path::PathBuf;
use tracing::debug;

pub struct JsonRecordSource {
    path: PathBuf,
}

impl JsonRecordSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn snapshot(&self) -> Result<UserRecords, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No records file, using empty snapshot");
                return Ok(UserRecords::default());
            }
            Err(e) => {
                return Err(StoreError::Storage(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            key: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl RecordSource for JsonRecordSource {
    fn name(&self) -> &str {
        "json"
    }

    async fn list_journal_entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        Ok(self.snapshot().await?.journal)
    }

    async fn list_expenses(&self) -> Result<Vec<Expense>, StoreError> {
        Ok(self.snapshot().await?.expenses)
    }

    async fn list_activity_sessions(&self) -> Result<Vec<ActivitySession>, StoreError> {
        Ok(self.snapshot().await?.activities)
    }

    async fn list_habit_progress(&self) -> Result<Vec<HabitProgress>, StoreError> {
        Ok(self.snapshot().await?.habits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_camel_case_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(
            &path,
            r#"{
                "journal": [{"date": "2026-03-01", "rating": 5, "content": "Sent my project"}],
                "expenses": [{"date": "2026-03-01", "amount": 42.0, "category": "gear"}],
                "habits": [{"date": "2026-03-01", "habit": "stretch", "progress": 1, "target": 1}]
            }"#,
        )
        .unwrap();

        let source = JsonRecordSource::new(path);
        let records = UserRecords::load(&source).await.unwrap();
        assert_eq!(records.journal.len(), 1);
        assert_eq!(records.expenses[0].category, "gear");
        assert!(records.activities.is_empty());
        assert!(records.habits[0].is_complete());
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonRecordSource::new(dir.path().join("absent.json"));
        let records = UserRecords::load(&source).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn malformed_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(&path, "{ not json").unwrap();

        let source = JsonRecordSource::new(path);
        let result = source.list_expenses().await;
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }
}
