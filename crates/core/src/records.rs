//! Personal-data records and the adapter contract that supplies them.
//!
//! The dashboard keeps four dated collections: journal entries, expenses,
//! climbing sessions, and habit progress. The core never filters at the
//! source; it loads everything through a [`RecordSource`] and windows
//! in-process with a [`DateWindow`].

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Anything that belongs to a single calendar day.
pub trait Dated {
    fn date(&self) -> NaiveDate;
}

/// A journal entry with an optional 1–5 self-rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    #[serde(default)]
    pub id: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default)]
    pub content: String,
}

/// A single expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(default)]
    pub id: String,
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_category() -> String {
    "uncategorized".into()
}

/// A climbing (or other activity) session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySession {
    #[serde(default)]
    pub id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub routes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One day's progress on one habit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitProgress {
    #[serde(default)]
    pub id: String,
    pub date: NaiveDate,
    pub habit: String,
    pub progress: f64,
    pub target: f64,
}

impl HabitProgress {
    pub fn is_complete(&self) -> bool {
        self.progress >= self.target
    }
}

macro_rules! impl_dated {
    ($($ty:ty),+) => {
        $(impl Dated for $ty {
            fn date(&self) -> NaiveDate {
                self.date
            }
        })+
    };
}

impl_dated!(JournalEntry, Expense, ActivitySession, HabitProgress);

/// An inclusive range of calendar days, `[start, end]`.
///
/// A record dated exactly `start` or exactly `end` is inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// The `days` calendar days ending on (and including) `end`.
    ///
    /// A zero-length request is treated as one day.
    pub fn trailing(end: NaiveDate, days: u32) -> Self {
        let span = u64::from(days.max(1) - 1);
        let start = end.checked_sub_days(Days::new(span)).unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of calendar days covered.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Items from `items` that fall inside this window, in input order.
    pub fn select<'a, T: Dated>(&self, items: &'a [T]) -> impl Iterator<Item = &'a T> + 'a {
        let window = *self;
        items.iter().filter(move |item| window.contains(item.date()))
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{} to {}", self.start, self.end)
        }
    }
}

/// The adapter contract for the hosted record store.
///
/// Each call returns every record of its kind; windowing is the core's job.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// A human-readable name for this source (e.g., "json", "memory").
    fn name(&self) -> &str;

    async fn list_journal_entries(&self) -> std::result::Result<Vec<JournalEntry>, StoreError>;

    async fn list_expenses(&self) -> std::result::Result<Vec<Expense>, StoreError>;

    async fn list_activity_sessions(
        &self,
    ) -> std::result::Result<Vec<ActivitySession>, StoreError>;

    async fn list_habit_progress(&self) -> std::result::Result<Vec<HabitProgress>, StoreError>;
}

/// A snapshot of all four collections for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecords {
    #[serde(default)]
    pub journal: Vec<JournalEntry>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub activities: Vec<ActivitySession>,
    #[serde(default)]
    pub habits: Vec<HabitProgress>,
}

impl UserRecords {
    /// Load a full snapshot from a record source.
    pub async fn load(source: &dyn RecordSource) -> std::result::Result<Self, StoreError> {
        Ok(Self {
            journal: source.list_journal_entries().await?,
            expenses: source.list_expenses().await?,
            activities: source.list_activity_sessions().await?,
            habits: source.list_habit_progress().await?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
            && self.expenses.is_empty()
            && self.activities.is_empty()
            && self.habits.is_empty()
    }

    /// Total number of records across all collections.
    pub fn len(&self) -> usize {
        self.journal.len() + self.expenses.len() + self.activities.len() + self.habits.len()
    }
}

#[async_trait]
impl RecordSource for UserRecords {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_journal_entries(&self) -> std::result::Result<Vec<JournalEntry>, StoreError> {
        Ok(self.journal.clone())
    }

    async fn list_expenses(&self) -> std::result::Result<Vec<Expense>, StoreError> {
        Ok(self.expenses.clone())
    }

    async fn list_activity_sessions(
        &self,
    ) -> std::result::Result<Vec<ActivitySession>, StoreError> {
        Ok(self.activities.clone())
    }

    async fn list_habit_progress(&self) -> std::result::Result<Vec<HabitProgress>, StoreError> {
        Ok(self.habits.clone())
    }
}
