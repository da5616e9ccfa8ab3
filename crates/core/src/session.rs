//! Chat sessions: one per calendar day of conversation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;

/// Unique identifier for a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A day's conversation with the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: SessionId,

    /// The calendar day this session belongs to
    pub date: NaiveDate,

    /// Ordered turns, oldest first
    #[serde(default)]
    pub messages: Vec<Message>,

    pub created_at: DateTime<Utc>,

    /// When the last turn was appended. Older records may lack it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ChatSession {
    /// Start an empty session for `date`.
    pub fn new(date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            date,
            messages: Vec::new(),
            created_at: now,
            updated_at: Some(now),
        }
    }

    /// Append a turn and bump `updated_at`.
    pub fn push(&mut self, message: Message, now: DateTime<Utc>) {
        self.messages.push(message);
        self.updated_at = Some(now);
    }

    /// The instant used to order sessions: `updated_at`, else the start of `date`.
    pub fn recency(&self) -> DateTime<Utc> {
        self.updated_at
            .unwrap_or_else(|| self.date.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}
