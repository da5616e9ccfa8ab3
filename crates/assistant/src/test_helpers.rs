//! Shared test helpers: fixture records and scripted providers.

use async_trait::async_trait;
use chrono::NaiveDate;
use dayloop_core::error::ProviderError;
use dayloop_core::message::Message;
use dayloop_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use dayloop_core::records::{ActivitySession, Expense, HabitProgress, JournalEntry, UserRecords};
use std::sync::Mutex;
use std::time::Duration;

pub fn day(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

/// 2026-03-01 through 2026-03-07: average rating 3.5, $120 spend,
/// 2 climbing sessions, 8 of 10 habit entries complete.
pub fn week_of_records() -> UserRecords {
    let journal = [
        ("2026-03-01", 3, "Slow start to the month, planning the budget"),
        ("2026-03-03", 4, "Great climbing session, finally sent the overhang project"),
        ("2026-03-05", 3, "Tired. Shoulder sore from climbing"),
        ("2026-03-07", 4, "Good reading streak, shoulder feels better"),
    ]
    .into_iter()
    .map(|(date, rating, content)| JournalEntry {
        id: String::new(),
        date: day(date),
        rating: Some(rating),
        content: content.into(),
    })
    .collect();

    let expenses = [
        ("2026-03-02", 35.0, "food"),
        ("2026-03-04", 25.0, "food"),
        ("2026-03-04", 40.0, "gear"),
        ("2026-03-06", 20.0, "travel"),
    ]
    .into_iter()
    .map(|(date, amount, category)| Expense {
        id: String::new(),
        date: day(date),
        amount,
        category: category.into(),
        description: None,
    })
    .collect();

    let activities = ["2026-03-03", "2026-03-06"]
        .into_iter()
        .map(|date| ActivitySession {
            id: String::new(),
            date: day(date),
            duration_minutes: 90,
            routes: 6,
            notes: None,
        })
        .collect();

    let habits = (0..10)
        .map(|i| HabitProgress {
            id: String::new(),
            date: day("2026-03-01") + chrono::Days::new(i % 7),
            habit: if i % 2 == 0 { "read".into() } else { "stretch".into() },
            progress: if i < 8 { 1.0 } else { 0.0 },
            target: 1.0,
        })
        .collect();

    UserRecords {
        journal,
        expenses,
        activities,
        habits,
    }
}

pub fn make_text_response(text: &str, model: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: model.into(),
    }
}

type Script = Box<dyn Fn(&ProviderRequest) -> Result<String, ProviderError> + Send + Sync>;

/// A provider whose answers come from a closure over the request.
///
/// Records every request it receives. An optional per-call delay can be
/// derived from the request to exercise ordering.
pub struct ScriptedProvider {
    script: Script,
    delay: Box<dyn Fn(&ProviderRequest) -> Duration + Send + Sync>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(
        script: impl Fn(&ProviderRequest) -> Result<String, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            delay: Box::new(|_| Duration::ZERO),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answer `text`.
    pub fn fixed(text: &'static str) -> Self {
        Self::new(move |_| Ok(text.to_string()))
    }

    /// Always fail with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self::new(move |_| Err(error.clone()))
    }

    pub fn with_delay(
        mut self,
        delay: impl Fn(&ProviderRequest) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.delay = Box::new(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests for `model` only.
    pub fn requests_for(&self, model: &str) -> Vec<ProviderRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.model == model)
            .collect()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        let delay = (self.delay)(&request);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let text = (self.script)(&request)?;
        Ok(make_text_response(&text, &request.model))
    }
}

/// The content of the last user message in a request.
pub fn last_user_text(request: &ProviderRequest) -> &str {
    request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == dayloop_core::message::Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or_default()
}
