//! The chat boundary: everything the dashboard calls.
//!
//! An [`Assistant`] owns the context builder, history trimmer, complexity
//! router, retrying invoker and summary cascade, plus the two stores.
//! Each request follows the same path:
//!
//! ```text
//! records ─▶ ContextBuilder ─▶ HistoryTrimmer ─▶ ComplexityRouter ─▶ RetryingInvoker ─▶ reply
//! ```
//!
//! Conversations are grouped into one session per calendar day. Requests
//! for the same day's session are served strictly in arrival order.

use chrono::{DateTime, NaiveDate, Utc};
use dayloop_config::AppConfig;
use dayloop_core::error::Error;
use dayloop_core::message::Message;
use dayloop_core::provider::{Provider, ProviderRequest};
use dayloop_core::records::UserRecords;
use dayloop_core::session::{ChatSession, SessionId};
use dayloop_core::store::KvStore;
use dayloop_core::summary::{CascadeSchedule, PeriodSummary, Tier};
use dayloop_providers::{ComplexityRouter, ModelTiers, RetryPolicy, RetryingInvoker};
use dayloop_store::{SessionMergeStore, SummaryStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cascade::{CascadeReport, SummaryCascade, TierStatus};
use crate::context::{ContextBuilder, ContextOptions, HistoryTrimmer};
use crate::themes::ThemeScorer;

/// Upper bound on a single routing attempt.
const ROUTER_TIMEOUT: Duration = Duration::from_secs(15);

/// The reply to a session-backed chat turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub session_id: SessionId,
    pub reply: String,
}

pub struct Assistant {
    invoker: Arc<RetryingInvoker>,
    router: ComplexityRouter,
    models: ModelTiers,
    builder: ContextBuilder,
    trimmer: HistoryTrimmer,
    cascade: SummaryCascade,
    summaries: Arc<SummaryStore>,
    sessions: Arc<SessionMergeStore>,
    lanes: Mutex<HashMap<NaiveDate, Arc<Mutex<()>>>>,
    temperature: f32,
    max_tokens: u32,
}

impl Assistant {
    /// Wire an assistant from configuration and injected collaborators.
    pub fn new(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        summary_store: Arc<dyn KvStore>,
        sessions: SessionMergeStore,
    ) -> Result<Self, Error> {
        let week_start = config.cascade.week_start_day().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;

        let policy = RetryPolicy::from_config(&config.retry);
        let mut router_policy = policy.clone();
        router_policy.attempt_timeout = router_policy.attempt_timeout.min(ROUTER_TIMEOUT);

        let invoker = Arc::new(RetryingInvoker::new(provider.clone(), policy));
        let router_invoker = Arc::new(RetryingInvoker::new(provider, router_policy).with_retries(0));

        let models = ModelTiers::from_config(config);
        let builder = ContextBuilder::new(ContextOptions::from(&config.context));
        let summaries = Arc::new(SummaryStore::new(summary_store));

        let cascade = SummaryCascade::new(
            invoker.clone(),
            summaries.clone(),
            CascadeSchedule {
                week_start,
                catch_up_missed: config.cascade.catch_up_missed,
            },
            models.clone(),
            builder.clone(),
        )
        .with_generation(config.default_temperature, config.default_max_tokens);

        Ok(Self {
            invoker,
            router: ComplexityRouter::new(router_invoker, models.router.clone()),
            models,
            builder,
            trimmer: HistoryTrimmer::new(config.budget.total_tokens, config.budget.reply_reserve),
            cascade,
            summaries,
            sessions: Arc::new(sessions),
            lanes: Mutex::new(HashMap::new()),
            temperature: config.default_temperature,
            max_tokens: config.default_max_tokens,
        })
    }

    /// Swap the theme scorer used by summary rollups.
    pub fn with_theme_scorer(mut self, scorer: Arc<dyn ThemeScorer>) -> Self {
        self.cascade = self.cascade.with_theme_scorer(scorer);
        self
    }

    pub fn cascade(&self) -> &SummaryCascade {
        &self.cascade
    }

    pub fn summaries(&self) -> &SummaryStore {
        &self.summaries
    }

    pub fn sessions(&self) -> &SessionMergeStore {
        &self.sessions
    }

    /// Answer `text` given prior turns and the user's records.
    ///
    /// Returns only the new assistant content; persisting the turn is the
    /// caller's business (see [`Assistant::chat`]).
    pub async fn send_message(
        &self,
        text: &str,
        history: &[Message],
        records: &UserRecords,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        let prior = self.current_summary(Tier::Daily, now).await;
        let context = self.builder.build(records, now, prior.as_ref());
        let trimmed = self.trimmer.trim(&context.system, text, history);

        let deep = self.router.needs_deep_tier(text, cancel).await;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut messages = Vec::with_capacity(trimmed.turns.len() + 2);
        messages.push(Message::system(context.system));
        messages.extend(trimmed.turns.iter().cloned());
        messages.push(Message::user(text));

        let request = ProviderRequest::new(self.models.for_chat(deep), messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        debug!(
            model = %request.model,
            deep,
            history_kept = trimmed.turns.len(),
            history_dropped = trimmed.dropped,
            estimated_tokens = trimmed.used_tokens,
            "Sending chat request"
        );

        let response = self.invoker.invoke(request, cancel).await?;
        if let Some(usage) = &response.usage {
            debug!(total_tokens = usage.total_tokens, model = %response.model, "Chat usage");
        }
        Ok(response.message.content)
    }

    /// Run one session-backed exchange on today's session.
    ///
    /// The first exchange of a day regenerates the daily summary before
    /// answering. Loads or creates the day's session, answers with its
    /// messages as history, appends both turns and saves. Holds the
    /// session's lane for the whole exchange.
    pub async fn chat(
        &self,
        text: &str,
        records: &UserRecords,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<ChatReply, Error> {
        let today = now.date_naive();
        let lane = self.lane(today).await;
        let _turn = lane.lock().await;

        self.refresh_daily(records, now, cancel).await?;

        let mut session = match self.sessions.session_for_day(today).await? {
            Some(session) => session,
            None => {
                debug!(date = %today, "Starting a new session");
                ChatSession::new(today, now)
            }
        };

        let reply = self
            .send_message(text, &session.messages, records, now, cancel)
            .await?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        session.push(Message::user(text).at(now), now);
        session.push(Message::assistant(reply.clone()).at(now), now);
        self.sessions.save(&session).await?;

        Ok(ChatReply {
            session_id: session.id,
            reply,
        })
    }

    /// The recap shown when the dashboard opens.
    ///
    /// Runs every due cascade tier first. A failed daily regeneration falls
    /// back to the stored daily summary and only errors when there is none.
    pub async fn opening_recap(
        &self,
        records: &UserRecords,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        let mut report = self.cascade.run_due(records, now, cancel).await?;

        match report.take(Tier::Daily) {
            Some(TierStatus::Regenerated(summary)) => Ok(summary.content),
            Some(TierStatus::Failed(error)) => match self.summaries.get(Tier::Daily).await {
                Ok(Some(stale)) => {
                    warn!(error = %error, generated_at = %stale.generated_at, "Serving stale daily recap");
                    Ok(stale.content)
                }
                _ => Err(error),
            },
            Some(TierStatus::NotDue) | None => match self.summaries.get(Tier::Daily).await? {
                Some(summary) => Ok(summary.content),
                None => self.generate_daily_recap(records, now, cancel).await,
            },
        }
    }

    /// Regenerate the daily summary now and return its text.
    pub async fn generate_daily_recap(
        &self,
        records: &UserRecords,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        let summary = self.cascade.regenerate(Tier::Daily, records, now, cancel).await?;
        info!(chars = summary.content.len(), "Daily recap generated");
        Ok(summary.content)
    }

    /// Run every due cascade tier.
    pub async fn run_due_cascades(
        &self,
        records: &UserRecords,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<CascadeReport, Error> {
        self.cascade.run_due(records, now, cancel).await
    }

    /// Regenerate the daily summary if due.
    ///
    /// Only cancellation is returned; a failed regeneration leaves the
    /// previous daily summary in place for the chat context.
    async fn refresh_daily(
        &self,
        records: &UserRecords,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        match self.cascade.run_tier(Tier::Daily, records, now, cancel).await {
            Ok(Some(_)) => debug!(date = %now.date_naive(), "Daily summary refreshed before chat"),
            Ok(None) => {}
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => warn!(error = %e, "Daily summary refresh failed, using the previous one"),
        }
        Ok(())
    }

    /// The FIFO lane for `date`'s session.
    ///
    /// Lanes for earlier days are dropped once nobody holds them.
    async fn lane(&self, date: NaiveDate) -> Arc<Mutex<()>> {
        let mut lanes = self.lanes.lock().await;
        lanes.retain(|day, lane| *day >= date || Arc::strong_count(lane) > 1);
        lanes.entry(date).or_default().clone()
    }

    /// The stored summary at `tier`, unless unreadable or newer than `now`.
    async fn current_summary(&self, tier: Tier, now: DateTime<Utc>) -> Option<PeriodSummary> {
        match self.summaries.get(tier).await {
            Ok(summary) => summary.filter(|s| s.generated_at <= now),
            Err(e) => {
                warn!(tier = %tier, error = %e, "Could not read summary for context");
                None
            }
        }
    }
}
