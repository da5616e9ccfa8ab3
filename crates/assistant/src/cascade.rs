//! Summary cascade: daily → weekly → monthly → quarterly → semi-annual → annual.
//!
//! [`SummaryCascade::run_due`] walks the tiers lowest first. A tier whose
//! run marker says it is due is regenerated: its window of records is
//! reduced to figures and themes, the next-lower tier's current summary
//! is embedded, the model is invoked, and the summary and marker are
//! overwritten.
//!
//! # Guarantees
//!
//! - The due check runs before any model call and again under the tier's
//!   lock, so a second run for the same `(tier, day)` makes no call.
//! - A failed tier is logged and reported. Its previous summary and marker
//!   stay as they were and the remaining tiers still run.
//! - A cancelled run writes nothing.

use chrono::{DateTime, Days, Utc};
use dayloop_core::error::Error;
use dayloop_core::message::Message;
use dayloop_core::provider::ProviderRequest;
use dayloop_core::records::{DateWindow, UserRecords};
use dayloop_core::summary::{CascadeSchedule, PeriodSummary, RunMarker, Tier};
use dayloop_providers::{ModelTiers, RetryingInvoker};
use dayloop_store::SummaryStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::ContextBuilder;
use crate::themes::{ThemeScorer, WordFrequencyScorer};

const THEME_COUNT: usize = 3;

/// What happened to one tier during a run.
#[derive(Debug)]
pub enum TierStatus {
    NotDue,
    Regenerated(PeriodSummary),
    Failed(Error),
}

#[derive(Debug)]
pub struct TierOutcome {
    pub tier: Tier,
    pub status: TierStatus,
}

/// The per-tier outcomes of one [`SummaryCascade::run_due`] call, lowest tier first.
#[derive(Debug, Default)]
pub struct CascadeReport {
    pub outcomes: Vec<TierOutcome>,
}

impl CascadeReport {
    pub fn status(&self, tier: Tier) -> Option<&TierStatus> {
        self.outcomes.iter().find(|o| o.tier == tier).map(|o| &o.status)
    }

    /// Remove and return the outcome for `tier`.
    pub fn take(&mut self, tier: Tier) -> Option<TierStatus> {
        let index = self.outcomes.iter().position(|o| o.tier == tier)?;
        Some(self.outcomes.remove(index).status)
    }

    pub fn regenerated(&self) -> Vec<Tier> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, TierStatus::Regenerated(_)))
            .map(|o| o.tier)
            .collect()
    }

    pub fn failed(&self) -> Vec<Tier> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, TierStatus::Failed(_)))
            .map(|o| o.tier)
            .collect()
    }
}

pub struct SummaryCascade {
    invoker: Arc<RetryingInvoker>,
    summaries: Arc<SummaryStore>,
    schedule: CascadeSchedule,
    models: ModelTiers,
    builder: ContextBuilder,
    scorer: Arc<dyn ThemeScorer>,
    temperature: f32,
    max_tokens: u32,
}

impl SummaryCascade {
    pub fn new(
        invoker: Arc<RetryingInvoker>,
        summaries: Arc<SummaryStore>,
        schedule: CascadeSchedule,
        models: ModelTiers,
        builder: ContextBuilder,
    ) -> Self {
        Self {
            invoker,
            summaries,
            schedule,
            models,
            builder,
            scorer: Arc::new(WordFrequencyScorer),
            temperature: 0.7,
            max_tokens: 1024,
        }
    }

    pub fn with_theme_scorer(mut self, scorer: Arc<dyn ThemeScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_generation(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn schedule(&self) -> &CascadeSchedule {
        &self.schedule
    }

    /// Deep model for monthly and above, quick below.
    pub fn model_for(&self, tier: Tier) -> &str {
        if tier >= Tier::Monthly {
            &self.models.deep
        } else {
            &self.models.quick
        }
    }

    /// The completed days a tier summarizes: its trailing window ending yesterday.
    pub fn window_for(tier: Tier, now: DateTime<Utc>) -> DateWindow {
        let today = now.date_naive();
        let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        DateWindow::trailing(yesterday, tier.window_days())
    }

    /// Whether `tier` is due on `now`.
    ///
    /// A stored summary counts as a run on its generation day even when its
    /// marker write was lost.
    pub async fn is_due(&self, tier: Tier, now: DateTime<Utc>) -> Result<bool, Error> {
        let marker = self
            .summaries
            .run_marker(tier)
            .await?
            .map(|m| m.last_run_date);
        let written = self
            .summaries
            .get(tier)
            .await?
            .map(|s| s.generated_at.date_naive());
        Ok(self
            .schedule
            .is_due(tier, now.date_naive(), marker.max(written)))
    }

    /// Tiers due on `now`, lowest first.
    pub async fn due_tiers(&self, now: DateTime<Utc>) -> Result<Vec<Tier>, Error> {
        let mut due = Vec::new();
        for tier in Tier::ALL {
            if self.is_due(tier, now).await? {
                due.push(tier);
            }
        }
        Ok(due)
    }

    /// Regenerate every due tier, lowest first.
    ///
    /// Only cancellation aborts the run; tier failures are reported in the
    /// [`CascadeReport`].
    pub async fn run_due(
        &self,
        records: &UserRecords,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<CascadeReport, Error> {
        let mut report = CascadeReport::default();

        for tier in Tier::ALL {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let status = match self.run_tier(tier, records, now, cancel).await {
                Ok(Some(summary)) => TierStatus::Regenerated(summary),
                Ok(None) => TierStatus::NotDue,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(tier = %tier, error = %e, "Tier regeneration failed, keeping previous summary");
                    TierStatus::Failed(e)
                }
            };
            report.outcomes.push(TierOutcome { tier, status });
        }

        let regenerated = report.regenerated();
        if !regenerated.is_empty() {
            info!(tiers = ?regenerated, "Summary cascade ran");
        }
        Ok(report)
    }

    /// Regenerate `tier` if due. `Ok(None)` means it was not due.
    pub async fn run_tier(
        &self,
        tier: Tier,
        records: &UserRecords,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Option<PeriodSummary>, Error> {
        if !self.is_due(tier, now).await? {
            return Ok(None);
        }

        let _guard = self.summaries.lock_tier(tier).await;
        if !self.is_due(tier, now).await? {
            debug!(tier = %tier, "Regenerated by a concurrent run");
            return Ok(None);
        }

        let summary = self.generate(tier, records, now, cancel).await?;
        self.commit(&summary, now, cancel).await?;
        Ok(Some(summary))
    }

    /// Regenerate `tier` now, whether or not it is due.
    pub async fn regenerate(
        &self,
        tier: Tier,
        records: &UserRecords,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<PeriodSummary, Error> {
        let _guard = self.summaries.lock_tier(tier).await;
        let summary = self.generate(tier, records, now, cancel).await?;
        self.commit(&summary, now, cancel).await?;
        Ok(summary)
    }

    async fn commit(
        &self,
        summary: &PeriodSummary,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.summaries.put(summary).await?;

        // The summary is the durable result; its generation date stands in
        // for a lost marker on the next due check.
        let marker = RunMarker {
            tier: summary.tier,
            last_run_date: now.date_naive(),
        };
        if let Err(e) = self.summaries.set_run_marker(&marker).await {
            warn!(tier = %summary.tier, error = %e, "Summary stored but run marker write failed");
        }
        Ok(())
    }

    /// Build the tier prompt and invoke the model. Writes nothing.
    async fn generate(
        &self,
        tier: Tier,
        records: &UserRecords,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<PeriodSummary, Error> {
        let window = Self::window_for(tier, now);
        let stats = self.builder.stats(records, window);

        let texts: Vec<&str> = window
            .select(&records.journal)
            .map(|entry| entry.content.as_str())
            .collect();
        let themes = self.scorer.themes(&texts, THEME_COUNT);

        let lower = match tier.lower() {
            Some(lower) => self.lower_summary(lower, now).await,
            None => None,
        };

        let mut system = self.builder.render(&stats, lower.as_ref());
        if themes.is_empty() {
            system.push_str("\nRecurring themes: no data\n");
        } else {
            system.push_str(&format!("\nRecurring themes: {}\n", themes.join(", ")));
        }

        let request = ProviderRequest::new(
            self.model_for(tier),
            vec![
                Message::system(system),
                Message::user(instruction(tier, window)),
            ],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens);

        debug!(tier = %tier, window = %window, model = %request.model, "Generating summary");
        let response = self.invoker.invoke(request, cancel).await?;

        let content = response.message.content.trim();
        if content.is_empty() {
            return Err(Error::ProviderUnavailable(format!(
                "model returned an empty {tier} summary"
            )));
        }

        Ok(PeriodSummary {
            tier,
            content: content.to_string(),
            generated_at: now,
        })
    }

    /// The lower tier's current summary, unless it postdates `now`.
    async fn lower_summary(&self, lower: Tier, now: DateTime<Utc>) -> Option<PeriodSummary> {
        match self.summaries.get(lower).await {
            Ok(Some(summary)) if summary.generated_at <= now => Some(summary),
            Ok(Some(summary)) => {
                debug!(tier = %lower, generated_at = %summary.generated_at, "Ignoring summary newer than this run");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(tier = %lower, error = %e, "Could not read lower-tier summary");
                None
            }
        }
    }
}

fn instruction(tier: Tier, window: DateWindow) -> String {
    match tier {
        Tier::Daily => format!(
            "Write the daily recap for {window}. Two or three sentences on mood, spending, \
             climbing and habits."
        ),
        Tier::Weekly => format!(
            "Write the weekly summary for {window}. Use the daily summary for recent detail \
             and the figures for the whole week. Call out one trend worth keeping and one to change."
        ),
        _ => {
            let lower = tier.lower().map(|t| t.as_str()).unwrap_or("previous");
            format!(
                "Write the {tier} summary for {window}. Build on the {lower} summary, \
                 focus on longer-term trends across journal, spending, climbing and habits, \
                 and keep it under 200 words."
            )
        }
    }
}
