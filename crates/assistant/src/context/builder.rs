//! Context building: records in, bounded system context out.
//!
//! [`RecordStats`] reduces the four record collections over a
//! [`DateWindow`] to a handful of figures. [`ContextBuilder`] renders those
//! figures, the persona, and an optional prior summary into one system
//! message. Both are pure and never fail: missing data renders as an
//! explicit "no data" line.

use chrono::{DateTime, Utc};
use dayloop_config::ContextConfig;
use dayloop_core::records::{DateWindow, UserRecords};
use dayloop_core::summary::PeriodSummary;
use std::collections::HashMap;
use std::fmt::Write;

pub const DEFAULT_PERSONA: &str = "You are Dayloop, a warm and concise personal assistant. \
You help the user reflect on their journal, habits, spending and climbing. \
Ground every observation in the figures below and never invent data.";

/// Spend in one expense category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySpend {
    pub category: String,
    pub amount: f64,
}

/// Aggregate figures for one window.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordStats {
    pub window: DateWindow,

    pub expense_count: usize,
    pub total_spend: f64,
    /// Highest spend first, at most `top_categories` entries
    pub top_categories: Vec<CategorySpend>,

    pub journal_count: usize,
    pub rated_count: usize,
    /// `None` when no entry in the window carries a rating
    pub average_rating: Option<f64>,
    /// The most recent journal text, cut to the excerpt cap
    pub latest_excerpt: Option<String>,

    pub activity_count: usize,
    pub activity_minutes: u32,
    pub activity_routes: u32,

    pub habit_count: usize,
    pub habits_completed: usize,
}

impl RecordStats {
    pub fn compute(
        records: &UserRecords,
        window: DateWindow,
        top_categories: usize,
        excerpt_chars: usize,
    ) -> Self {
        // Expenses
        let mut expense_count = 0;
        let mut total_spend = 0.0;
        let mut by_category: HashMap<&str, f64> = HashMap::new();
        for expense in window.select(&records.expenses) {
            expense_count += 1;
            total_spend += expense.amount;
            *by_category.entry(expense.category.as_str()).or_default() += expense.amount;
        }
        let mut ranked: Vec<CategorySpend> = by_category
            .into_iter()
            .map(|(category, amount)| CategorySpend {
                category: category.to_string(),
                amount,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.amount
                .total_cmp(&a.amount)
                .then_with(|| a.category.cmp(&b.category))
        });
        ranked.truncate(top_categories);

        // Journal
        let journal: Vec<_> = window.select(&records.journal).collect();
        let ratings: Vec<f64> = journal
            .iter()
            .filter_map(|entry| entry.rating)
            .map(f64::from)
            .collect();
        let average_rating = if ratings.is_empty() {
            None
        } else {
            Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
        };
        let latest_excerpt = journal
            .iter()
            .filter(|entry| !entry.content.trim().is_empty())
            .max_by_key(|entry| entry.date)
            .map(|entry| excerpt(entry.content.trim(), excerpt_chars));

        // Activities
        let mut activity_count = 0;
        let mut activity_minutes: u32 = 0;
        let mut activity_routes: u32 = 0;
        for session in window.select(&records.activities) {
            activity_count += 1;
            activity_minutes = activity_minutes.saturating_add(session.duration_minutes);
            activity_routes = activity_routes.saturating_add(session.routes);
        }

        // Habits
        let habits: Vec<_> = window.select(&records.habits).collect();
        let habits_completed = habits.iter().filter(|h| h.is_complete()).count();

        Self {
            window,
            expense_count,
            total_spend,
            top_categories: ranked,
            journal_count: journal.len(),
            rated_count: ratings.len(),
            average_rating,
            latest_excerpt,
            activity_count,
            activity_minutes,
            activity_routes,
            habit_count: habits.len(),
            habits_completed,
        }
    }

    /// Completed habit entries over all entries, in `[0, 1]`. Zero when empty.
    pub fn completion_rate(&self) -> f64 {
        if self.habit_count == 0 {
            0.0
        } else {
            self.habits_completed as f64 / self.habit_count as f64
        }
    }

    /// The mean rating as text, or "not available".
    pub fn rating_label(&self) -> String {
        match self.average_rating {
            Some(avg) => format!("{avg:.1}/5"),
            None => "not available".into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.expense_count == 0
            && self.journal_count == 0
            && self.activity_count == 0
            && self.habit_count == 0
    }

    /// The figures as bullet lines.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Data for {} ({} days):", self.window, self.window.days());

        if self.expense_count == 0 {
            out.push_str("- Spending: no data\n");
        } else {
            let categories = self
                .top_categories
                .iter()
                .map(|c| format!("{} ${:.2}", c.category, c.amount))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                out,
                "- Spending: ${:.2} across {} expenses. Top categories: {}",
                self.total_spend, self.expense_count, categories
            );
        }

        if self.journal_count == 0 {
            out.push_str("- Journal: no data\n");
        } else {
            let _ = writeln!(
                out,
                "- Journal: {} entries, average rating {}",
                self.journal_count,
                self.rating_label()
            );
        }

        if self.activity_count == 0 {
            out.push_str("- Climbing: no data\n");
        } else {
            let _ = writeln!(
                out,
                "- Climbing: {} sessions, {} minutes, {} routes",
                self.activity_count, self.activity_minutes, self.activity_routes
            );
        }

        if self.habit_count == 0 {
            out.push_str("- Habits: no data\n");
        } else {
            let _ = writeln!(
                out,
                "- Habits: {:.0}% complete ({} of {})",
                self.completion_rate() * 100.0,
                self.habits_completed,
                self.habit_count
            );
        }

        match &self.latest_excerpt {
            Some(text) => {
                let _ = writeln!(out, "- Latest journal excerpt: \"{text}\"");
            }
            None => out.push_str("- Latest journal excerpt: no data\n"),
        }

        out
    }
}

/// The first `max_chars` characters of `text`, never splitting a code point.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

/// Window size and rendering knobs.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub window_days: u32,
    pub top_categories: usize,
    pub excerpt_chars: usize,
    pub persona: String,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            window_days: 7,
            top_categories: 3,
            excerpt_chars: 280,
            persona: DEFAULT_PERSONA.into(),
        }
    }
}

impl From<&ContextConfig> for ContextOptions {
    fn from(config: &ContextConfig) -> Self {
        Self {
            window_days: config.window_days,
            top_categories: config.top_categories,
            excerpt_chars: config.excerpt_chars,
            persona: config
                .persona
                .clone()
                .unwrap_or_else(|| DEFAULT_PERSONA.into()),
        }
    }
}

/// The rendered system context with the figures behind it.
#[derive(Debug, Clone)]
pub struct BuiltContext {
    pub system: String,
    pub stats: RecordStats,
}

#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    options: ContextOptions,
}

impl ContextBuilder {
    pub fn new(options: ContextOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    /// The chat window: the trailing `window_days` ending today.
    pub fn chat_window(&self, now: DateTime<Utc>) -> DateWindow {
        DateWindow::trailing(now.date_naive(), self.options.window_days)
    }

    pub fn stats(&self, records: &UserRecords, window: DateWindow) -> RecordStats {
        RecordStats::compute(
            records,
            window,
            self.options.top_categories,
            self.options.excerpt_chars,
        )
    }

    /// Build the chat system context for `now`.
    pub fn build(
        &self,
        records: &UserRecords,
        now: DateTime<Utc>,
        prior: Option<&PeriodSummary>,
    ) -> BuiltContext {
        let stats = self.stats(records, self.chat_window(now));
        let system = self.render(&stats, prior);
        BuiltContext { system, stats }
    }

    /// Persona, figures, then the prior summary if any.
    pub fn render(&self, stats: &RecordStats, prior: Option<&PeriodSummary>) -> String {
        let mut out = String::new();
        out.push_str(&self.options.persona);
        out.push_str("\n\n");
        out.push_str(&stats.render());
        if let Some(summary) = prior {
            let _ = write!(
                out,
                "\nMost recent {} summary ({}):\n{}\n",
                summary.tier,
                summary.generated_at.format("%Y-%m-%d"),
                summary.content.trim()
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{day, week_of_records};
    use chrono::TimeZone;
    use dayloop_core::records::{ActivitySession, Expense, JournalEntry};
    use dayloop_core::summary::Tier;

    fn window() -> DateWindow {
        DateWindow::trailing(day("2026-03-07"), 7)
    }

    #[test]
    fn week_of_records_figures() {
        let stats = RecordStats::compute(&week_of_records(), window(), 3, 280);

        assert_eq!(stats.average_rating, Some(3.5));
        assert_eq!(stats.rating_label(), "3.5/5");
        assert!((stats.total_spend - 120.0).abs() < 1e-9);
        assert_eq!(stats.activity_count, 2);
        assert!((stats.completion_rate() - 0.8).abs() < 1e-9);
        assert_eq!(stats.top_categories.len(), 3);
        assert_eq!(stats.top_categories[0].category, "food");
    }

    #[test]
    fn oversized_activity_totals_saturate() {
        let session = |date: &str| ActivitySession {
            id: String::new(),
            date: day(date),
            duration_minutes: u32::MAX - 1,
            routes: u32::MAX,
            notes: None,
        };
        let records = UserRecords {
            activities: vec![session("2026-03-02"), session("2026-03-04")],
            ..UserRecords::default()
        };

        let stats = RecordStats::compute(&records, window(), 3, 280);

        assert_eq!(stats.activity_count, 2);
        assert_eq!(stats.activity_minutes, u32::MAX);
        assert_eq!(stats.activity_routes, u32::MAX);
    }

    #[test]
    fn zero_records_never_produce_nan() {
        let stats = RecordStats::compute(&UserRecords::default(), window(), 3, 280);
        assert_eq!(stats.completion_rate(), 0.0);
        assert_eq!(stats.rating_label(), "not available");
        assert!(stats.is_empty());

        let rendered = stats.render();
        assert!(!rendered.contains("NaN"));
        assert!(rendered.contains("- Spending: no data"));
        assert!(rendered.contains("- Habits: no data"));
    }

    #[test]
    fn unrated_entries_have_no_average() {
        let records = UserRecords {
            journal: vec![JournalEntry {
                id: String::new(),
                date: day("2026-03-05"),
                rating: None,
                content: "Rest day".into(),
            }],
            ..UserRecords::default()
        };
        let stats = RecordStats::compute(&records, window(), 3, 280);
        assert_eq!(stats.journal_count, 1);
        assert_eq!(stats.rating_label(), "not available");
    }

    #[test]
    fn top_categories_ranked_and_capped() {
        let expense = |category: &str, amount: f64| Expense {
            id: String::new(),
            date: day("2026-03-03"),
            amount,
            category: category.into(),
            description: None,
        };
        let records = UserRecords {
            expenses: vec![
                expense("books", 5.0),
                expense("gear", 50.0),
                expense("food", 20.0),
                expense("food", 15.0),
                expense("travel", 10.0),
            ],
            ..UserRecords::default()
        };
        let stats = RecordStats::compute(&records, window(), 2, 280);
        let names: Vec<_> = stats.top_categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["gear", "food"]);
        assert_eq!(stats.expense_count, 5);
    }

    #[test]
    fn window_edges_are_inclusive() {
        let at = |date: &str| Expense {
            id: String::new(),
            date: day(date),
            amount: 1.0,
            category: "misc".into(),
            description: None,
        };
        let records = UserRecords {
            expenses: vec![at("2026-02-28"), at("2026-03-01"), at("2026-03-07"), at("2026-03-08")],
            ..UserRecords::default()
        };
        let stats = RecordStats::compute(&records, window(), 3, 280);
        assert_eq!(stats.expense_count, 2);
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("héllo wörld", 5), "héllo");
        assert_eq!(excerpt("short", 100), "short");
        assert_eq!(excerpt("🧗🧗🧗", 2), "🧗🧗");
        assert_eq!(excerpt("anything", 0), "");
    }

    #[test]
    fn latest_excerpt_is_capped() {
        let records = UserRecords {
            journal: vec![
                JournalEntry {
                    id: String::new(),
                    date: day("2026-03-02"),
                    rating: Some(3),
                    content: "older entry".into(),
                },
                JournalEntry {
                    id: String::new(),
                    date: day("2026-03-06"),
                    rating: Some(4),
                    content: "é".repeat(50),
                },
            ],
            ..UserRecords::default()
        };
        let stats = RecordStats::compute(&records, window(), 3, 10);
        assert_eq!(stats.latest_excerpt.unwrap(), "é".repeat(10));
    }

    #[test]
    fn build_renders_persona_figures_and_prior_summary() {
        let builder = ContextBuilder::new(ContextOptions {
            persona: "You are a test persona.".into(),
            ..ContextOptions::default()
        });
        let now = Utc.with_ymd_and_hms(2026, 3, 7, 9, 0, 0).unwrap();
        let prior = PeriodSummary {
            tier: Tier::Daily,
            content: "Yesterday was steady.".into(),
            generated_at: Utc.with_ymd_and_hms(2026, 3, 7, 7, 0, 0).unwrap(),
        };

        let built = builder.build(&week_of_records(), now, Some(&prior));
        assert!(built.system.starts_with("You are a test persona."));
        assert!(built.system.contains("$120.00"));
        assert!(built.system.contains("3.5/5"));
        assert!(built.system.contains("80% complete"));
        assert!(built.system.contains("Yesterday was steady."));
        assert_eq!(built.stats.window, window());
    }
}
