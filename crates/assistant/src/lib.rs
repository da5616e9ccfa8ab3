//! # Dayloop Assistant
//!
//! The orchestration layer: turns personal-data records into bounded
//! model requests, routes them to the right model tier, and keeps the
//! rolling hierarchy of period summaries up to date.
//!
//! The entry point is [`Assistant`].

pub mod assistant;
pub mod cascade;
pub mod context;
pub mod themes;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use assistant::{Assistant, ChatReply};
pub use cascade::{CascadeReport, SummaryCascade, TierOutcome, TierStatus};
pub use context::{ContextBuilder, ContextOptions, HistoryTrimmer, RecordStats};
pub use themes::{ThemeScorer, WordFrequencyScorer};
