//! # Dayloop Core
//!
//! Domain types, traits, and error definitions for the Dayloop assistant
//! orchestrator. This crate has **zero framework dependencies**: it defines
//! the domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every collaborator the orchestrator talks to is a trait here:
//! - [`Provider`] for language-model backends
//! - [`KvStore`] for summary and session persistence (local or remote)
//! - [`RecordSource`] for the user's journal, expense, activity and habit records
//!
//! Implementations live in their respective crates, so tests can swap in
//! scripted stand-ins and the orchestration logic never sees a vendor SDK.

pub mod error;
pub mod message;
pub mod provider;
pub mod records;
pub mod session;
pub mod store;
pub mod summary;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, StoreError};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use records::{
    ActivitySession, DateWindow, Dated, Expense, HabitProgress, JournalEntry, RecordSource,
    UserRecords,
};
pub use session::{ChatSession, SessionId};
pub use store::KvStore;
pub use summary::{CascadeSchedule, PeriodSummary, RunMarker, Tier};
