//! Request shaping: token estimates, the system context, and the history window.
//!
//! | Piece | Input | Output |
//! |-------|-------|--------|
//! | [`token`] | text | estimated tokens |
//! | [`builder`] | records + window | figures + system context |
//! | [`trimmer`] | context + message + history | kept suffix of history |

pub mod builder;
pub mod token;
pub mod trimmer;

pub use builder::{
    BuiltContext, CategorySpend, ContextBuilder, ContextOptions, DEFAULT_PERSONA, RecordStats,
    excerpt,
};
pub use trimmer::{HistoryTrimmer, TrimmedHistory};
