//! Persistence for Dayloop.
//!
//! `KvStore` adapters (in-memory, JSONL file, HTTP remote), the JSON record
//! source, and the two typed stores built on top of them: the
//! [`SummaryStore`] and the [`SessionMergeStore`].

pub mod file_backend;
pub mod http;
pub mod in_memory;
pub mod records;
pub mod sessions;
pub mod summaries;

pub use file_backend::FileStore;
pub use http::HttpStore;
pub use in_memory::InMemoryStore;
pub use records::JsonRecordSource;
pub use sessions::{SessionMergeStore, merge};
pub use summaries::SummaryStore;
