//! LLM provider plumbing for Dayloop.
//!
//! The HTTP client implements `dayloop_core::Provider`. Every call made by
//! the orchestrator goes through the [`RetryingInvoker`], and the
//! [`ComplexityRouter`] picks the model tier for chat requests.

pub mod openai_compat;
pub mod retry;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::{FailureClass, RetryPolicy, RetryingInvoker};
pub use router::{ComplexityRouter, ModelTiers, build_from_config, default_base_url};
