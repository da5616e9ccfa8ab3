//! Complexity routing and provider construction.
//!
//! [`ComplexityRouter`] asks a cheap model whether a user message needs the
//! deep tier. [`build_from_config`] turns an [`AppConfig`] into a provider.

use std::sync::Arc;

use dayloop_config::AppConfig;
use dayloop_core::error::Error;
use dayloop_core::message::Message;
use dayloop_core::provider::{Provider, ProviderRequest};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::RetryingInvoker;

const ROUTER_PROMPT: &str = "You are a request classifier for a personal analytics assistant. \
Reply with exactly one word. Reply DEEP if the user's message needs multi-step reasoning, \
comparisons across periods, planning, or careful analysis of their data. \
Reply QUICK for greetings, simple lookups, short factual questions, or small talk.";

/// The three configured model names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTiers {
    pub deep: String,
    pub quick: String,
    pub router: String,
}

impl ModelTiers {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            deep: config.models.deep.clone(),
            quick: config.models.quick.clone(),
            router: config.models.router.clone(),
        }
    }

    /// The model for a chat request.
    pub fn for_chat(&self, needs_deep: bool) -> &str {
        if needs_deep { &self.deep } else { &self.quick }
    }
}

/// Classifies one user message as deep or quick.
///
/// Never fails: any provider error, timeout, or unparseable answer is
/// logged as routing degradation and answered with `false`.
pub struct ComplexityRouter {
    invoker: Arc<RetryingInvoker>,
    model: String,
}

impl ComplexityRouter {
    pub fn new(invoker: Arc<RetryingInvoker>, model: impl Into<String>) -> Self {
        Self {
            invoker,
            model: model.into(),
        }
    }

    pub async fn needs_deep_tier(&self, message: &str, cancel: &CancellationToken) -> bool {
        let request = ProviderRequest::new(
            &self.model,
            vec![Message::system(ROUTER_PROMPT), Message::user(message)],
        )
        .with_temperature(0.0)
        .with_max_tokens(4);

        match self.invoker.invoke(request, cancel).await {
            Ok(response) => match parse_decision(&response.message.content) {
                Some(deep) => {
                    debug!(model = %self.model, deep, "Routed message");
                    deep
                }
                None => {
                    let degraded = Error::RoutingDegraded(format!(
                        "unparseable answer '{}'",
                        response.message.content.trim()
                    ));
                    warn!(error = %degraded, "Falling back to quick tier");
                    false
                }
            },
            Err(e) => {
                let degraded = Error::RoutingDegraded(e.to_string());
                warn!(error = %degraded, "Falling back to quick tier");
                false
            }
        }
    }
}

fn parse_decision(answer: &str) -> Option<bool> {
    let word = answer
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_ascii_lowercase();
    match word.as_str() {
        "deep" => Some(true),
        "quick" => Some(false),
        _ => None,
    }
}

/// Build the configured default provider.
///
/// The `[providers.<name>]` table wins over the top-level API key and the
/// well-known base URL.
pub fn build_from_config(config: &AppConfig) -> Arc<dyn Provider> {
    let name = config.default_provider.as_str();
    let provider_config = config.providers.get(name);

    let api_key = provider_config
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone())
        .unwrap_or_default();

    let base_url = provider_config
        .and_then(|p| p.api_url.clone())
        .unwrap_or_else(|| default_base_url(name));

    debug!(provider = name, base_url = %base_url, "Building provider");
    Arc::new(OpenAiCompatProvider::new(name, base_url, api_key))
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => "https://openrouter.ai/api/v1".into(),
    }
}
