//! Retrying model invoker: bounded retries with failure-class-specific backoff.
//!
//! Every model call in Dayloop goes through [`RetryingInvoker::invoke`].
//! Failures are sorted into three classes:
//!
//! | Class | Examples | Backoff |
//! |-------|----------|---------|
//! | `RateLimited` | HTTP 429 | `base * 2^attempt`, capped |
//! | `TransientServer` | 5xx, network drop, attempt timeout | fixed short delay |
//! | `Fatal` | auth, malformed request, unknown model | none, returned at once |
//!
//! The invoker holds no per-call state, so one instance can serve any
//! number of concurrent requests.

use dayloop_core::error::ProviderError;
use dayloop_core::provider::{Provider, ProviderRequest, ProviderResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a provider failure is treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    RateLimited,
    TransientServer,
    Fatal,
}

impl FailureClass {
    pub fn of(err: &ProviderError) -> Self {
        match err {
            ProviderError::RateLimited { .. } => FailureClass::RateLimited,
            ProviderError::Timeout(_) | ProviderError::Network(_) => FailureClass::TransientServer,
            ProviderError::ApiError { status_code, .. }
                if *status_code >= 500 || *status_code == 408 =>
            {
                FailureClass::TransientServer
            }
            _ => FailureClass::Fatal,
        }
    }
}

/// Retry budget and delays.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    /// Rate-limit backoff base, doubled per attempt
    pub rate_limit_base: Duration,
    /// Fixed delay after a transient server failure
    pub server_backoff: Duration,
    /// Upper bound on any single delay
    pub max_backoff: Duration,
    /// Upper bound on a single attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            rate_limit_base: Duration::from_secs(1),
            server_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &dayloop_config::RetryConfig) -> Self {
        Self {
            retries: config.retries,
            rate_limit_base: Duration::from_millis(config.rate_limit_base_ms),
            server_backoff: Duration::from_millis(config.server_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            attempt_timeout: Duration::from_secs(config.attempt_timeout_secs),
        }
    }

    /// The delay before retrying after `attempt` (zero-based) failed with `class`.
    ///
    /// `None` means the failure is not retryable.
    pub fn backoff(&self, class: FailureClass, attempt: u32) -> Option<Duration> {
        match class {
            FailureClass::RateLimited => {
                let factor = 1u32 << attempt.min(16);
                Some(self.rate_limit_base.saturating_mul(factor).min(self.max_backoff))
            }
            FailureClass::TransientServer => Some(self.server_backoff.min(self.max_backoff)),
            FailureClass::Fatal => None,
        }
    }
}

/// Wraps a provider with the retry policy.
pub struct RetryingInvoker {
    provider: Arc<dyn Provider>,
    policy: RetryPolicy,
}

impl RetryingInvoker {
    pub fn new(provider: Arc<dyn Provider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    /// Override the retry count.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.policy.retries = retries;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Run `request`, retrying per the policy.
    ///
    /// Cancelling `cancel` aborts the in-flight attempt or backoff sleep
    /// immediately and yields [`ProviderError::Cancelled`].
    pub async fn invoke(
        &self,
        request: ProviderRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let provider_name = self.provider.name().to_string();
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }

            debug!(
                provider = %provider_name,
                model = %request.model,
                attempt = attempt + 1,
                "Invoking model"
            );

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                result = tokio::time::timeout(
                    self.policy.attempt_timeout,
                    self.provider.complete(request.clone()),
                ) => result,
            };

            let err = match outcome {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(e)) => e,
                Err(_) => ProviderError::Timeout(format!(
                    "Provider '{}' timed out after {}ms",
                    provider_name,
                    self.policy.attempt_timeout.as_millis()
                )),
            };

            let class = FailureClass::of(&err);
            let Some(delay) = self.policy.backoff(class, attempt) else {
                warn!(provider = %provider_name, error = %err, "Model call failed, not retryable");
                return Err(err);
            };

            if attempt >= self.policy.retries {
                warn!(
                    provider = %provider_name,
                    attempts = attempt + 1,
                    error = %err,
                    "Model call failed, retries exhausted"
                );
                return Err(err);
            }

            warn!(
                provider = %provider_name,
                attempt = attempt + 1,
                class = ?class,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Model call failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dayloop_core::message::Message;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// A provider that fails with scripted errors, then succeeds.
    struct FlakyProvider {
        failures: Mutex<Vec<ProviderError>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl FlakyProvider {
        fn new(failures: Vec<ProviderError>) -> Self {
            Self {
                failures: Mutex::new(failures),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            self.calls.lock().unwrap().push(Instant::now());
            let mut failures = self.failures.lock().unwrap();
            if failures.is_empty() {
                Ok(ProviderResponse {
                    message: Message::assistant("success"),
                    usage: None,
                    model: "test-model".into(),
                })
            } else {
                Err(failures.remove(0))
            }
        }
    }

    /// A provider that never answers (for timeout testing).
    struct HangingProvider {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl Provider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            retries: 2,
            rate_limit_base: Duration::from_millis(100),
            server_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(5),
        }
    }

    fn test_request() -> ProviderRequest {
        ProviderRequest::new("test", vec![Message::user("hello")])
    }

    fn rate_limited() -> ProviderError {
        ProviderError::RateLimited { retry_after_secs: 1 }
    }

    #[test]
    fn classification() {
        assert_eq!(FailureClass::of(&rate_limited()), FailureClass::RateLimited);
        assert_eq!(
            FailureClass::of(&ProviderError::ApiError {
                status_code: 502,
                message: String::new()
            }),
            FailureClass::TransientServer
        );
        assert_eq!(
            FailureClass::of(&ProviderError::Timeout("t".into())),
            FailureClass::TransientServer
        );
        assert_eq!(
            FailureClass::of(&ProviderError::AuthenticationFailed("k".into())),
            FailureClass::Fatal
        );
        assert_eq!(
            FailureClass::of(&ProviderError::InvalidRequest("m".into())),
            FailureClass::Fatal
        );
    }

    #[test]
    fn rate_limit_backoff_doubles_and_caps() {
        let p = policy();
        assert_eq!(p.backoff(FailureClass::RateLimited, 0), Some(Duration::from_millis(100)));
        assert_eq!(p.backoff(FailureClass::RateLimited, 1), Some(Duration::from_millis(200)));
        assert_eq!(p.backoff(FailureClass::RateLimited, 2), Some(Duration::from_millis(400)));
        assert_eq!(p.backoff(FailureClass::RateLimited, 30), Some(Duration::from_secs(10)));
        assert_eq!(p.backoff(FailureClass::TransientServer, 5), Some(Duration::from_millis(50)));
        assert_eq!(p.backoff(FailureClass::Fatal, 0), None);
    }

    #[tokio::test]
    async fn first_attempt_succeeds() {
        let provider = Arc::new(FlakyProvider::new(vec![]));
        let invoker = RetryingInvoker::new(provider.clone(), policy());
        let result = invoker.invoke(test_request(), &CancellationToken::new()).await;
        assert_eq!(result.unwrap().message.content, "success");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_twice_then_succeeds_with_growing_waits() {
        let provider = Arc::new(FlakyProvider::new(vec![rate_limited(), rate_limited()]));
        let invoker = RetryingInvoker::new(provider.clone(), policy());

        let result = invoker.invoke(test_request(), &CancellationToken::new()).await;
        assert!(result.is_ok());
        assert_eq!(provider.calls(), 3);

        let times = provider.call_times();
        let first_wait = times[1] - times[0];
        let second_wait = times[2] - times[1];
        assert!(first_wait >= Duration::from_millis(100));
        assert!(second_wait > first_wait);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_return_last_error() {
        let provider = Arc::new(FlakyProvider::new(vec![
            rate_limited(),
            rate_limited(),
            ProviderError::ApiError {
                status_code: 503,
                message: "down".into(),
            },
        ]));
        let invoker = RetryingInvoker::new(provider.clone(), policy());

        let result = invoker.invoke(test_request(), &CancellationToken::new()).await;
        match result.unwrap_err() {
            ProviderError::ApiError { status_code: 503, .. } => {}
            other => panic!("Expected 503 ApiError, got: {other:?}"),
        }
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let provider = Arc::new(FlakyProvider::new(vec![ProviderError::AuthenticationFailed(
            "bad key".into(),
        )]));
        let invoker = RetryingInvoker::new(provider.clone(), policy());

        let result = invoker.invoke(test_request(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(ProviderError::AuthenticationFailed(_))));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_timeout_counts_as_transient() {
        let provider = Arc::new(HangingProvider {
            calls: Mutex::new(0),
        });
        let mut p = policy();
        p.attempt_timeout = Duration::from_millis(50);
        let invoker = RetryingInvoker::new(provider.clone(), p).with_retries(1);

        let result = invoker.invoke(test_request(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(ProviderError::Timeout(_))));
        assert_eq!(*provider.calls.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_backoff_sleep() {
        let provider = Arc::new(FlakyProvider::new(vec![rate_limited()]));
        let mut p = policy();
        p.rate_limit_base = Duration::from_secs(3600);
        p.max_backoff = Duration::from_secs(3600);
        let invoker = RetryingInvoker::new(provider.clone(), p);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = invoker.invoke(test_request(), &cancel).await;
        assert!(matches!(result, Err(ProviderError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn cancelled_before_start_makes_no_call() {
        let provider = Arc::new(FlakyProvider::new(vec![]));
        let invoker = RetryingInvoker::new(provider.clone(), policy());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = invoker.invoke(test_request(), &cancel).await;
        assert!(matches!(result, Err(ProviderError::Cancelled)));
        assert_eq!(provider.calls(), 0);
    }
}
