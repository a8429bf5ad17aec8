use std::time::Duration;

use async_trait::async_trait;

use super::{Completion, CompletionRequest, LanguageModel};
use crate::PrdflowError;
use crate::config::LlmConfig;

/// Backoff settings for transient model failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the first call
    pub max_retries: usize,
    /// Initial backoff duration in milliseconds
    pub initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30000,
        }
    }
}

impl From<&LlmConfig> for RetryPolicy {
    fn from(config: &LlmConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
        }
    }
}

/// Retries retryable failures of the wrapped model with exponential backoff.
pub struct RetryingModel<M> {
    inner: M,
    policy: RetryPolicy,
}

impl<M> RetryingModel<M> {
    pub fn new(inner: M, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<M: LanguageModel> LanguageModel for RetryingModel<M> {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, PrdflowError> {
        let mut attempt = 0;
        let mut backoff_ms = self.policy.initial_backoff_ms;

        loop {
            match self.inner.complete(request.clone()).await {
                Ok(completion) => return Ok(completion),
                Err(e) if attempt < self.policy.max_retries && e.is_retryable() => {
                    attempt += 1;
                    tracing::warn!(
                        role = %request.role,
                        operation = request.operation,
                        error = %e,
                        attempt = attempt,
                        backoff_ms = backoff_ms,
                        "Model call failed, retrying"
                    );

                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = (backoff_ms * 2).min(self.policy.max_backoff_ms);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentRole;
    use std::sync::Mutex;

    struct Flaky {
        failures: Mutex<Vec<PrdflowError>>,
        calls: Mutex<usize>,
    }

    impl Flaky {
        fn new(failures: Vec<PrdflowError>) -> Self {
            Self {
                failures: Mutex::new(failures),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LanguageModel for Flaky {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion, PrdflowError> {
            *self.calls.lock().unwrap() += 1;
            let mut failures = self.failures.lock().unwrap();
            if failures.is_empty() {
                Ok(Completion::text("ok"))
            } else {
                Err(failures.remove(0))
            }
        }
    }

    fn quick_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    fn throttled() -> PrdflowError {
        PrdflowError::Api {
            status: 429,
            message: "slow down".into(),
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new(AgentRole::Writer, "write.draft", "notes")
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let model = RetryingModel::new(Flaky::new(vec![throttled(), throttled()]), quick_policy(2));

        let completion = model.complete(request()).await.unwrap();

        assert_eq!(completion.text, "ok");
        assert_eq!(model.inner.calls(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let model = RetryingModel::new(
            Flaky::new(vec![throttled(), throttled(), throttled()]),
            quick_policy(1),
        );

        let err = model.complete(request()).await.unwrap_err();

        assert!(matches!(err, PrdflowError::Api { status: 429, .. }));
        assert_eq!(model.inner.calls(), 2);
    }

    #[tokio::test]
    async fn terminal_failures_are_not_retried() {
        let model = RetryingModel::new(
            Flaky::new(vec![PrdflowError::Api {
                status: 403,
                message: "API key not valid".into(),
            }]),
            quick_policy(3),
        );

        assert!(model.complete(request()).await.is_err());
        assert_eq!(model.inner.calls(), 1);
    }
}
