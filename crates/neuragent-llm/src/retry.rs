use std::time::Duration;

use futures::future::BoxFuture;
use tracing::warn;

use neuragent_core::config::RetryConfig;
use neuragent_core::error::{AgentError, Result};
use neuragent_core::traits::CompletionService;
use neuragent_core::types::ChatMessage;

/// A completion client that retries transient failures with backoff.
pub struct RetryingClient {
    inner: Box<dyn CompletionService>,
    retry_config: RetryConfig,
}

impl RetryingClient {
    pub fn new(inner: Box<dyn CompletionService>, retry_config: RetryConfig) -> Self {
        Self {
            inner,
            retry_config,
        }
    }
}

fn is_retryable(e: &AgentError) -> bool {
    match e {
        AgentError::Service(msg) => {
            msg.contains("429")
                || msg.contains("500")
                || msg.contains("502")
                || msg.contains("503")
                || msg.contains("timeout")
                || msg.contains("connection")
        }
        _ => false,
    }
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = config
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_backoff_ms);
    // Add jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

impl CompletionService for RetryingClient {
    fn complete(&self, messages: Vec<ChatMessage>) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let max_retries = self.retry_config.max_retries;
            let mut attempt = 0;

            loop {
                match self.inner.complete(messages.clone()).await {
                    Ok(text) => return Ok(text),
                    Err(e) if is_retryable(&e) && attempt < max_retries => {
                        let backoff = calculate_backoff(attempt, &self.retry_config);
                        warn!(
                            attempt = attempt + 1,
                            max_retries,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %e,
                            "Retrying completion request"
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuragent_test_utils::MockCompletion;

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&AgentError::Service("HTTP 429 Too Many Requests".into())));
        assert!(is_retryable(&AgentError::Service("connection reset".into())));
        assert!(!is_retryable(&AgentError::Service("HTTP 401 Unauthorized".into())));
        assert!(!is_retryable(&AgentError::Parse("x".into())));
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig {
            max_retries: 10,
            initial_backoff_ms: 1000,
            max_backoff_ms: 4000,
        };
        let d = calculate_backoff(8, &config);
        assert!(d <= Duration::from_millis(4800));
        assert!(d >= Duration::from_millis(3200));
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let mock = MockCompletion::from_results(vec![
            Err(AgentError::Service("HTTP 503 unavailable".into())),
            Ok("done".into()),
        ]);
        let calls = mock.call_log();
        let client = RetryingClient::new(Box::new(mock), fast_retry(3));

        let out = client.complete(vec![ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(out, "done");
        assert_eq!(calls.count(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let mock = MockCompletion::from_results(vec![Err(AgentError::Service(
            "HTTP 401 bad key".into(),
        ))]);
        let calls = mock.call_log();
        let client = RetryingClient::new(Box::new(mock), fast_retry(3));

        assert!(client.complete(vec![]).await.is_err());
        assert_eq!(calls.count(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let mock = MockCompletion::from_results(vec![
            Err(AgentError::Service("timeout".into())),
            Err(AgentError::Service("timeout".into())),
            Err(AgentError::Service("timeout".into())),
        ]);
        let calls = mock.call_log();
        let client = RetryingClient::new(Box::new(mock), fast_retry(2));

        assert!(client.complete(vec![]).await.is_err());
        assert_eq!(calls.count(), 3);
    }
}
