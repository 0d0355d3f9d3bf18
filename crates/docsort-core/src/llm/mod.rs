//! Completion backend trait and implementations.
//!
//! The remote model sits behind [`CompletionBackend`] so the pipeline
//! can run against a deterministic stand-in in tests.

pub mod deepseek;
pub mod mock;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rate limited (429)")]
    RateLimited,
    #[error("API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("API response contained no completion")]
    EmptyCompletion,
}

impl CompletionError {
    /// Whether a retry might succeed: network failures, 429s, and
    /// server-side (5xx) errors.
    pub fn is_transient(&self) -> bool {
        match self {
            CompletionError::Http(_) | CompletionError::RateLimited => true,
            CompletionError::Api { status, .. } => *status >= 500,
            CompletionError::EmptyCompletion => false,
        }
    }
}

/// A chat-completion backend that can categorize one document per call.
pub trait CompletionBackend: Send + Sync {
    /// Canonical name of this backend (e.g. "DeepSeek").
    fn name(&self) -> &str;

    /// Submit a (system prompt, document text) pair and return the raw
    /// completion text.
    fn complete<'a>(
        &'a self,
        system_prompt: &'a str,
        document_text: &'a str,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>>;
}

/// Call the backend, retrying transient failures with exponential
/// backoff plus jitter. `max_retries` is the total attempt cap.
pub async fn complete_with_retry(
    backend: &dyn CompletionBackend,
    system_prompt: &str,
    document_text: &str,
    client: &reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    on_retry: &(dyn Fn(u32, Duration) + Send + Sync),
) -> Result<String, CompletionError> {
    let attempts = max_retries.max(1);
    let mut attempt = 0;
    loop {
        match backend
            .complete(system_prompt, document_text, client, timeout)
            .await
        {
            Ok(text) => return Ok(text),
            Err(e) => {
                attempt += 1;
                if !e.is_transient() || attempt >= attempts {
                    return Err(e);
                }
                let backoff = Duration::from_secs(1u64 << (attempt - 1))
                    + Duration::from_millis(fastrand::u64(..250));
                tracing::debug!(
                    backend = backend.name(),
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "retrying completion"
                );
                on_retry(attempt, backoff);
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockLlm, MockReply};
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn client() -> reqwest::Client {
        reqwest::Client::new()
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried() {
        let llm = MockLlm::with_sequence(
            "mock",
            vec![
                MockReply::RateLimited,
                MockReply::Error(503, "overloaded".into()),
                MockReply::Reply("#GOLD\n- ok".into()),
            ],
        );
        let retries = AtomicU32::new(0);
        let out = complete_with_retry(
            &llm,
            "prompt",
            "doc",
            &client(),
            Duration::from_secs(1),
            3,
            &|_, _| {
                retries.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await
        .unwrap();
        assert_eq!(out, "#GOLD\n- ok");
        assert_eq!(llm.call_count(), 3);
        assert_eq!(retries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_do_not_retry() {
        let llm = MockLlm::new("mock", MockReply::Error(401, "bad key".into()));
        let err = complete_with_retry(
            &llm,
            "prompt",
            "doc",
            &client(),
            Duration::from_secs(1),
            3,
            &|_, _| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CompletionError::Api { status: 401, .. }));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_cap_is_honored() {
        let llm = MockLlm::new("mock", MockReply::RateLimited);
        let err = complete_with_retry(
            &llm,
            "prompt",
            "doc",
            &client(),
            Duration::from_secs(1),
            3,
            &|_, _| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CompletionError::RateLimited));
        assert_eq!(llm.call_count(), 3);
    }
}
