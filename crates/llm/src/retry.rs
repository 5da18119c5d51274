use async_trait::async_trait;
use keepsake_common::{KeepsakeError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::client::{LlmClient, LlmRequest, LlmResponse};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Retries rate-limited and transient upstream failures with exponential backoff.
pub struct RetryingClient<T: LlmClient> {
    inner: T,
    config: RetryConfig,
}

impl<T: LlmClient> RetryingClient<T> {
    pub fn new(inner: T, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Only transport and upstream failures are worth another attempt.
    fn is_retryable(error: &KeepsakeError) -> bool {
        let KeepsakeError::Oracle(msg) = error else {
            return false;
        };
        let lower = msg.to_lowercase();
        [
            "429",
            "rate limit",
            "500",
            "502",
            "503",
            "504",
            "529",
            "overloaded",
            "timed out",
            "service unavailable",
            "bad gateway",
            "gateway timeout",
        ]
        .iter()
        .any(|needle| lower.contains(needle))
    }

    /// Seconds from a `retry-after: N` hint, as milliseconds.
    fn parse_retry_after(error_msg: &str) -> Option<u64> {
        let lower = error_msg.to_lowercase();
        let pos = lower.find("retry-after")?;
        lower[pos + "retry-after".len()..]
            .trim_start_matches([':', ' ', '"', '='])
            .split(|c: char| !c.is_ascii_digit())
            .next()
            .and_then(|digits| digits.parse::<u64>().ok())
            .map(|secs| secs * 1000)
    }

    fn compute_delay(&self, attempt: u32) -> u64 {
        let base = self.config.initial_delay_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32);
        let jitter = base * 0.1 * rand::rng().random::<f64>();
        ((base + jitter) as u64).min(self.config.max_delay_ms)
    }
}

#[async_trait]
impl<T: LlmClient> LlmClient for RetryingClient<T> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let mut attempt = 0;

        loop {
            let err = match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if attempt >= self.config.max_retries || !Self::is_retryable(&err) {
                return Err(err);
            }

            let error_msg = err.to_string();
            let delay = Self::parse_retry_after(&error_msg)
                .unwrap_or_else(|| self.compute_delay(attempt))
                .min(self.config.max_delay_ms);

            warn!(
                attempt = attempt + 1,
                max_retries = self.config.max_retries,
                delay_ms = delay,
                error = %error_msg,
                "Retrying LLM request"
            );

            tokio::time::sleep(Duration::from_millis(delay)).await;
            attempt += 1;
        }
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
