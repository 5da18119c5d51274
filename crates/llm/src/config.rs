use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use keepsake_common::{KeepsakeError, Result};
use serde::{Deserialize, Serialize};

use crate::anthropic::AnthropicClient;
use crate::client::{LlmClient, LlmRequest, LlmResponse};
use crate::openai::OpenAiClient;
use crate::retry::{RetryConfig, RetryingClient};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" or "anthropic"
    pub provider: String,
    pub model: String,
    /// Falls back to `OPENAI_API_KEY` / `ANTHROPIC_API_KEY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_concurrent() -> usize {
    4
}

impl LlmConfig {
    /// Resolve the API key from config or the provider's environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.trim().is_empty() {
                return Some(key.clone());
            }
        }

        let env_var = match self.provider.as_str() {
            "openai" => "OPENAI_API_KEY",
            "anthropic" => "ANTHROPIC_API_KEY",
            _ => return None,
        };

        std::env::var(env_var).ok().filter(|k| !k.trim().is_empty())
    }
}

/// Caps the number of in-flight requests to the provider.
pub struct SemaphoredClient {
    inner: Arc<dyn LlmClient>,
    semaphore: Arc<tokio::sync::Semaphore>,
}

impl SemaphoredClient {
    pub fn new(inner: Arc<dyn LlmClient>, max_concurrent: usize) -> Self {
        Self {
            inner,
            semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent.max(1))),
        }
    }
}

#[async_trait]
impl LlmClient for SemaphoredClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| KeepsakeError::Oracle(format!("Semaphore acquire failed: {e}")))?;
        self.inner.complete(request).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Build the provider client wrapped in retry and concurrency limits.
///
/// Fails with `KeepsakeError::Config` when the provider is unknown or no API
/// key can be resolved for it. A custom `api_url` on the OpenAI provider
/// (a local OpenAI-compatible server) may run without a key.
pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let timeout = Duration::from_millis(config.request_timeout_ms);
    let api_key = config.resolve_api_key();

    let base_client: Box<dyn LlmClient> = match config.provider.as_str() {
        "openai" => {
            if api_key.is_none() && config.api_url.is_none() {
                return Err(KeepsakeError::Config(
                    "OpenAI requires an API key (set OPENAI_API_KEY)".to_string(),
                ));
            }
            Box::new(OpenAiClient::new(
                config.api_url.clone(),
                config.model.clone(),
                api_key,
                timeout,
            )?)
        }
        "anthropic" => {
            let api_key = api_key.ok_or_else(|| {
                KeepsakeError::Config(
                    "Anthropic requires an API key (set ANTHROPIC_API_KEY)".to_string(),
                )
            })?;
            Box::new(AnthropicClient::new(
                config.api_url.clone(),
                config.model.clone(),
                api_key,
                timeout,
            )?)
        }
        other => {
            return Err(KeepsakeError::Config(format!(
                "Unknown LLM provider: {other}"
            )));
        }
    };

    let retrying: Box<dyn LlmClient> =
        Box::new(RetryingClient::new(base_client, config.retry.clone()));

    let semaphored = SemaphoredClient::new(Arc::from(retrying), config.max_concurrent_requests);

    Ok(Arc::new(semaphored))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_CONFIG: &str = r#"
provider = "openai"
model = "gpt-4o-mini"
api_url = "http://localhost:11434"
max_concurrent_requests = 8

[retry]
max_retries = 5
initial_delay_ms = 1000
"#;

    fn config(provider: &str, api_key: Option<&str>, api_url: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            model: "test-model".to_string(),
            api_key: api_key.map(str::to_string),
            api_url: api_url.map(str::to_string),
            request_timeout_ms: 1000,
            max_concurrent_requests: 2,
            retry: RetryConfig::default(),
        }
    }

    #[test]
    fn deserialize_config_from_toml() {
        let config: LlmConfig = toml::from_str(TOML_CONFIG).unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.api_url.as_deref(), Some("http://localhost:11434"));
        assert!(config.api_key.is_none());
        assert_eq!(config.max_concurrent_requests, 8);
        assert_eq!(config.request_timeout_ms, 30_000);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay_ms, 1000);
        assert_eq!(config.retry.max_delay_ms, 10_000);
    }

    #[test]
    fn explicit_key_wins() {
        let c = config("anthropic", Some("sk-ant-explicit"), None);
        assert_eq!(c.resolve_api_key().as_deref(), Some("sk-ant-explicit"));
    }

    #[test]
    fn unknown_provider_has_no_env_fallback() {
        let c = config("gemini", None, None);
        assert!(c.resolve_api_key().is_none());
    }

    #[test]
    fn build_openai_client_with_key() {
        let client = build_llm_client(&config("openai", Some("sk-test"), None)).unwrap();
        assert_eq!(client.model_name(), "test-model");
    }

    #[test]
    fn build_local_openai_compatible_without_key() {
        let client =
            build_llm_client(&config("openai", None, Some("http://localhost:11434"))).unwrap();
        assert_eq!(client.model_name(), "test-model");
    }

    #[test]
    fn build_anthropic_client() {
        let client = build_llm_client(&config("anthropic", Some("sk-ant-test"), None)).unwrap();
        assert_eq!(client.model_name(), "test-model");
    }

    #[test]
    fn build_unknown_provider_fails() {
        let result = build_llm_client(&config("gemini", Some("k"), None));
        assert!(matches!(result, Err(KeepsakeError::Config(_))));
    }

    #[tokio::test]
    async fn semaphored_client_limits_concurrency() {
        use std::sync::atomic::{AtomicU32, Ordering};

        struct CountingClient {
            concurrent: Arc<AtomicU32>,
            max_seen: Arc<AtomicU32>,
        }

        #[async_trait]
        impl LlmClient for CountingClient {
            async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
                let current = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_seen.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                self.concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok(LlmResponse {
                    content: "Score: 0.1".to_string(),
                    model: "test".to_string(),
                    usage: None,
                    finish_reason: None,
                })
            }
            fn model_name(&self) -> &str {
                "test"
            }
        }

        let max_seen = Arc::new(AtomicU32::new(0));
        let inner = Arc::new(CountingClient {
            concurrent: Arc::new(AtomicU32::new(0)),
            max_seen: max_seen.clone(),
        });
        let semaphored = Arc::new(SemaphoredClient::new(inner, 2));

        let mut handles = vec![];
        for _ in 0..6 {
            let client = semaphored.clone();
            handles.push(tokio::spawn(async move {
                client.complete(LlmRequest::default()).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }
}
