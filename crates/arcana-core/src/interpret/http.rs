//! HTTP completion provider.
//!
//! Posts `{model, prompt, max_tokens, temperature, top_p}` as JSON and reads
//! `{text}` back. Status mapping: 429 is a rate limit, 5xx and transport
//! failures are server errors, any other non-success status is a rejection.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::provider::{AiProvider, ProviderError, ProviderOptions};

/// HTTP provider configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpProviderConfig {
    /// Completion endpoint URL
    pub endpoint: String,
    /// Model identifier sent with each request
    pub model: String,
    /// Bearer token (optional for local endpoints)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        HttpProviderConfig {
            endpoint: std::env::var("ARCANA_PROVIDER_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8080/v1/completions".to_string()),
            model: std::env::var("ARCANA_PROVIDER_MODEL")
                .unwrap_or_else(|_| "meta-llama/Llama-3-8b-chat-hf".to_string()),
            api_key: std::env::var("ARCANA_PROVIDER_API_KEY").ok(),
        }
    }
}

impl HttpProviderConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn new(endpoint: &str, model: &str) -> Self {
        HttpProviderConfig {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

/// `AiProvider` backed by an HTTP completion endpoint.
pub struct HttpAiProvider {
    config: HttpProviderConfig,
    http_client: reqwest::Client,
}

impl HttpAiProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("arcana/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Rejected(format!("failed to create HTTP client: {e}")))?;

        Ok(HttpAiProvider {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &HttpProviderConfig {
        &self.config
    }
}

/// Map a non-success HTTP status to a provider error.
pub fn status_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimited
    } else if status.is_server_error() {
        ProviderError::Server(format!("{status}: {body}"))
    } else {
        ProviderError::Rejected(format!("{status}: {body}"))
    }
}

#[async_trait]
impl AiProvider for HttpAiProvider {
    fn name(&self) -> &str {
        "http"
    }

    fn model(&self) -> Option<&str> {
        Some(&self.config.model)
    }

    async fn complete(
        &self,
        prompt: &str,
        options: &ProviderOptions,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let body = CompletionRequest {
            model: &self.config.model,
            prompt,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
        };

        let mut request = self
            .http_client
            .post(&self.config.endpoint)
            .timeout(timeout)
            .json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    limit_ms: timeout.as_millis() as u64,
                }
            } else {
                ProviderError::Server(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Server(format!("malformed completion: {e}")))?;
        debug!(chars = parsed.text.len(), "completion received");
        Ok(parsed.text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS, ""),
            ProviderError::RateLimited
        );
        assert!(status_error(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(!status_error(StatusCode::BAD_REQUEST, "bad prompt").is_transient());
    }

    #[test]
    fn test_config_builder() {
        let cfg = HttpProviderConfig::new("http://localhost:9000/complete", "tiny")
            .with_api_key("secret");
        assert_eq!(cfg.model, "tiny");
        assert_eq!(cfg.api_key.as_deref(), Some("secret"));
        // keys never leave the process in serialized config
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(!json.contains("secret"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        let provider =
            HttpAiProvider::new(HttpProviderConfig::new("http://127.0.0.1:9/complete", "m"))
                .unwrap();
        let err = provider
            .complete("prompt", &ProviderOptions::default(), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
