//! The injected text-generation capability.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Generation parameters passed through to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1_500,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

/// Provider failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("provider timed out after {limit_ms}ms")]
    Timeout { limit_ms: u64 },

    /// 5xx-equivalent or transport failure.
    #[error("provider error: {0}")]
    Server(String),

    #[error("provider rate limited")]
    RateLimited,

    /// The provider refused the request; retrying will not help.
    #[error("provider rejected request: {0}")]
    Rejected(String),
}

impl ProviderError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ProviderError::Rejected(_))
    }
}

/// Text generation backend.
///
/// `timeout` is the per-attempt budget. Callers enforce it independently,
/// so implementations may treat it as a hint for their own transport.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Short provider name recorded in interpretation metadata.
    fn name(&self) -> &str;

    fn model(&self) -> Option<&str> {
        None
    }

    async fn complete(
        &self,
        prompt: &str,
        options: &ProviderOptions,
        timeout: Duration,
    ) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rejections_are_permanent() {
        assert!(ProviderError::Timeout { limit_ms: 10 }.is_transient());
        assert!(ProviderError::Server("502".into()).is_transient());
        assert!(ProviderError::RateLimited.is_transient());
        assert!(!ProviderError::Rejected("bad prompt".into()).is_transient());
    }
}
