//! Router - selects a provider and bounds every completion call
//!
//! The negotiation engine treats text generation as untrusted and slow: all
//! completions go through [`LlmRouter::complete_bounded`], which enforces the
//! configured deadline so a hung provider can never stall a session
//! transition.

use std::sync::Arc;
use std::time::Duration;

use crate::providers::*;
use crate::types::*;

/// Default deadline for one completion call
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Selects and manages text-generation providers
pub struct LlmRouter {
    provider: Arc<dyn LlmProvider>,
    kind: ProviderKind,
    timeout: Duration,
}

impl LlmRouter {
    /// Create a router with a specific provider
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        let kind = provider.kind();
        Self {
            provider,
            kind,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create a router from environment variables
    ///
    /// Reads `SEEDROUND_LLM_PROVIDER` to select the provider:
    /// - `ollama` (default): Local Ollama instance
    /// - `openai_compat`: OpenAI-compatible server
    /// - `deterministic`: No LLM, canned fallback
    ///
    /// `SEEDROUND_LLM_TIMEOUT_SECS` overrides the completion deadline.
    pub fn from_env() -> Self {
        // Try to load .env file (ignore errors)
        let _ = dotenvy::dotenv();

        let provider_name =
            std::env::var("SEEDROUND_LLM_PROVIDER").unwrap_or_else(|_| "ollama".to_string());
        let kind = ProviderKind::from_str(&provider_name).unwrap_or(ProviderKind::Ollama);

        let timeout_secs = std::env::var("SEEDROUND_LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::from_kind(kind).with_timeout(Duration::from_secs(timeout_secs))
    }

    /// Create a router for a specific provider kind
    pub fn from_kind(kind: ProviderKind) -> Self {
        let provider: Arc<dyn LlmProvider> = match kind {
            ProviderKind::Ollama => Arc::new(OllamaProvider::from_env()),
            ProviderKind::OpenAICompat => Arc::new(OpenAICompatProvider::from_env()),
            ProviderKind::Deterministic => Arc::new(DeterministicProvider::new()),
        };
        Self::new(provider)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the provider kind
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Check if the provider is available
    pub async fn is_available(&self) -> bool {
        self.provider.is_available().await
    }

    /// Complete a request with no deadline (provider-internal timeouts only)
    pub async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.provider.complete(request).await
    }

    /// Complete a request under the configured deadline
    ///
    /// A timeout surfaces as [`LlmError::Timeout`]; the caller decides how to
    /// degrade (the negotiation engine answers with a fixed fallback reply
    /// and leaves session state untouched).
    pub async fn complete_bounded(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse> {
        match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "Provider {} exceeded {}s deadline",
                    self.kind,
                    self.timeout.as_secs()
                );
                Err(LlmError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

impl Default for LlmRouter {
    fn default() -> Self {
        Self::from_env()
    }
}
