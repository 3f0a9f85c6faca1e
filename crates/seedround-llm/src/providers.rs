//! Text-generation provider implementations

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::*;

/// Trait for text-generation providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Get the provider kind
    fn kind(&self) -> ProviderKind;

    /// Check if the provider is available
    async fn is_available(&self) -> bool;

    /// Complete a conversation
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

// ============================================================================
// Ollama Provider (Local, Default)
// ============================================================================

/// Configuration for Ollama provider
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("SEEDROUND_OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model: std::env::var("SEEDROUND_OLLAMA_MODEL")
                .unwrap_or_else(|_| "llama3.1:8b".to_string()),
        }
    }
}

/// Ollama local LLM provider
pub struct OllamaProvider {
    config: OllamaConfig,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(OllamaConfig::default())
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "Ollama"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        self.client.get(&url).send().await.is_ok()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        // Convert messages to a single prompt
        let prompt = request
            .messages
            .iter()
            .map(|m| match m.role {
                MessageRole::User => format!("User: {}", m.content),
                MessageRole::Assistant => format!("Assistant: {}", m.content),
                MessageRole::System => format!("System: {}", m.content),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
            + "\n\nAssistant:";

        // Add JSON mode instruction if needed
        let system = if request.json_mode {
            Some(
                request.system.clone().unwrap_or_default()
                    + "\n\nIMPORTANT: You must respond with valid JSON only. No other text.",
            )
        } else {
            request.system.clone()
        };

        let ollama_request = OllamaRequest {
            model: request.model.unwrap_or_else(|| self.config.model.clone()),
            prompt,
            stream: false,
            system,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(LlmError::RequestFailed {
                message: format!("HTTP {}", response.status()),
            });
        }

        let ollama_response: OllamaResponse =
            response.json().await.map_err(|e| LlmError::InvalidResponse {
                message: e.to_string(),
            })?;

        Ok(CompletionResponse {
            content: ollama_response.response.trim().to_string(),
            model: Some(self.config.model.clone()),
        })
    }
}

// ============================================================================
// OpenAI-Compatible Provider
// ============================================================================

/// Configuration for OpenAI-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAICompatConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for OpenAICompatConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("SEEDROUND_OPENAI_COMPAT_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000/v1".to_string()),
            api_key: std::env::var("SEEDROUND_OPENAI_COMPAT_API_KEY").ok(),
            model: std::env::var("SEEDROUND_OPENAI_COMPAT_MODEL")
                .unwrap_or_else(|_| "default".to_string()),
        }
    }
}

/// OpenAI-compatible API provider (vLLM, llama.cpp, hosted endpoints)
pub struct OpenAICompatProvider {
    config: OpenAICompatConfig,
    client: reqwest::Client,
}

impl OpenAICompatProvider {
    pub fn new(config: OpenAICompatConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(OpenAICompatConfig::default())
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[async_trait]
impl LlmProvider for OpenAICompatProvider {
    fn name(&self) -> &'static str {
        "OpenAI-Compatible"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAICompat
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/models", self.config.base_url);
        let mut req = self.client.get(&url);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        req.send().await.is_ok()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        for m in &request.messages {
            messages.push(ChatMessage {
                role: match m.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                }
                .to_string(),
                content: m.content.clone(),
            });
        }

        let chat_request = ChatRequest {
            model: request.model.unwrap_or_else(|| self.config.model.clone()),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
            response_format: request
                .json_mode
                .then(|| serde_json::json!({"type": "json_object"})),
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let mut req = self.client.post(&url).json(&chat_request);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(LlmError::RequestFailed {
                message: format!("HTTP {}", response.status()),
            });
        }

        let chat_response: ChatResponse =
            response.json().await.map_err(|e| LlmError::InvalidResponse {
                message: e.to_string(),
            })?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse {
                message: "no choices in response".to_string(),
            })?;

        Ok(CompletionResponse {
            content: content.trim().to_string(),
            model: chat_response.model,
        })
    }
}

// ============================================================================
// Deterministic Provider (Fallback)
// ============================================================================

/// Deterministic provider used when no LLM backend is configured or reachable
pub struct DeterministicProvider;

impl DeterministicProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DeterministicProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for DeterministicProvider {
    fn name(&self) -> &'static str {
        "Deterministic"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Deterministic
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let content = if request.json_mode {
            r#"{"reply": "Thanks for your message. Let me review the numbers and get back to you with a concrete counter-offer.", "agreement_reached": false}"#
                .to_string()
        } else {
            "Thanks for your message. Let me review the numbers and get back to you with a concrete counter-offer."
                .to_string()
        };

        Ok(CompletionResponse {
            content,
            model: Some("deterministic".to_string()),
        })
    }
}
