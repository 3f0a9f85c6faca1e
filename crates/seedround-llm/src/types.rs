//! Common types for text-generation interactions

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during text-generation operations
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Provider not available: {provider}")]
    ProviderNotAvailable { provider: String },

    #[error("Request failed: {message}")]
    RequestFailed { message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Network error: {message}")]
    NetworkError { message: String },
}

pub type Result<T> = std::result::Result<T, LlmError>;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Request to complete a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model to use (provider-specific)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// System context prepended to the conversation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Conversation messages
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether to request JSON output
    #[serde(default)]
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            system: None,
            messages,
            temperature: None,
            max_tokens: None,
            json_mode: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Response from a completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The generated content
    pub content: String,
    /// Which model was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl CompletionResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
        }
    }
}

/// Provider kind for routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Ollama local LLM
    Ollama,
    /// Any OpenAI-compatible API (vLLM, llama.cpp server, hosted)
    OpenAICompat,
    /// Deterministic fallback (no LLM)
    Deterministic,
}

impl ProviderKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai_compat" | "openai-compat" | "openaicompat" => Some(Self::OpenAICompat),
            "deterministic" | "none" | "fallback" => Some(Self::Deterministic),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::OpenAICompat => write!(f, "openai_compat"),
            Self::Deterministic => write!(f, "deterministic"),
        }
    }
}
