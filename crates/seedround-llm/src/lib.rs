//! Seedround LLM - Text-generation collaborator boundary
//!
//! The negotiation engine consumes text generation as a black box: a
//! conversation plus system context goes in, a reply comes out. This crate
//! provides that boundary with local (Ollama), OpenAI-compatible, and
//! deterministic providers behind one router that bounds every call with a
//! deadline.
//!
//! Structured output from any provider is untrusted; parsing and policy
//! validation happen in `seedround-guard`, never here.

pub mod providers;
pub mod router;
pub mod types;

pub use providers::{
    DeterministicProvider, LlmProvider, OllamaConfig, OllamaProvider, OpenAICompatConfig,
    OpenAICompatProvider,
};
pub use router::{LlmRouter, DEFAULT_TIMEOUT_SECS};
pub use types::{
    CompletionRequest, CompletionResponse, LlmError, Message, MessageRole, ProviderKind, Result,
};
