//! Core trait for mentor LLM backends.

use async_trait::async_trait;

/// Error types for mentor completions.
#[derive(Debug, thiserror::Error)]
pub enum MentorError {
    /// Backend is not available
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Request failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Rate limited by the backend
    #[error("Rate limited, retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Parsing error
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// A completion request: one system prompt, one user prompt.
#[derive(Debug, Clone)]
pub struct MentorRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Abstraction over the inference engine behind the mentor.
///
/// Works with any OpenAI-compatible API (vLLM, Ollama, OpenAI itself)
/// plus a mock for tests.
#[async_trait]
pub trait MentorBackend: Send + Sync {
    /// Backend identifier (the model name).
    fn id(&self) -> &str;

    /// Check if the backend is currently reachable.
    async fn is_available(&self) -> bool;

    /// Generate a completion (non-streaming).
    async fn complete(&self, request: MentorRequest) -> Result<String, MentorError>;
}
