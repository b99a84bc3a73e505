pub mod openai;

use async_trait::async_trait;

use crate::retry::Retryable;

pub use openai::OpenAiClient;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM client is not configured: {0}")]
    NotConfigured(String),

    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Malformed LLM response: {0}")]
    InvalidResponse(String),
}

impl Retryable for LlmError {
    fn is_retryable(&self) -> bool {
        match self {
            LlmError::Request(_) | LlmError::Timeout(_) => true,
            LlmError::Http { status, .. } => *status == 429 || *status >= 500,
            LlmError::NotConfigured(_) | LlmError::InvalidResponse(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: String,
    pub tokens_used: u64,
}

/// Black-box chat completion service.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn name(&self) -> &str;

    fn check_available(&self) -> Result<(), LlmError>;

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::Timeout(120).is_retryable());
        assert!(LlmError::Http {
            status: 502,
            body: String::new()
        }
        .is_retryable());
        assert!(!LlmError::Http {
            status: 401,
            body: String::new()
        }
        .is_retryable());
        assert!(!LlmError::InvalidResponse("no choices".into()).is_retryable());
    }
}
