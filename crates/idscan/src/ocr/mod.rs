pub mod confidence;
pub mod vision;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::retry::Retryable;

pub use confidence::ConfidenceStats;
pub use vision::GoogleVisionClient;

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR service is not configured: {0}")]
    NotConfigured(String),

    #[error("OCR request failed: {0}")]
    Request(String),

    #[error("OCR request timed out after {0}s")]
    Timeout(u64),

    #[error("OCR service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("OCR service error: {0}")]
    Api(String),

    #[error("Malformed OCR response: {0}")]
    InvalidResponse(String),
}

impl Retryable for OcrError {
    fn is_retryable(&self) -> bool {
        match self {
            OcrError::Request(_) | OcrError::Timeout(_) => true,
            OcrError::Http { status, .. } => *status == 429 || *status >= 500,
            OcrError::NotConfigured(_) | OcrError::Api(_) | OcrError::InvalidResponse(_) => false,
        }
    }
}

/// How the engine should treat the image layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentMode {
    /// Dense document text (identity cards, forms).
    #[default]
    Document,
    /// Sparse text in a scene.
    Sparse,
}

#[derive(Debug, Clone)]
pub struct OcrRequest {
    pub image: Vec<u8>,
    pub mode: DocumentMode,
    pub language_hints: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrResponse {
    pub full_text: String,
    /// Per-word confidence in 0.0..=1.0.
    pub word_confidences: Vec<f32>,
}

/// Black-box text detection service.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Fails with [`OcrError::NotConfigured`] when the engine cannot be used at all.
    fn check_available(&self) -> Result<(), OcrError>;

    async fn detect_text(&self, request: OcrRequest) -> Result<OcrResponse, OcrError>;
}
