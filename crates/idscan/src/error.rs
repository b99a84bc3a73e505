use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdscanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Upload rejected: {0}")]
    Intake(#[from] IntakeError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Job error: {0}")]
    Tracker(#[from] crate::jobs::TrackerError),

    #[error("OCR client error: {0}")]
    Ocr(#[from] crate::ocr::OcrError),

    #[error("LLM client error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    #[error("Logging setup failed: {0}")]
    Telemetry(#[from] crate::telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config is not valid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("Config rejected: {message}")]
    Rejected { message: String },

    #[error("Config does not match schema: {errors}")]
    Schema { errors: String },

    #[error("Config field '{field}' {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Synchronous rejections at submission time. None of these ever become a job.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntakeError {
    #[error("The uploaded file must have a name")]
    MissingFilename,

    #[error("Only images are accepted. Allowed formats: {allowed}")]
    UnsupportedExtension { extension: String, allowed: String },

    #[error("Image too large: {size_mb:.1}MB. Maximum allowed: {max_mb}MB")]
    TooLarge { size_mb: f64, max_mb: u64 },

    #[error("The uploaded file is empty")]
    Empty,

    #[error("File content is not a valid {expected} image")]
    SignatureMismatch { expected: String },
}

impl IntakeError {
    /// HTTP-equivalent status for callers that expose the tracker over a transport.
    pub fn status_code(&self) -> u16 {
        match self {
            IntakeError::TooLarge { .. } => 413,
            _ => 400,
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cannot create upload directory '{path}': {source}")]
    UploadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot store upload '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot delete upload '{path}': {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, IdscanError>;
