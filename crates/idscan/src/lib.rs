pub mod config;
pub mod error;
pub mod intake;
pub mod jobs;
pub mod llm;
pub mod ocr;
pub mod pipeline;
pub mod retry;
pub mod sanitize;
pub mod secrets;
pub mod telemetry;

pub use config::{load_config, Config};
pub use error::{ConfigError, IdscanError, IntakeError, Result, StorageError};
pub use intake::{validate_upload, ImageKind};
pub use jobs::{JobStatus, JobStore, JobTracker, MemoryJobStore, TrackerError};
pub use llm::{LlmClient, OpenAiClient};
pub use ocr::{GoogleVisionClient, OcrEngine};
pub use pipeline::{ExecutionOutcome, Pipeline, PipelineError};
pub use secrets::{resolve_secret, SecretError};
pub use telemetry::init_tracing;
