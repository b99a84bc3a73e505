use thiserror::Error;

/// Failures outside the stages themselves. Stage-level problems never surface
/// here; they are recorded in the state and reported as a failed outcome.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Pipeline setup failed: {0}")]
    Setup(String),

    #[error("Stage '{stage}' panicked: {message}")]
    StagePanicked { stage: String, message: String },

    #[error("Checkpoint failed: {0}")]
    Checkpoint(#[from] CheckpointError),
}

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Failed to serialize pipeline state: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to restore pipeline state: {0}")]
    Restore(#[source] serde_json::Error),

    #[error("No checkpoint recorded for run {run_id}")]
    Missing { run_id: String },
}
