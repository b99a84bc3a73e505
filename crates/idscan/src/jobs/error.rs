use thiserror::Error;

use super::record::JobStatus;
use crate::error::{IntakeError, StorageError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Job not found: {job_id}")]
    NotFound { job_id: String },

    #[error("Job already exists: {job_id}")]
    Duplicate { job_id: String },

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },
}

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Job not found: {job_id}")]
    NotFound { job_id: String },

    #[error("Job {job_id} is {status}; only COMPLETED jobs have results")]
    InvalidState { job_id: String, status: JobStatus },

    #[error(transparent)]
    Validation(#[from] IntakeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TrackerError {
    /// HTTP-equivalent status for callers that expose the tracker over a transport.
    pub fn status_code(&self) -> u16 {
        match self {
            TrackerError::NotFound { .. } => 404,
            TrackerError::InvalidState { .. } => 400,
            TrackerError::Validation(e) => e.status_code(),
            TrackerError::Storage(_) | TrackerError::Store(_) => 500,
        }
    }
}
