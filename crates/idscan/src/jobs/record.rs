//! Job records and the caller-facing views projected from them.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::StoreError;
use crate::intake::size_in_mb;
use crate::pipeline::ExecutionOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub last_stage: String,
}

/// A status change requested by the background execution.
#[derive(Debug, Clone, PartialEq)]
pub enum JobTransition {
    Started {
        at: DateTime<Utc>,
    },
    Completed {
        at: DateTime<Utc>,
        result: ExecutionOutcome,
    },
    Failed {
        at: DateTime<Utc>,
        error: String,
        details: Option<ErrorDetails>,
    },
}

impl JobTransition {
    pub fn target(&self) -> JobStatus {
        match self {
            JobTransition::Started { .. } => JobStatus::Processing,
            JobTransition::Completed { .. } => JobStatus::Completed,
            JobTransition::Failed { .. } => JobStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    pub filename: String,
    /// Bytes.
    pub file_size: u64,
    #[serde(skip)]
    pub file_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<ExecutionOutcome>,
    pub error: Option<String>,
    pub error_details: Option<ErrorDetails>,
}

impl JobRecord {
    pub fn pending(
        job_id: impl Into<String>,
        filename: impl Into<String>,
        file_size: u64,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            filename: filename.into(),
            file_size,
            file_path: file_path.into(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            error_details: None,
        }
    }

    /// Size in MB rounded to two decimals.
    pub fn file_size_mb(&self) -> f64 {
        (size_in_mb(self.file_size) * 100.0).round() / 100.0
    }

    /// Applies a transition, enforcing PENDING → PROCESSING → COMPLETED|FAILED.
    /// Terminal records never change.
    pub fn apply(&mut self, transition: JobTransition) -> Result<(), StoreError> {
        let target = transition.target();
        let allowed = matches!(
            (self.status, target),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Pending | JobStatus::Processing, JobStatus::Failed)
        );
        if !allowed {
            return Err(StoreError::InvalidTransition {
                job_id: self.job_id.clone(),
                from: self.status,
                to: target,
            });
        }

        match transition {
            JobTransition::Started { at } => {
                self.started_at = Some(at);
            }
            JobTransition::Completed { at, result } => {
                self.completed_at = Some(at);
                self.result = Some(result);
            }
            JobTransition::Failed { at, error, details } => {
                self.completed_at = Some(at);
                self.error = Some(error);
                self.error_details = details;
            }
        }
        self.status = target;
        Ok(())
    }

    pub fn status_view(&self) -> JobStatusView {
        let mut view = JobStatusView {
            job_id: self.job_id.clone(),
            status: self.status,
            filename: self.filename.clone(),
            created_at: self.created_at,
            started_at: None,
            completed_at: None,
            result_available: None,
            error: None,
        };
        match self.status {
            JobStatus::Pending => {}
            JobStatus::Processing => view.started_at = self.started_at,
            JobStatus::Completed => {
                view.completed_at = self.completed_at;
                view.result_available = Some(true);
            }
            JobStatus::Failed => {
                view.completed_at = self.completed_at;
                view.error = self.error.clone();
            }
        }
        view
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            job_id: self.job_id.clone(),
            status: self.status,
            filename: self.filename.clone(),
            created_at: self.created_at,
            completed_at: match self.status {
                JobStatus::Completed => self.completed_at,
                _ => None,
            },
            error: match self.status {
                JobStatus::Failed => self.error.clone(),
                _ => None,
            },
        }
    }

    pub fn metadata(&self) -> JobMetadata {
        JobMetadata {
            filename: self.filename.clone(),
            file_size_mb: self.file_size_mb(),
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: String,
    pub status: JobStatus,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: String,
    pub status: JobStatus,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub filename: String,
    pub file_size_mb: f64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResultView {
    pub job_id: String,
    pub result: ExecutionOutcome,
    pub job_metadata: JobMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobList {
    pub total_jobs: usize,
    pub jobs: Vec<JobSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTicket {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
    pub filename: String,
    pub estimated_time_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedJob {
    pub job_id: String,
    pub filename: String,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteReceipt {
    pub message: String,
    pub deleted_job: DeletedJob,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub active_jobs: usize,
    pub total_jobs: usize,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Metrics;

    fn record() -> JobRecord {
        JobRecord::pending("job-1", "dni.png", 2 * 1024 * 1024 + 10_000, "/tmp/x.png")
    }

    fn failed_outcome() -> ExecutionOutcome {
        ExecutionOutcome::Failed {
            stage: "ocr_processing".to_string(),
            errors: vec!["No text detected in the image".to_string()],
            warnings: vec![],
            metrics: Metrics::default(),
        }
    }

    #[test]
    fn test_pending_view_has_no_optional_fields() {
        let json = serde_json::to_value(record().status_view()).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert!(json.get("started_at").is_none());
        assert!(json.get("result_available").is_none());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut job = record();
        job.apply(JobTransition::Started { at: Utc::now() }).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.status_view().started_at.is_some());

        job.apply(JobTransition::Completed {
            at: Utc::now(),
            result: failed_outcome(),
        })
        .unwrap();
        let view = job.status_view();
        assert_eq!(view.result_available, Some(true));
        assert!(view.completed_at.is_some());
        assert!(view.started_at.is_none());
    }

    #[test]
    fn test_terminal_record_is_immutable() {
        let mut job = record();
        job.apply(JobTransition::Failed {
            at: Utc::now(),
            error: "boom".to_string(),
            details: None,
        })
        .unwrap();
        let before = job.clone();

        let err = job
            .apply(JobTransition::Started { at: Utc::now() })
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        assert_eq!(job, before);
        assert_eq!(job.status_view().error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_pending_cannot_complete_directly() {
        let mut job = record();
        assert!(job
            .apply(JobTransition::Completed {
                at: Utc::now(),
                result: failed_outcome(),
            })
            .is_err());
    }

    #[test]
    fn test_file_size_mb_rounds() {
        assert_eq!(record().file_size_mb(), 2.01);
    }

    #[test]
    fn test_summary_only_carries_terminal_fields() {
        let mut job = record();
        job.apply(JobTransition::Started { at: Utc::now() }).unwrap();
        let summary = job.summary();
        assert!(summary.completed_at.is_none());
        assert!(summary.error.is_none());
    }
}
