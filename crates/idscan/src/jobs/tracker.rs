//! Job lifecycle: submission, background execution, and queries.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use futures_util::FutureExt;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::error::{StoreError, TrackerError};
use super::queue::{JobHandle, TaskQueue};
use super::record::{
    DeleteReceipt, DeletedJob, ErrorDetails, HealthReport, JobList, JobRecord, JobResultView,
    JobStatus, JobStatusView, JobTicket, JobTransition,
};
use super::store::{JobStore, MemoryJobStore};
use super::uploads::TempUploads;
use crate::config::Config;
use crate::intake::{size_in_mb, validate_upload};
use crate::pipeline::runner::panic_message;
use crate::pipeline::{ExecutionOutcome, Pipeline};
use crate::sanitize::redact_path;

pub const ESTIMATED_TIME_SECONDS: u64 = 30;
pub const DEFAULT_LIST_LIMIT: usize = 10;

/// Recorded when the pipeline machinery fails and produces no result.
pub const CRITICAL_FAILURE_MESSAGE: &str = "Critical error: the pipeline produced no result";

const UNKNOWN_STAGE: &str = "unknown";

pub struct JobTracker {
    store: Arc<dyn JobStore>,
    pipeline: Arc<Pipeline>,
    queue: TaskQueue,
    uploads: TempUploads,
    max_upload_bytes: u64,
}

impl JobTracker {
    pub fn new(config: &Config, pipeline: Arc<Pipeline>) -> Self {
        Self::with_store(config, pipeline, Arc::new(MemoryJobStore::new()))
    }

    pub fn with_store(config: &Config, pipeline: Arc<Pipeline>, store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            pipeline,
            queue: TaskQueue::new(config.max_concurrent_jobs),
            uploads: TempUploads::new(&config.temp_directory),
            max_upload_bytes: config.max_image_size_bytes(),
        }
    }

    /// Validates and stores the upload, records a PENDING job and schedules it.
    ///
    /// Returns as soon as the job is queued. Validation failures are returned
    /// here and never create a job.
    pub async fn submit(
        &self,
        content: &[u8],
        filename: &str,
    ) -> Result<(JobTicket, JobHandle), TrackerError> {
        validate_upload(content, filename, self.max_upload_bytes)?;

        let job_id = Uuid::new_v4().to_string();
        let file_path = self.uploads.store(filename, content).await?;

        let record = JobRecord::pending(&job_id, filename, content.len() as u64, &file_path);
        if let Err(e) = self.store.insert(record) {
            self.discard_upload(&file_path).await;
            return Err(e.into());
        }

        tracing::info!(
            job_id = %job_id,
            filename = %redact_path(Path::new(filename)),
            size_mb = size_in_mb(content.len() as u64),
            "Job queued"
        );

        let work = run_job(JobContext {
            store: self.store.clone(),
            pipeline: self.pipeline.clone(),
            uploads: self.uploads.clone(),
            job_id: job_id.clone(),
            file_path,
            filename: filename.to_string(),
        });
        let handle = self.queue.enqueue(&job_id, work);

        let ticket = JobTicket {
            job_id,
            status: JobStatus::Pending,
            message: "Image received; processing has been queued".to_string(),
            filename: filename.to_string(),
            estimated_time_seconds: ESTIMATED_TIME_SECONDS,
        };
        Ok((ticket, handle))
    }

    pub fn get_status(&self, job_id: &str) -> Result<JobStatusView, TrackerError> {
        self.store
            .get(job_id)
            .map(|record| record.status_view())
            .ok_or_else(|| not_found(job_id))
    }

    pub fn get_result(&self, job_id: &str) -> Result<JobResultView, TrackerError> {
        let record = self.store.get(job_id).ok_or_else(|| not_found(job_id))?;
        let invalid_state = || TrackerError::InvalidState {
            job_id: job_id.to_string(),
            status: record.status,
        };
        if record.status != JobStatus::Completed {
            return Err(invalid_state());
        }
        let result = record.result.clone().ok_or_else(invalid_state)?;

        Ok(JobResultView {
            job_id: record.job_id.clone(),
            result,
            job_metadata: record.metadata(),
        })
    }

    /// Newest jobs first, at most `limit` (default 10).
    pub fn list(&self, limit: Option<usize>) -> JobList {
        let records = self.store.list();
        let total_jobs = records.len();
        let jobs = records
            .iter()
            .take(limit.unwrap_or(DEFAULT_LIST_LIMIT))
            .map(|r| r.summary())
            .collect();
        JobList { total_jobs, jobs }
    }

    /// Removes the record and, best effort, its temp file. An in-flight
    /// execution is not interrupted; its late result is discarded.
    pub async fn delete(&self, job_id: &str) -> Result<DeleteReceipt, TrackerError> {
        let record = self.store.remove(job_id).ok_or_else(|| not_found(job_id))?;
        self.discard_upload(&record.file_path).await;

        tracing::info!(job_id = %job_id, status = %record.status, "Job deleted");
        Ok(DeleteReceipt {
            message: format!("Job {} deleted", job_id),
            deleted_job: DeletedJob {
                job_id: record.job_id,
                filename: record.filename,
                status: record.status,
            },
        })
    }

    pub fn health(&self) -> HealthReport {
        let counts = self.store.counts();
        HealthReport {
            status: "healthy".to_string(),
            timestamp: Utc::now(),
            active_jobs: counts.active,
            total_jobs: counts.total,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    async fn discard_upload(&self, path: &Path) {
        if let Err(e) = self.uploads.remove(path).await {
            tracing::warn!("Could not remove upload: {}", e);
        }
    }
}

fn not_found(job_id: &str) -> TrackerError {
    TrackerError::NotFound {
        job_id: job_id.to_string(),
    }
}

struct JobContext {
    store: Arc<dyn JobStore>,
    pipeline: Arc<Pipeline>,
    uploads: TempUploads,
    job_id: String,
    file_path: PathBuf,
    filename: String,
}

async fn run_job(ctx: JobContext) {
    let span = info_span!("job", job_id = %ctx.job_id);
    async move {
        match ctx
            .store
            .transition(&ctx.job_id, JobTransition::Started { at: Utc::now() })
        {
            Ok(_) => {
                tracing::info!("Job processing started");

                let transition = match AssertUnwindSafe(execute(&ctx)).catch_unwind().await {
                    Ok(transition) => transition,
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        tracing::error!("Job task panicked: {}", message);
                        JobTransition::Failed {
                            at: Utc::now(),
                            error: format!("Unexpected error during processing: {}", message),
                            details: None,
                        }
                    }
                };
                finish(&ctx, transition);
            }
            Err(StoreError::NotFound { .. }) => {
                tracing::warn!("Job was deleted before it started; skipping");
            }
            Err(e) => {
                tracing::error!("Could not start job: {}", e);
            }
        }

        match ctx.uploads.remove(&ctx.file_path).await {
            Ok(true) => tracing::debug!(file = %redact_path(&ctx.file_path), "Temp file removed"),
            Ok(false) => {}
            Err(e) => tracing::warn!("Temp file cleanup failed: {}", e),
        }
    }
    .instrument(span)
    .await
}

async fn execute(ctx: &JobContext) -> JobTransition {
    match ctx.pipeline.execute(&ctx.file_path, &ctx.filename).await {
        Ok(outcome) => classify(outcome),
        Err(e) => {
            tracing::error!("Pipeline infrastructure failure: {}", e);
            JobTransition::Failed {
                at: Utc::now(),
                error: CRITICAL_FAILURE_MESSAGE.to_string(),
                details: Some(ErrorDetails {
                    errors: vec![e.to_string()],
                    warnings: Vec::new(),
                    last_stage: UNKNOWN_STAGE.to_string(),
                }),
            }
        }
    }
}

fn classify(outcome: ExecutionOutcome) -> JobTransition {
    match outcome {
        ExecutionOutcome::Failed {
            stage,
            errors,
            warnings,
            ..
        } => JobTransition::Failed {
            at: Utc::now(),
            error: errors.join("; "),
            details: Some(ErrorDetails {
                errors,
                warnings,
                last_stage: stage,
            }),
        },
        completed => JobTransition::Completed {
            at: Utc::now(),
            result: completed,
        },
    }
}

fn finish(ctx: &JobContext, transition: JobTransition) {
    match ctx.store.transition(&ctx.job_id, transition) {
        Ok(record) => match record.status {
            JobStatus::Failed => tracing::warn!(
                error = record.error.as_deref().unwrap_or_default(),
                "Job failed"
            ),
            status => tracing::info!(status = %status, "Job finished"),
        },
        // Deletion wins: a result for a removed job is dropped, never re-inserted.
        Err(StoreError::NotFound { .. }) => {
            tracing::warn!("Job was deleted while processing; discarding its result")
        }
        Err(e) => tracing::error!("Could not record job outcome: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Metrics;

    #[test]
    fn test_classify_failed_joins_errors() {
        let transition = classify(ExecutionOutcome::Failed {
            stage: "llm_processing".to_string(),
            errors: vec!["first".to_string(), "second".to_string()],
            warnings: vec!["w".to_string()],
            metrics: Metrics::default(),
        });
        match transition {
            JobTransition::Failed { error, details, .. } => {
                assert_eq!(error, "first; second");
                let details = details.unwrap();
                assert_eq!(details.last_stage, "llm_processing");
                assert_eq!(details.warnings, vec!["w".to_string()]);
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_completed() {
        let outcome = ExecutionOutcome::Completed {
            stage: "llm_processing".to_string(),
            extracted_data: Default::default(),
            metrics: Metrics::default(),
            raw_text: "DNI".to_string(),
            ocr_confidence: Some(95.0),
            completeness: 0.0,
            warnings: vec![],
            debug_info: Default::default(),
        };
        assert!(matches!(
            classify(outcome),
            JobTransition::Completed { .. }
        ));
    }
}
