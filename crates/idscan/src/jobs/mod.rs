pub mod error;
pub mod queue;
pub mod record;
pub mod store;
pub mod tracker;
pub mod uploads;

pub use error::{StoreError, TrackerError};
pub use queue::{JobHandle, TaskQueue};
pub use record::{
    DeleteReceipt, DeletedJob, ErrorDetails, HealthReport, JobList, JobMetadata, JobRecord,
    JobResultView, JobStatus, JobStatusView, JobSummary, JobTicket, JobTransition,
};
pub use store::{JobCounts, JobStore, MemoryJobStore};
pub use tracker::{JobTracker, CRITICAL_FAILURE_MESSAGE, DEFAULT_LIST_LIMIT};
pub use uploads::TempUploads;
