//! Job record storage.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::error::StoreError;
use super::record::{JobRecord, JobTransition};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    /// PENDING or PROCESSING.
    pub active: usize,
    pub total: usize,
}

/// Storage for job records. The tracker only talks to this trait, so an
/// external store can replace the in-memory one without changing callers.
pub trait JobStore: Send + Sync {
    fn insert(&self, record: JobRecord) -> Result<(), StoreError>;

    fn get(&self, job_id: &str) -> Option<JobRecord>;

    /// All records, newest first.
    fn list(&self) -> Vec<JobRecord>;

    fn remove(&self, job_id: &str) -> Option<JobRecord>;

    /// Applies a status transition atomically and returns the updated record.
    fn transition(&self, job_id: &str, transition: JobTransition) -> Result<JobRecord, StoreError>;

    fn counts(&self) -> JobCounts;
}

/// Process-lifetime store backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, JobRecord>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, JobRecord>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl JobStore for MemoryJobStore {
    fn insert(&self, record: JobRecord) -> Result<(), StoreError> {
        let mut jobs = self.write();
        if jobs.contains_key(&record.job_id) {
            return Err(StoreError::Duplicate {
                job_id: record.job_id,
            });
        }
        jobs.insert(record.job_id.clone(), record);
        Ok(())
    }

    fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.read().get(job_id).cloned()
    }

    fn list(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self.read().values().cloned().collect();
        jobs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        jobs
    }

    fn remove(&self, job_id: &str) -> Option<JobRecord> {
        self.write().remove(job_id)
    }

    fn transition(&self, job_id: &str, transition: JobTransition) -> Result<JobRecord, StoreError> {
        let mut jobs = self.write();
        let record = jobs.get_mut(job_id).ok_or_else(|| StoreError::NotFound {
            job_id: job_id.to_string(),
        })?;
        record.apply(transition)?;
        Ok(record.clone())
    }

    fn counts(&self) -> JobCounts {
        let jobs = self.read();
        JobCounts {
            active: jobs.values().filter(|j| j.status.is_active()).count(),
            total: jobs.len(),
        }
    }
}
