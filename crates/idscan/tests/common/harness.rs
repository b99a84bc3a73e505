//! Isolated tracker setup for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use idscan::jobs::{JobStatus, JobStatusView};
use idscan::{Config, JobTracker, Pipeline};

use super::fakes::{FakeLlm, FakeOcr};

pub struct TestHarness {
    /// Keeps the upload directory alive for the test's duration.
    temp_dir: TempDir,
    pub config: Config,
    pub ocr: Arc<FakeOcr>,
    pub llm: Arc<FakeLlm>,
    pub tracker: JobTracker,
}

impl TestHarness {
    pub fn new(ocr: FakeOcr, llm: FakeLlm) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = test_config(temp_dir.path());
        Self::with_config(temp_dir, config, ocr, llm)
    }

    pub fn with_config(temp_dir: TempDir, config: Config, ocr: FakeOcr, llm: FakeLlm) -> Self {
        let ocr = Arc::new(ocr);
        let llm = Arc::new(llm);
        let pipeline = Arc::new(Pipeline::new(&config, ocr.clone(), llm.clone()));
        let tracker = JobTracker::new(&config, pipeline);
        Self {
            temp_dir,
            config,
            ocr,
            llm,
            tracker,
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.temp_directory
    }

    /// Files currently left in the upload directory.
    pub fn stored_uploads(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.upload_dir()) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Polls until the job leaves PENDING/PROCESSING or the timeout passes.
    pub async fn wait_for_terminal(&self, job_id: &str, timeout: Duration) -> JobStatusView {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let view = self
                .tracker
                .get_status(job_id)
                .expect("job should exist while polling");
            if view.status.is_terminal() || tokio::time::Instant::now() >= deadline {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub fn status_of(&self, job_id: &str) -> Option<JobStatus> {
        self.tracker.get_status(job_id).ok().map(|v| v.status)
    }
}

pub fn test_config(dir: &Path) -> Config {
    Config {
        temp_directory: dir.join("uploads"),
        max_image_size_mb: 10,
        max_concurrent_jobs: 2,
        ..Config::default()
    }
}
