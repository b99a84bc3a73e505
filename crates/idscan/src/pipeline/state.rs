//! The record threaded through both stages of one execution.

use std::path::PathBuf;

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::fields::ExtractedData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub file_path: PathBuf,
    pub filename: String,
    pub file_size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingData {
    pub raw_text: Option<String>,
    /// Average word confidence, percent.
    pub ocr_confidence: Option<f64>,
    pub completeness: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingControl {
    pub processing_stage: String,
    pub status: StageStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub tokens_used: u64,
    /// Seconds spent inside stages.
    pub processing_time: f64,
    /// USD.
    pub cost_estimate: f64,
    pub llm_model: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub messages: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub debug_info: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub document: DocumentInfo,
    pub processing_data: ProcessingData,
    pub control: ProcessingControl,
    pub metrics: Metrics,
    pub logging: ExecutionLog,
    pub extracted_data: ExtractedData,
}

pub const INITIAL_STAGE: &str = "initialized";

impl PipelineState {
    pub fn new(file_path: impl Into<PathBuf>, filename: impl Into<String>, file_size: u64) -> Self {
        Self {
            document: DocumentInfo {
                file_path: file_path.into(),
                filename: filename.into(),
                file_size,
            },
            processing_data: ProcessingData::default(),
            control: ProcessingControl {
                processing_stage: INITIAL_STAGE.to_string(),
                status: StageStatus::Processing,
            },
            metrics: Metrics::default(),
            logging: ExecutionLog::default(),
            extracted_data: ExtractedData::new(),
        }
    }

    pub fn stage(&self) -> &str {
        &self.control.processing_stage
    }

    pub fn status(&self) -> StageStatus {
        self.control.status
    }

    pub fn is_failed(&self) -> bool {
        self.control.status == StageStatus::Failed
    }

    pub fn update_stage(&mut self, stage: &str) {
        self.control.processing_stage = stage.to_string();
        self.add_message(format!("Starting stage: {}", stage));
    }

    pub fn add_message(&mut self, message: impl AsRef<str>) {
        self.logging.messages.push(timestamped(message.as_ref()));
    }

    /// Records an error and marks the state failed. Failure is permanent.
    pub fn add_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        tracing::warn!(stage = %self.control.processing_stage, "{}", error);
        self.logging.errors.push(error);
        self.control.status = StageStatus::Failed;
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.logging.warnings.push(warning.into());
    }

    pub fn set_debug(&mut self, key: &str, value: Value) {
        self.logging.debug_info.insert(key.to_string(), value);
    }

    /// No-op once the state has failed.
    pub fn mark_completed(&mut self) {
        if !self.is_failed() {
            self.control.status = StageStatus::Completed;
        }
    }
}

fn timestamped(message: &str) -> String {
    format!("[{}] {}", Local::now().format("%H:%M:%S"), message)
}
