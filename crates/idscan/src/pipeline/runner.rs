use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::llm::{LlmClient, OpenAiClient};
use crate::ocr::{GoogleVisionClient, OcrEngine};
use crate::sanitize;

use super::checkpoint::{Checkpoint, Checkpointer, MemoryCheckpointer};
use super::error::{CheckpointError, PipelineError};
use super::fields::{completeness, ExtractedData};
use super::stage::Stage;
use super::state::{Metrics, PipelineState, StageStatus};
use super::structured_extraction::StructuredExtraction;
use super::text_acquisition::TextAcquisition;

/// Final, normalized result of one pipeline execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionOutcome {
    Completed {
        stage: String,
        extracted_data: ExtractedData,
        metrics: Metrics,
        raw_text: String,
        ocr_confidence: Option<f64>,
        completeness: f64,
        warnings: Vec<String>,
        debug_info: Map<String, Value>,
    },
    Failed {
        stage: String,
        errors: Vec<String>,
        warnings: Vec<String>,
        metrics: Metrics,
    },
}

impl ExecutionOutcome {
    pub fn from_state(state: PipelineState) -> Self {
        let stage = state.control.processing_stage;
        match state.control.status {
            StageStatus::Completed => ExecutionOutcome::Completed {
                stage,
                completeness: state
                    .processing_data
                    .completeness
                    .unwrap_or_else(|| completeness(&state.extracted_data)),
                extracted_data: state.extracted_data,
                metrics: state.metrics,
                raw_text: state.processing_data.raw_text.unwrap_or_default(),
                ocr_confidence: state.processing_data.ocr_confidence,
                warnings: state.logging.warnings,
                debug_info: state.logging.debug_info,
            },
            StageStatus::Failed | StageStatus::Processing => {
                let mut errors = state.logging.errors;
                if errors.is_empty() {
                    errors.push(format!("Pipeline stopped at stage '{}' without completing", stage));
                }
                ExecutionOutcome::Failed {
                    stage,
                    errors,
                    warnings: state.logging.warnings,
                    metrics: state.metrics,
                }
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed { .. })
    }

    pub fn stage(&self) -> &str {
        match self {
            ExecutionOutcome::Completed { stage, .. } | ExecutionOutcome::Failed { stage, .. } => {
                stage
            }
        }
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            ExecutionOutcome::Completed { warnings, .. }
            | ExecutionOutcome::Failed { warnings, .. } => warnings,
        }
    }

    pub fn errors(&self) -> &[String] {
        match self {
            ExecutionOutcome::Completed { .. } => &[],
            ExecutionOutcome::Failed { errors, .. } => errors,
        }
    }

    pub fn extracted_data(&self) -> Option<&ExtractedData> {
        match self {
            ExecutionOutcome::Completed { extracted_data, .. } => Some(extracted_data),
            ExecutionOutcome::Failed { .. } => None,
        }
    }
}

pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    checkpointer: Arc<dyn Checkpointer>,
}

impl Pipeline {
    /// Production constructor: builds the Vision and OpenAI clients from config.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let ocr = GoogleVisionClient::new(&config.ocr)
            .map_err(|e| PipelineError::Setup(e.to_string()))?;
        let llm = OpenAiClient::new(&config.llm).map_err(|e| PipelineError::Setup(e.to_string()))?;
        Ok(Self::new(config, Arc::new(ocr), Arc::new(llm)))
    }

    pub fn new(config: &Config, ocr: Arc<dyn OcrEngine>, llm: Arc<dyn LlmClient>) -> Self {
        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(TextAcquisition::new(config, ocr)),
            Arc::new(StructuredExtraction::new(config, llm)),
        ];
        Self::with_stages(stages)
    }

    pub fn with_stages(stages: Vec<Arc<dyn Stage>>) -> Self {
        Self {
            stages,
            checkpointer: Arc::new(MemoryCheckpointer::new()),
        }
    }

    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = checkpointer;
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs every stage in order over a fresh state for `file_path`.
    ///
    /// Stage failures come back as [`ExecutionOutcome::Failed`]. `Err` is
    /// reserved for failures of the machinery itself: a panicking stage or a
    /// checkpoint that cannot be saved or restored.
    pub async fn execute(
        &self,
        file_path: &Path,
        filename: &str,
    ) -> Result<ExecutionOutcome, PipelineError> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("pipeline",
            run_id = %run_id,
            filename = %sanitize::redact_path(Path::new(filename)),
        );

        async {
            let file_size = match tokio::fs::metadata(file_path).await {
                Ok(metadata) => metadata.len(),
                Err(_) => 0,
            };
            let state = PipelineState::new(file_path, filename, file_size);

            let result = self.run_stages(&run_id, state).await;
            self.checkpointer.clear(&run_id);

            let outcome = ExecutionOutcome::from_state(result?);
            match &outcome {
                ExecutionOutcome::Completed { .. } => {
                    tracing::info!(stage = outcome.stage(), "Pipeline completed")
                }
                ExecutionOutcome::Failed { errors, .. } => {
                    tracing::warn!(stage = outcome.stage(), errors = ?errors, "Pipeline failed")
                }
            }
            Ok::<_, PipelineError>(outcome)
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        run_id: &str,
        mut state: PipelineState,
    ) -> Result<PipelineState, PipelineError> {
        for (step, stage) in self.stages.iter().enumerate() {
            let name = stage.name();
            let outcome = AssertUnwindSafe(stage.run(state))
                .catch_unwind()
                .instrument(info_span!("stage", name))
                .await
                .map_err(|panic| PipelineError::StagePanicked {
                    stage: name.to_string(),
                    message: panic_message(panic.as_ref()),
                })?;

            let halted = outcome.is_halted();
            let checkpoint = Checkpoint::capture(run_id, step, name, outcome.state())?;
            self.checkpointer.save(checkpoint)?;
            state = self
                .checkpointer
                .latest(run_id)?
                .ok_or_else(|| CheckpointError::Missing {
                    run_id: run_id.to_string(),
                })?
                .restore()?;

            if halted {
                tracing::debug!(stage = name, "Pipeline short-circuited");
                break;
            }
        }

        Ok(state)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
