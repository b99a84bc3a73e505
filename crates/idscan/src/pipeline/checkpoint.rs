//! State snapshots taken between stages.
//!
//! Every stage boundary goes through one serialize/deserialize round, so the
//! next stage always starts from a state that survived persistence.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::CheckpointError;
use super::state::PipelineState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: String,
    /// Zero-based index of the stage that produced this snapshot.
    pub step: usize,
    pub stage: String,
    pub saved_at: DateTime<Utc>,
    pub state: serde_json::Value,
}

impl Checkpoint {
    pub fn capture(
        run_id: &str,
        step: usize,
        stage: &str,
        state: &PipelineState,
    ) -> Result<Self, CheckpointError> {
        Ok(Self {
            run_id: run_id.to_string(),
            step,
            stage: stage.to_string(),
            saved_at: Utc::now(),
            state: serde_json::to_value(state).map_err(CheckpointError::Serialize)?,
        })
    }

    pub fn restore(&self) -> Result<PipelineState, CheckpointError> {
        serde_json::from_value(self.state.clone()).map_err(CheckpointError::Restore)
    }
}

pub trait Checkpointer: Send + Sync {
    fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError>;

    fn latest(&self, run_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;

    fn clear(&self, run_id: &str);
}

/// Process-local checkpoints keyed by run id.
#[derive(Default)]
pub struct MemoryCheckpointer {
    runs: Mutex<HashMap<String, Vec<Checkpoint>>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Checkpoint>>> {
        match self.runs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Checkpoint lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Checkpointer for MemoryCheckpointer {
    fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        self.lock()
            .entry(checkpoint.run_id.clone())
            .or_default()
            .push(checkpoint);
        Ok(())
    }

    fn latest(&self, run_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self
            .lock()
            .get(run_id)
            .and_then(|history| history.last().cloned()))
    }

    fn clear(&self, run_id: &str) {
        self.lock().remove(run_id);
    }
}
