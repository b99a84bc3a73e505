pub mod checkpoint;
pub mod error;
pub mod fields;
pub mod prompt;
pub mod runner;
pub mod stage;
pub mod state;
pub mod structured_extraction;
pub mod text_acquisition;

pub use checkpoint::{Checkpoint, Checkpointer, MemoryCheckpointer};
pub use error::{CheckpointError, PipelineError};
pub use fields::{ExtractedData, IdField};
pub use runner::{ExecutionOutcome, Pipeline};
pub use stage::{Stage, StageOutcome};
pub use state::{Metrics, PipelineState, StageStatus};
pub use structured_extraction::StructuredExtraction;
pub use text_acquisition::TextAcquisition;
