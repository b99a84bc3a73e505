//! Pipeline execution over real files with scripted services.

mod common;

use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use common::{png_bytes, FakeLlm, FakeOcr, DNI_JSON, DNI_TEXT};
use idscan::pipeline::{
    Checkpoint, CheckpointError, Checkpointer, ExecutionOutcome, MemoryCheckpointer, Pipeline,
};
use idscan::Config;

/// Delegates to the in-memory store and records which stages were saved.
#[derive(Default)]
struct RecordingCheckpointer {
    inner: MemoryCheckpointer,
    saved: Mutex<Vec<String>>,
}

impl RecordingCheckpointer {
    fn saved(&self) -> Vec<String> {
        self.saved.lock().unwrap().clone()
    }
}

impl Checkpointer for RecordingCheckpointer {
    fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        self.saved.lock().unwrap().push(checkpoint.stage.clone());
        self.inner.save(checkpoint)
    }

    fn latest(&self, run_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        self.inner.latest(run_id)
    }

    fn clear(&self, run_id: &str) {
        self.inner.clear(run_id)
    }
}

fn write_image(dir: &TempDir, name: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, png_bytes(2048)).unwrap();
    path
}

fn pipeline(ocr: FakeOcr, llm: FakeLlm) -> (Pipeline, Arc<RecordingCheckpointer>) {
    let checkpointer = Arc::new(RecordingCheckpointer::default());
    let pipeline = Pipeline::new(&Config::default(), Arc::new(ocr), Arc::new(llm))
        .with_checkpointer(checkpointer.clone());
    (pipeline, checkpointer)
}

#[test]
fn test_default_stage_order() {
    let (pipeline, _) = pipeline(FakeOcr::returning(DNI_TEXT), FakeLlm::replying(DNI_JSON));
    assert_eq!(pipeline.stage_names(), vec!["ocr_processing", "llm_processing"]);
}

#[tokio::test]
async fn test_successful_execution_carries_everything() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, "dni.png");
    let (pipeline, checkpointer) =
        pipeline(FakeOcr::returning(DNI_TEXT), FakeLlm::replying(DNI_JSON));

    let outcome = pipeline.execute(&path, "dni.png").await.unwrap();
    match outcome {
        ExecutionOutcome::Completed {
            stage,
            extracted_data,
            metrics,
            raw_text,
            ocr_confidence,
            completeness,
            debug_info,
            ..
        } => {
            assert_eq!(stage, "llm_processing");
            assert_eq!(raw_text, DNI_TEXT);
            assert_eq!(extracted_data.len(), 7);
            assert_eq!(completeness, 1.0);
            assert_eq!(metrics.tokens_used, 350);
            assert_eq!(
                metrics.llm_model.as_deref(),
                Some(Config::default().llm.model.as_str())
            );
            let confidence = ocr_confidence.unwrap();
            assert!(confidence > 85.0 && confidence < 100.0);
            assert!(debug_info.contains_key("image_processing_stats"));
            assert!(debug_info.contains_key("llm_stats"));
        }
        other => panic!("Expected Completed, got {:?}", other),
    }

    assert_eq!(checkpointer.saved(), vec!["ocr_processing", "llm_processing"]);
    assert_eq!(checkpointer.inner.run_count(), 0);
}

#[tokio::test]
async fn test_ocr_failure_short_circuits() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, "dni.png");
    let llm = FakeLlm::replying(DNI_JSON);
    let checkpointer = Arc::new(RecordingCheckpointer::default());
    let llm = Arc::new(llm);
    let pipeline = Pipeline::new(
        &Config::default(),
        Arc::new(FakeOcr::timing_out(30)),
        llm.clone(),
    )
    .with_checkpointer(checkpointer.clone());

    let outcome = pipeline.execute(&path, "dni.png").await.unwrap();
    assert!(!outcome.is_completed());
    assert_eq!(outcome.stage(), "ocr_processing");
    assert!(outcome.errors()[0].contains("timed out"));
    assert!(outcome.extracted_data().is_none());
    assert_eq!(llm.calls(), 0);
    assert_eq!(checkpointer.saved(), vec!["ocr_processing"]);
}

#[tokio::test]
async fn test_missing_file_fails_at_first_stage() {
    let dir = TempDir::new().unwrap();
    let (pipeline, _) = pipeline(FakeOcr::returning(DNI_TEXT), FakeLlm::replying(DNI_JSON));

    let outcome = pipeline
        .execute(&dir.path().join("gone.png"), "gone.png")
        .await
        .unwrap();
    assert_eq!(outcome.stage(), "ocr_processing");
    assert!(outcome.errors()[0].starts_with("File not found"));
}

#[tokio::test]
async fn test_non_json_reply_fails_at_extraction() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, "dni.png");
    let (pipeline, _) = pipeline(
        FakeOcr::returning(DNI_TEXT),
        FakeLlm::replying("Sorry, I cannot read this document."),
    );

    let outcome = pipeline.execute(&path, "dni.png").await.unwrap();
    assert_eq!(outcome.stage(), "llm_processing");
    assert!(outcome.errors()[0].contains("not valid JSON"));
}

#[tokio::test]
async fn test_array_reply_reports_shape() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, "dni.png");
    let (pipeline, _) = pipeline(FakeOcr::returning(DNI_TEXT), FakeLlm::replying("[1, 2]"));

    let outcome = pipeline.execute(&path, "dni.png").await.unwrap();
    assert!(outcome.errors()[0].contains("expected a JSON object"));
}
