//! Stage A: validate the image and run OCR on it.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use super::stage::{Stage, StageOutcome};
use super::state::PipelineState;
use crate::config::Config;
use crate::intake::{size_in_mb, ImageKind, SUPPORTED_EXTENSIONS};
use crate::ocr::{ConfidenceStats, DocumentMode, OcrEngine, OcrRequest};
use crate::sanitize::{file_extension, redact_path};

pub const STAGE_NAME: &str = "ocr_processing";

pub struct TextAcquisition {
    ocr: Arc<dyn OcrEngine>,
    max_bytes: u64,
    language: String,
    confidence_threshold: f64,
    mode: DocumentMode,
}

impl TextAcquisition {
    pub fn new(config: &Config, ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            ocr,
            max_bytes: config.max_image_size_bytes(),
            language: config.ocr.language.clone(),
            confidence_threshold: config.ocr.confidence_threshold,
            mode: config.ocr.mode,
        }
    }

    async fn acquire(&self, state: &mut PipelineState) -> Result<(), String> {
        let started = Instant::now();

        self.ocr
            .check_available()
            .map_err(|e| format!("OCR service unavailable: {}", e))?;

        if !image_decoding_available() {
            return Err("Image decoding support is not available".to_string());
        }

        let path = state.document.file_path.clone();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|_| format!("File not found: {}", redact_path(&path)))?;
        if !metadata.is_file() {
            return Err(format!("File not found: {}", redact_path(&path)));
        }

        let extension = extension_of(&path, &state.document.filename);
        if ImageKind::from_extension(&extension).is_none() {
            return Err(format!(
                "Unsupported file format: .{} (supported: {})",
                extension,
                SUPPORTED_EXTENSIONS.join(", ")
            ));
        }

        let file_size = metadata.len();
        if file_size > self.max_bytes {
            return Err(format!(
                "File too large: {:.2}MB (maximum {:.0}MB)",
                size_in_mb(file_size),
                size_in_mb(self.max_bytes)
            ));
        }

        let image = tokio::fs::read(&path)
            .await
            .map_err(|e| format!("Failed to read image {}: {}", redact_path(&path), e))?;
        let dimensions = image_dimensions(&image);

        let response = self
            .ocr
            .detect_text(OcrRequest {
                image,
                mode: self.mode,
                language_hints: vec![self.language.clone()],
            })
            .await
            .map_err(|e| format!("OCR failed: {}", e))?;

        let text = response.full_text.trim();
        if text.is_empty() {
            return Err("No text detected in the image".to_string());
        }

        let stats =
            ConfidenceStats::from_word_confidences(&response.word_confidences, self.confidence_threshold);
        if stats.is_low(self.confidence_threshold) {
            state.add_warning(format!(
                "Low OCR confidence: {:.1}% (threshold {:.0}%)",
                stats.average_confidence, self.confidence_threshold
            ));
        }

        let char_count = text.chars().count();
        let elapsed = started.elapsed().as_secs_f64();
        tracing::info!(characters = char_count, words = stats.total_words, "OCR text acquired");
        tracing::debug!(text = %text, "OCR raw text");

        state.processing_data.raw_text = Some(text.to_string());
        state.processing_data.ocr_confidence = Some(stats.average_confidence);
        state.document.file_size = file_size;
        state.metrics.processing_time += elapsed;
        state.add_message(format!("Extracted {} characters of text", char_count));
        state.set_debug(
            "image_processing_stats",
            json!({
                "file_size_bytes": file_size,
                "file_size_mb": (size_in_mb(file_size) * 100.0).round() / 100.0,
                "processing_time": elapsed,
                "character_count": char_count,
                "extension": extension,
                "ocr_engine": self.ocr.name(),
                "dimensions": dimensions.map(|(w, h)| json!({ "width": w, "height": h })),
                "confidence": stats,
            }),
        );

        Ok(())
    }
}

#[async_trait]
impl Stage for TextAcquisition {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn run(&self, mut state: PipelineState) -> StageOutcome {
        if state.is_failed() {
            return StageOutcome::Halted(state);
        }
        state.update_stage(STAGE_NAME);

        if let Err(error) = self.acquire(&mut state).await {
            state.add_error(error);
        }

        StageOutcome::from_state(state)
    }
}

/// The stored file carries the upload's extension; fall back to the original name.
fn extension_of(path: &Path, filename: &str) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(file_extension)
        .or_else(|| file_extension(filename))
        .unwrap_or_default()
}

/// True when every accepted upload format can be decoded by this build.
pub fn image_decoding_available() -> bool {
    SUPPORTED_EXTENSIONS.iter().all(|ext| {
        image::ImageFormat::from_extension(ext)
            .map(|format| format.reading_enabled())
            .unwrap_or(false)
    })
}

fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    match reader.into_dimensions() {
        Ok(dimensions) => Some(dimensions),
        Err(e) => {
            tracing::debug!("Could not read image dimensions: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{OcrError, OcrResponse};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedOcr {
        available: bool,
        text: String,
        calls: AtomicUsize,
        modes: Mutex<Vec<DocumentMode>>,
    }

    impl ScriptedOcr {
        fn new(text: &str) -> Arc<Self> {
            Arc::new(Self {
                available: true,
                text: text.to_string(),
                calls: AtomicUsize::new(0),
                modes: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl OcrEngine for ScriptedOcr {
        fn name(&self) -> &str {
            "scripted"
        }

        fn check_available(&self) -> Result<(), OcrError> {
            if self.available {
                Ok(())
            } else {
                Err(OcrError::NotConfigured("no key".to_string()))
            }
        }

        async fn detect_text(&self, request: OcrRequest) -> Result<OcrResponse, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.modes.lock().unwrap().push(request.mode);
            Ok(OcrResponse {
                full_text: self.text.clone(),
                word_confidences: vec![0.9, 0.95],
            })
        }
    }

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    fn write_file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn test_success_stores_trimmed_text_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "dni.png", PNG);
        let ocr = ScriptedOcr::new("  REPUBLICA DEL PERU\nDNI 12345678  ");
        let stage = TextAcquisition::new(&Config::default(), ocr.clone());

        let outcome = stage.run(PipelineState::new(&path, "dni.png", 10)).await;
        assert!(!outcome.is_halted());
        let state = outcome.into_state();
        assert_eq!(
            state.processing_data.raw_text.as_deref(),
            Some("REPUBLICA DEL PERU\nDNI 12345678")
        );
        assert_eq!(state.stage(), STAGE_NAME);
        assert!(state.processing_data.ocr_confidence.unwrap() > 90.0);
        let stats = &state.logging.debug_info["image_processing_stats"];
        assert_eq!(stats["extension"], "png");
        assert_eq!(stats["character_count"], 31);
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_configured_mode_reaches_engine() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "scene.png", PNG);
        let mut config = Config::default();
        config.ocr.mode = DocumentMode::Sparse;
        let ocr = ScriptedOcr::new("PERU");

        TextAcquisition::new(&config, ocr.clone())
            .run(PipelineState::new(&path, "scene.png", 10))
            .await;
        TextAcquisition::new(&Config::default(), ocr.clone())
            .run(PipelineState::new(&path, "scene.png", 10))
            .await;

        assert_eq!(
            *ocr.modes.lock().unwrap(),
            vec![DocumentMode::Sparse, DocumentMode::Document]
        );
    }

    #[tokio::test]
    async fn test_empty_text_fails_without_crash() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "dni.png", PNG);
        let stage = TextAcquisition::new(&Config::default(), ScriptedOcr::new("   \n "));

        let state = stage
            .run(PipelineState::new(&path, "dni.png", 10))
            .await
            .into_state();
        assert!(state.is_failed());
        assert!(state.logging.errors[0].to_lowercase().contains("no text"));
    }

    #[tokio::test]
    async fn test_unavailable_ocr_checked_first() {
        let stage = TextAcquisition::new(
            &Config::default(),
            Arc::new(ScriptedOcr {
                available: false,
                text: String::new(),
                calls: AtomicUsize::new(0),
                modes: Mutex::new(Vec::new()),
            }),
        );
        let state = stage
            .run(PipelineState::new("/nonexistent/x.gif", "x.gif", 0))
            .await
            .into_state();
        assert_eq!(state.logging.errors.len(), 1);
        assert!(state.logging.errors[0].starts_with("OCR service unavailable"));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let ocr = ScriptedOcr::new("text");
        let stage = TextAcquisition::new(&Config::default(), ocr.clone());
        let state = stage
            .run(PipelineState::new("/nonexistent/dir/dni.png", "dni.png", 0))
            .await
            .into_state();
        assert!(state.logging.errors[0].contains("File not found: dni.png"));
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "scan.gif", b"GIF89a");
        let stage = TextAcquisition::new(&Config::default(), ScriptedOcr::new("text"));
        let state = stage
            .run(PipelineState::new(&path, "scan.gif", 6))
            .await
            .into_state();
        assert!(state.logging.errors[0].starts_with("Unsupported file format: .gif"));
    }

    #[tokio::test]
    async fn test_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = PNG.to_vec();
        bytes.resize(1024 * 1024 + 1, 0);
        let path = write_file(&dir, "big.png", &bytes);
        let config = Config {
            max_image_size_mb: 1,
            ..Config::default()
        };
        let ocr = ScriptedOcr::new("text");
        let stage = TextAcquisition::new(&config, ocr.clone());
        let state = stage
            .run(PipelineState::new(&path, "big.png", 0))
            .await
            .into_state();
        assert!(state.logging.errors[0].starts_with("File too large"));
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_input_passes_through() {
        let ocr = ScriptedOcr::new("text");
        let stage = TextAcquisition::new(&Config::default(), ocr.clone());
        let mut input = PipelineState::new("/tmp/a.png", "a.png", 0);
        input.add_error("earlier failure");
        let outcome = stage.run(input.clone()).await;
        assert!(outcome.is_halted());
        assert_eq!(outcome.into_state(), input);
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_decoding_available_with_enabled_features() {
        assert!(image_decoding_available());
    }

    #[test]
    fn test_extension_prefers_stored_path() {
        assert_eq!(extension_of(Path::new("/tmp/upload_1_a.PNG"), "a.jpg"), "png");
        assert_eq!(extension_of(Path::new("/tmp/noext"), "a.jpg"), "jpg");
    }
}
