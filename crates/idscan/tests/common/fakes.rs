//! Scripted stand-ins for the OCR and LLM services.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use idscan::llm::{Completion, CompletionRequest, LlmClient, LlmError};
use idscan::ocr::{OcrEngine, OcrError, OcrRequest, OcrResponse};

pub const DNI_TEXT: &str = "REPUBLICA DEL PERU\nDOCUMENTO NACIONAL DE IDENTIDAD\n\
DNI 12345678\nPRIMER APELLIDO PEREZ\nSEGUNDO APELLIDO GOMEZ\nPRE NOMBRES JUAN CARLOS\n\
FECHA EMISION 10/05/2019\nFECHA CADUCIDAD 10/05/2027";

pub const DNI_JSON: &str = r#"{
    "apellido_paterno": "Perez",
    "apellido_materno": "Gomez",
    "nombres": "Juan Carlos",
    "fecha_emision": "10/05/2019",
    "fecha_caducidad": "10/05/2027",
    "tipo_documento": "dni",
    "numero_documento": "1234 5678"
}"#;

/// PNG signature followed by zero padding up to `len` bytes.
pub fn png_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.resize(len.max(bytes.len()), 0);
    bytes
}

/// JPEG start-of-image marker followed by zero padding up to `len` bytes.
pub fn jpeg_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.resize(len.max(bytes.len()), 0);
    bytes
}

pub struct FakeOcr {
    text: String,
    timeout_secs: Option<u64>,
    gate: Option<Arc<Notify>>,
    crashes: bool,
    calls: AtomicUsize,
}

impl FakeOcr {
    pub fn returning(text: &str) -> Self {
        Self {
            text: text.to_string(),
            timeout_secs: None,
            gate: None,
            crashes: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn timing_out(secs: u64) -> Self {
        Self {
            timeout_secs: Some(secs),
            ..Self::returning("")
        }
    }

    /// Panics inside `detect_text`, as a broken client library would.
    pub fn crashing() -> Self {
        Self {
            crashes: true,
            ..Self::returning("")
        }
    }

    /// Blocks every call until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrEngine for FakeOcr {
    fn name(&self) -> &str {
        "fake-ocr"
    }

    fn check_available(&self) -> Result<(), OcrError> {
        Ok(())
    }

    async fn detect_text(&self, _request: OcrRequest) -> Result<OcrResponse, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.crashes {
            panic!("vision client crashed");
        }
        if let Some(secs) = self.timeout_secs {
            return Err(OcrError::Timeout(secs));
        }
        Ok(OcrResponse {
            full_text: self.text.clone(),
            word_confidences: vec![0.96, 0.91, 0.88],
        })
    }
}

pub struct FakeLlm {
    reply: String,
    tokens_used: u64,
    calls: AtomicUsize,
}

impl FakeLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            tokens_used: 350,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    fn name(&self) -> &str {
        "fake-llm"
    }

    fn check_available(&self) -> Result<(), LlmError> {
        Ok(())
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<Completion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Completion {
            content: self.reply.clone(),
            tokens_used: self.tokens_used,
        })
    }
}
