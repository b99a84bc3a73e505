//! Google Cloud Vision `images:annotate` REST client.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{DocumentMode, OcrEngine, OcrError, OcrRequest, OcrResponse};
use crate::config::OcrConfig;
use crate::retry::RetryPolicy;
use crate::secrets::resolve_secret;

const ERROR_BODY_LIMIT: usize = 512;

pub struct GoogleVisionClient {
    http: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
    retry: RetryPolicy,
    api_key: Option<String>,
    api_key_file: Option<String>,
    api_key_env: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnnotateRequest {
    requests: Vec<ImageRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
    image_context: ImageContext,
}

#[derive(Debug, Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Debug, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    feature_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageContext {
    language_hints: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    full_text_annotation: Option<FullTextAnnotation>,
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct FullTextAnnotation {
    #[serde(default)]
    text: String,
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    blocks: Vec<Block>,
}

#[derive(Debug, Deserialize)]
struct Block {
    #[serde(default)]
    paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Deserialize)]
struct Paragraph {
    #[serde(default)]
    words: Vec<Word>,
}

#[derive(Debug, Deserialize)]
struct Word {
    #[serde(default)]
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
}

impl GoogleVisionClient {
    pub fn new(config: &OcrConfig) -> Result<Self, OcrError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OcrError::NotConfigured(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            timeout_secs: config.timeout_secs,
            retry: RetryPolicy::default().with_max_attempts(config.max_retries),
            api_key: config.api_key.clone(),
            api_key_file: config.api_key_file.clone(),
            api_key_env: config.api_key_env.clone(),
        })
    }

    fn resolve_key(&self) -> Result<SecretString, OcrError> {
        resolve_secret(
            self.api_key.as_deref(),
            self.api_key_file.as_deref(),
            self.api_key_env.as_deref(),
        )
        .map_err(|e| OcrError::NotConfigured(e.to_string()))
    }

    async fn annotate_once(
        &self,
        key: &SecretString,
        body: &AnnotateRequest,
    ) -> Result<OcrResponse, OcrError> {
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", key.expose_secret())])
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(OcrError::Http {
                status: status.as_u16(),
                body: truncate(&text, ERROR_BODY_LIMIT),
            });
        }

        let parsed: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| OcrError::InvalidResponse(e.to_string()))?;

        parse_response(parsed)
    }

    fn transport_error(&self, e: reqwest::Error) -> OcrError {
        if e.is_timeout() {
            OcrError::Timeout(self.timeout_secs)
        } else {
            OcrError::Request(e.to_string())
        }
    }
}

#[async_trait]
impl OcrEngine for GoogleVisionClient {
    fn name(&self) -> &str {
        "google_vision"
    }

    fn check_available(&self) -> Result<(), OcrError> {
        self.resolve_key().map(|_| ())
    }

    async fn detect_text(&self, request: OcrRequest) -> Result<OcrResponse, OcrError> {
        let key = self.resolve_key()?;
        let body = build_request(&request);

        tracing::debug!(
            bytes = request.image.len(),
            mode = ?request.mode,
            "Sending Vision annotate request"
        );

        self.retry
            .run("vision.annotate", || self.annotate_once(&key, &body))
            .await
    }
}

fn feature_for(mode: DocumentMode) -> &'static str {
    match mode {
        DocumentMode::Document => "DOCUMENT_TEXT_DETECTION",
        DocumentMode::Sparse => "TEXT_DETECTION",
    }
}

fn build_request(request: &OcrRequest) -> AnnotateRequest {
    AnnotateRequest {
        requests: vec![ImageRequest {
            image: ImageContent {
                content: BASE64.encode(&request.image),
            },
            features: vec![Feature {
                feature_type: feature_for(request.mode),
            }],
            image_context: ImageContext {
                language_hints: request.language_hints.clone(),
            },
        }],
    }
}

fn parse_response(response: AnnotateResponse) -> Result<OcrResponse, OcrError> {
    let first = response.responses.into_iter().next().unwrap_or_default();

    if let Some(error) = first.error.filter(|e| !e.message.is_empty()) {
        return Err(OcrError::Api(error.message));
    }

    match first.full_text_annotation {
        Some(annotation) => {
            let word_confidences = annotation
                .pages
                .iter()
                .flat_map(|p| &p.blocks)
                .flat_map(|b| &b.paragraphs)
                .flat_map(|p| &p.words)
                .map(|w| w.confidence)
                .collect();
            Ok(OcrResponse {
                full_text: annotation.text,
                word_confidences,
            })
        }
        None => Ok(OcrResponse {
            full_text: first
                .text_annotations
                .into_iter()
                .next()
                .map(|a| a.description)
                .unwrap_or_default(),
            word_confidences: Vec::new(),
        }),
    }
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_request_shape() {
        let body = build_request(&OcrRequest {
            image: vec![1, 2, 3],
            mode: DocumentMode::Document,
            language_hints: vec!["es".to_string()],
        });
        let json = serde_json::to_value(&body).unwrap();
        let req = &json["requests"][0];
        assert_eq!(req["image"]["content"], "AQID");
        assert_eq!(req["features"][0]["type"], "DOCUMENT_TEXT_DETECTION");
        assert_eq!(req["imageContext"]["languageHints"][0], "es");
    }

    #[test]
    fn test_sparse_mode_uses_text_detection() {
        assert_eq!(feature_for(DocumentMode::Sparse), "TEXT_DETECTION");
    }

    #[test]
    fn test_parse_full_text_and_word_confidences() {
        let raw = serde_json::json!({
            "responses": [{
                "fullTextAnnotation": {
                    "text": "REPUBLICA DEL PERU\nDNI 12345678\n",
                    "pages": [{ "blocks": [{ "paragraphs": [
                        { "words": [{ "confidence": 0.98 }, { "confidence": 0.91 }] },
                        { "words": [{ "confidence": 0.55 }] }
                    ]}]}]
                }
            }]
        });
        let parsed: AnnotateResponse = serde_json::from_value(raw).unwrap();
        let result = parse_response(parsed).unwrap();
        assert!(result.full_text.contains("12345678"));
        assert_eq!(result.word_confidences, vec![0.98, 0.91, 0.55]);
    }

    #[test]
    fn test_parse_falls_back_to_text_annotations() {
        let raw = serde_json::json!({
            "responses": [{ "textAnnotations": [{ "description": "HOLA" }] }]
        });
        let parsed: AnnotateResponse = serde_json::from_value(raw).unwrap();
        let result = parse_response(parsed).unwrap();
        assert_eq!(result.full_text, "HOLA");
        assert!(result.word_confidences.is_empty());
    }

    #[test]
    fn test_parse_embedded_error() {
        let raw = serde_json::json!({
            "responses": [{ "error": { "code": 3, "message": "Bad image data." } }]
        });
        let parsed: AnnotateResponse = serde_json::from_value(raw).unwrap();
        match parse_response(parsed) {
            Err(OcrError::Api(message)) => assert_eq!(message, "Bad image data."),
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_response_is_empty_text() {
        let parsed: AnnotateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(parse_response(parsed).unwrap(), OcrResponse::default());
    }

    #[test]
    #[serial]
    fn test_missing_key_is_not_configured() {
        std::env::remove_var("IDSCAN_TEST_VISION_KEY");
        let config = OcrConfig {
            api_key_env: Some("IDSCAN_TEST_VISION_KEY".to_string()),
            ..OcrConfig::default()
        };
        let client = GoogleVisionClient::new(&config).unwrap();
        assert!(matches!(
            client.check_available(),
            Err(OcrError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_direct_key_is_available() {
        let config = OcrConfig {
            api_key: Some("vision-key".to_string()),
            ..OcrConfig::default()
        };
        let client = GoogleVisionClient::new(&config).unwrap();
        assert!(client.check_available().is_ok());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }
}
