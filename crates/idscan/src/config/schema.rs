use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::ocr::DocumentMode;

pub const CONFIG_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_temp_directory")]
    pub temp_directory: PathBuf,
    #[serde(default = "default_max_image_size_mb")]
    pub max_image_size_mb: u64,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn max_image_size_bytes(&self) -> u64 {
        self.max_image_size_mb * 1024 * 1024
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            temp_directory: default_temp_directory(),
            max_image_size_mb: default_max_image_size_mb(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            ocr: OcrConfig::default(),
            llm: LlmConfig::default(),
            quality: QualityConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

fn default_temp_directory() -> PathBuf {
    std::env::temp_dir().join("idscan-uploads")
}

fn default_max_image_size_mb() -> u64 {
    10
}

fn default_max_concurrent_jobs() -> usize {
    num_cpus::get()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_ocr_engine")]
    pub engine: String,
    #[serde(default = "default_ocr_language")]
    pub language: String,
    #[serde(default)]
    pub mode: DocumentMode,
    /// Percent (0-100). Words below this count as low confidence.
    #[serde(default = "default_ocr_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_ocr_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_ocr_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_ocr_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_ocr_api_key_env")]
    pub api_key_env: Option<String>,
}

fn default_ocr_engine() -> String {
    "google_vision".to_string()
}

fn default_ocr_language() -> String {
    "es".to_string()
}

fn default_ocr_confidence_threshold() -> f64 {
    60.0
}

fn default_ocr_timeout_secs() -> u64 {
    30
}

fn default_ocr_max_retries() -> u32 {
    3
}

fn default_ocr_endpoint() -> String {
    "https://vision.googleapis.com/v1/images:annotate".to_string()
}

fn default_ocr_api_key_env() -> Option<String> {
    Some("GOOGLE_VISION_API_KEY".to_string())
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: default_ocr_engine(),
            language: default_ocr_language(),
            mode: DocumentMode::default(),
            confidence_threshold: default_ocr_confidence_threshold(),
            timeout_secs: default_ocr_timeout_secs(),
            max_retries: default_ocr_max_retries(),
            endpoint: default_ocr_endpoint(),
            api_key: None,
            api_key_file: None,
            api_key_env: default_ocr_api_key_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_top_p")]
    pub top_p: f32,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: Option<String>,
    /// USD per 1K tokens, keyed by model id.
    #[serde(default = "default_pricing")]
    pub pricing: HashMap<String, ModelPricing>,
}

impl LlmConfig {
    /// Input price per single token for the configured model, zero when unknown.
    pub fn price_per_token(&self) -> f64 {
        self.pricing
            .get(&self.model)
            .map(|p| p.input / 1000.0)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// USD per 1K prompt tokens.
    pub input: f64,
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_temperature() -> f32 {
    0.1
}

fn default_llm_top_p() -> f32 {
    0.9
}

fn default_llm_max_tokens() -> u32 {
    1500
}

fn default_llm_request_timeout_secs() -> u64 {
    120
}

fn default_llm_max_retries() -> u32 {
    3
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_api_key_env() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}

fn default_pricing() -> HashMap<String, ModelPricing> {
    HashMap::from([
        (
            "gpt-4o".to_string(),
            ModelPricing { input: 0.0025 },
        ),
        (
            "gpt-4o-mini".to_string(),
            ModelPricing { input: 0.00015 },
        ),
        (
            "gpt-3.5-turbo".to_string(),
            ModelPricing { input: 0.001 },
        ),
    ])
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            top_p: default_llm_top_p(),
            max_tokens: default_llm_max_tokens(),
            request_timeout_secs: default_llm_request_timeout_secs(),
            max_retries: default_llm_max_retries(),
            base_url: default_llm_base_url(),
            api_key: None,
            api_key_file: None,
            api_key_env: default_llm_api_key_env(),
            pricing: default_pricing(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    #[serde(default = "default_completeness_threshold")]
    pub completeness_threshold: f64,
}

fn default_completeness_threshold() -> f64 {
    0.8
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            completeness_threshold: default_completeness_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
