use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::config::schema::{Config, CONFIG_VERSION};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Reads and validates a JSON config file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&raw)
}

/// Parses `raw`, checks it against the embedded schema, applies defaults and
/// runs [`validate_config`].
pub fn load_config_from_str(raw: &str) -> Result<Config, ConfigError> {
    let document: Value = serde_json::from_str(raw)?;
    check_schema(&document)?;

    let config = Config::deserialize(document)?;
    validate_config(&config)?;
    Ok(config)
}

fn check_schema(document: &Value) -> Result<(), ConfigError> {
    let schema: Value = serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Rejected {
        message: format!("embedded schema is not JSON: {}", e),
    })?;
    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Rejected {
        message: format!("embedded schema does not compile: {}", e),
    })?;

    let problems: Vec<String> = validator.iter_errors(document).map(|e| e.to_string()).collect();
    if !problems.is_empty() {
        return Err(ConfigError::Schema {
            errors: problems.join("; "),
        });
    }
    Ok(())
}

/// Semantic checks that the schema cannot express (or that must hold for
/// configs built in code rather than parsed).
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::Rejected {
            message: format!("unsupported version '{}' (expected {})", config.version, CONFIG_VERSION),
        });
    }

    if !(1..=50).contains(&config.max_image_size_mb) {
        return Err(invalid("max_image_size_mb", "must be between 1 and 50"));
    }

    if config.max_concurrent_jobs == 0 {
        return Err(invalid("max_concurrent_jobs", "must be at least 1"));
    }

    if config.ocr.engine != "google_vision" {
        return Err(invalid(
            "ocr.engine",
            &format!("unsupported OCR engine '{}'", config.ocr.engine),
        ));
    }
    if config.ocr.language.trim().is_empty() {
        return Err(invalid("ocr.language", "must not be empty"));
    }
    if !(0.0..=100.0).contains(&config.ocr.confidence_threshold) {
        return Err(invalid("ocr.confidence_threshold", "must be between 0 and 100"));
    }
    if !(5..=120).contains(&config.ocr.timeout_secs) {
        return Err(invalid("ocr.timeout_secs", "must be between 5 and 120"));
    }
    if !(1..=5).contains(&config.ocr.max_retries) {
        return Err(invalid("ocr.max_retries", "must be between 1 and 5"));
    }

    if config.llm.model.trim().is_empty() {
        return Err(invalid("llm.model", "must not be empty"));
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        return Err(invalid("llm.temperature", "must be between 0 and 2"));
    }
    if config.llm.top_p <= 0.0 || config.llm.top_p > 1.0 {
        return Err(invalid("llm.top_p", "must be in (0, 1]"));
    }
    if config.llm.max_tokens == 0 {
        return Err(invalid("llm.max_tokens", "must be at least 1"));
    }
    if !(30..=300).contains(&config.llm.request_timeout_secs) {
        return Err(invalid(
            "llm.request_timeout_secs",
            "must be between 30 and 300",
        ));
    }
    if !(1..=10).contains(&config.llm.max_retries) {
        return Err(invalid("llm.max_retries", "must be between 1 and 10"));
    }

    if !(0.0..=1.0).contains(&config.quality.completeness_threshold) {
        return Err(invalid(
            "quality.completeness_threshold",
            "must be between 0 and 1",
        ));
    }

    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(invalid(
            "logging.level",
            &format!("must be one of: {}", LOG_LEVELS.join(", ")),
        ));
    }

    Ok(())
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
