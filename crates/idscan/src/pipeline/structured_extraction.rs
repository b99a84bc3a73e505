//! Stage B: turn OCR text into the recognized field set through the LLM.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::fields::{completeness, normalize_fields};
use super::prompt::build_prompt;
use super::stage::{Stage, StageOutcome};
use super::state::PipelineState;
use crate::config::Config;
use crate::llm::{CompletionRequest, LlmClient};

pub const STAGE_NAME: &str = "llm_processing";

pub struct StructuredExtraction {
    llm: Arc<dyn LlmClient>,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    price_per_token: f64,
    completeness_threshold: f64,
}

impl StructuredExtraction {
    pub fn new(config: &Config, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            top_p: config.llm.top_p,
            max_tokens: config.llm.max_tokens,
            price_per_token: config.llm.price_per_token(),
            completeness_threshold: config.quality.completeness_threshold,
        }
    }

    async fn extract(&self, state: &mut PipelineState) -> Result<(), String> {
        let started = Instant::now();

        self.llm
            .check_available()
            .map_err(|e| format!("LLM client setup failed: {}", e))?;

        let raw_text = state
            .processing_data
            .raw_text
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| "No OCR text available for extraction".to_string())?;

        let prompt = build_prompt(&raw_text);
        let completion = self
            .llm
            .complete(CompletionRequest {
                system_prompt: prompt.system.clone(),
                user_prompt: prompt.user.clone(),
                model: self.model.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                top_p: self.top_p,
            })
            .await
            .map_err(|e| format!("LLM request failed: {}", e))?;

        let body = strip_code_fence(&completion.content);
        let parsed: Value = serde_json::from_str(body)
            .map_err(|e| format!("LLM response is not valid JSON: {}", e))?;
        let kind = value_kind(&parsed);
        let Value::Object(object) = parsed else {
            return Err(format!(
                "invalid LLM response shape: expected a JSON object, got {}",
                kind
            ));
        };

        let normalized = normalize_fields(object);
        for warning in &normalized.warnings {
            state.add_warning(warning.clone());
        }

        let found = normalized.present_count();
        let score = completeness(&normalized.data);
        if score < self.completeness_threshold {
            state.add_warning(format!(
                "Low completeness: {:.0}% of fields found (threshold {:.0}%)",
                score * 100.0,
                self.completeness_threshold * 100.0
            ));
        }

        let elapsed = started.elapsed().as_secs_f64();
        let tokens = completion.tokens_used;
        state.extracted_data.extend(normalized.data);
        state.processing_data.completeness = Some(score);
        state.metrics.tokens_used += tokens;
        state.metrics.processing_time += elapsed;
        state.metrics.cost_estimate += tokens as f64 * self.price_per_token;
        state.metrics.llm_model = Some(self.model.clone());
        state.mark_completed();

        tracing::info!(fields = found, tokens, "Structured data extracted");
        state.add_message(format!("Extracted {} fields", found));
        state.set_debug(
            "llm_stats",
            json!({
                "model": self.model,
                "tokens_used": tokens,
                "temperature": self.temperature,
                "fields_extracted": found,
                "completeness": score,
                "response_length": completion.content.len(),
                "system_prompt_length": prompt.system.len(),
                "user_prompt_length": prompt.user.len(),
                "processing_time": elapsed,
            }),
        );

        Ok(())
    }
}

#[async_trait]
impl Stage for StructuredExtraction {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn run(&self, mut state: PipelineState) -> StageOutcome {
        // An earlier failure is final; no LLM call and no state change.
        if state.is_failed() {
            return StageOutcome::Halted(state);
        }
        state.update_stage(STAGE_NAME);

        if let Err(error) = self.extract(&mut state).await {
            state.add_error(error);
        }

        StageOutcome::from_state(state)
    }
}

/// Removes a surrounding Markdown code fence, with or without a `json` tag.
pub fn strip_code_fence(content: &str) -> &str {
    let mut body = content.trim();
    if let Some(rest) = body.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        body = rest.strip_suffix("```").unwrap_or(rest);
    }
    body.trim()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
