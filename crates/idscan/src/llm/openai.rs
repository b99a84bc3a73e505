//! OpenAI chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{Completion, CompletionRequest, LlmClient, LlmError};
use crate::config::LlmConfig;
use crate::retry::RetryPolicy;
use crate::secrets::resolve_secret;

const ERROR_BODY_LIMIT: usize = 512;

pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
    retry: RetryPolicy,
    api_key: Option<String>,
    api_key_file: Option<String>,
    api_key_env: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LlmError::NotConfigured(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.request_timeout_secs,
            // The overall budget is the per-request timeout times the attempts.
            retry: RetryPolicy::default()
                .with_max_attempts(config.max_retries)
                .with_deadline(None),
            api_key: config.api_key.clone(),
            api_key_file: config.api_key_file.clone(),
            api_key_env: config.api_key_env.clone(),
        })
    }

    fn resolve_key(&self) -> Result<SecretString, LlmError> {
        resolve_secret(
            self.api_key.as_deref(),
            self.api_key_file.as_deref(),
            self.api_key_env.as_deref(),
        )
        .map_err(|e| LlmError::NotConfigured(e.to_string()))
    }

    async fn complete_once(
        &self,
        key: &SecretString,
        body: &ChatRequest<'_>,
    ) -> Result<Completion, LlmError> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_secs)
                } else {
                    LlmError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body: String = text.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        parse_response(parsed)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn check_available(&self) -> Result<(), LlmError> {
        self.resolve_key().map(|_| ())
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        let key = self.resolve_key()?;
        let body = build_request(&request);

        tracing::debug!(model = %request.model, "Sending chat completion request");

        self.retry
            .run("openai.chat_completion", || self.complete_once(&key, &body))
            .await
    }
}

fn build_request(request: &CompletionRequest) -> ChatRequest<'_> {
    ChatRequest {
        model: &request.model,
        messages: vec![
            Message {
                role: "system",
                content: &request.system_prompt,
            },
            Message {
                role: "user",
                content: &request.user_prompt,
            },
        ],
        temperature: request.temperature,
        top_p: request.top_p,
        max_tokens: request.max_tokens,
        response_format: ResponseFormat {
            format_type: "json_object",
        },
    }
}

fn parse_response(response: ChatResponse) -> Result<Completion, LlmError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?
        .message
        .content
        .ok_or_else(|| LlmError::InvalidResponse("no content in response".to_string()))?;

    Ok(Completion {
        content,
        tokens_used: response.usage.map(|u| u.total_tokens).unwrap_or(0),
    })
}
