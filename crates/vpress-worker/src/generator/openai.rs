//! OpenAI chat completions backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vpress_models::truncate_chars;

use super::{GenerationRequest, TextGenerator};
use crate::error::{WorkerError, WorkerResult};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    response_format: ResponseFormat,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client in JSON mode.
pub struct OpenAiBackend {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiBackend {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> WorkerResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiBackend {
    fn provider(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, request: &GenerationRequest) -> WorkerResult<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: &request.system,
                },
                Message {
                    role: "user",
                    content: &request.user,
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(model = %self.model, "Calling chat completions");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(WorkerError::from_http_status(
                status.as_u16(),
                format!("OpenAI returned {}: {}", status, truncate_chars(&error_text, 300)),
            ));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            WorkerError::invalid_response(format!("Failed to parse OpenAI response: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| WorkerError::invalid_response("No content in OpenAI response"))
    }
}
