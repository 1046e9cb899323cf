//! Gemini `generateContent` backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vpress_models::truncate_chars;

use super::{GenerationRequest, TextGenerator};
use crate::error::{WorkerError, WorkerResult};

/// Gemini API request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    temperature: f32,
    max_output_tokens: u32,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Gemini API client in JSON response mode.
pub struct GeminiBackend {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackend {
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
impl TextGenerator for GeminiBackend {
    fn provider(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, request: &GenerationRequest) -> WorkerResult<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let body = GeminiRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: &request.system,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &request.user }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        debug!(model = %self.model, "Calling Gemini generateContent");

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(WorkerError::from_http_status(
                status.as_u16(),
                format!("Gemini API returned {}: {}", status, truncate_chars(&error_text, 300)),
            ));
        }

        let parsed: GeminiResponse = response.json().await.map_err(|e| {
            WorkerError::invalid_response(format!("Failed to parse Gemini response: {}", e))
        })?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(WorkerError::invalid_response("No content in Gemini response"));
        }
        Ok(text)
    }
}
