//! Structured article generation on top of a `TextGenerator`.

use std::sync::{Arc, LazyLock};
use std::time::Instant;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};
use vpress_models::{truncate_chars, BlockKind, BodyBlock, GeneratedArticle};

use super::{ArticleRequest, ArticleWriter, GenerationRequest, GeneratorConfig, TextGenerator};
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::retry::{retry_async, RetryConfig};

/// Response contract handed to the model.
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ArticleSchema {
    /// News headline
    title: String,
    /// Two or three sentence summary
    excerpt: String,
    /// Body in reading order
    paragraphs: Vec<BodyBlock>,
    /// Short topical tags
    tags: Vec<String>,
}

static ARTICLE_SCHEMA: LazyLock<String> = LazyLock::new(|| {
    serde_json::to_string_pretty(&schemars::schema_for!(ArticleSchema)).unwrap_or_default()
});

/// Model output as actually received: every field optional, blocks either
/// typed objects or bare strings.
#[derive(Debug, Deserialize)]
struct RawArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default, alias = "body", alias = "content")]
    paragraphs: Vec<RawBlock>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBlock {
    Text(String),
    Typed {
        #[serde(rename = "type", default)]
        kind: Option<String>,
        #[serde(default)]
        text: Option<String>,
    },
}

impl RawBlock {
    fn into_block(self) -> Option<BodyBlock> {
        let (kind, text) = match self {
            RawBlock::Text(text) => (BlockKind::Paragraph, text),
            RawBlock::Typed { kind, text } => (BlockKind::from_label(kind.as_deref()), text?),
        };
        let text = text.trim();
        (!text.is_empty()).then(|| BodyBlock {
            kind,
            text: text.to_string(),
        })
    }
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`) on the opening line
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse model output into a `GeneratedArticle`.
///
/// A missing title falls back to `fallback_title`. A response without any
/// usable body block is rejected.
pub fn parse_article(raw: &str, fallback_title: &str) -> WorkerResult<GeneratedArticle> {
    let text = strip_code_fences(raw);
    let parsed: RawArticle = serde_json::from_str(text).map_err(|e| {
        WorkerError::invalid_response(format!(
            "Failed to parse article JSON: {}: {}",
            e,
            truncate_chars(text, 200)
        ))
    })?;

    let body: Vec<BodyBlock> = parsed
        .paragraphs
        .into_iter()
        .filter_map(RawBlock::into_block)
        .collect();
    if body.is_empty() {
        return Err(WorkerError::invalid_response("Article has no body blocks"));
    }

    let title = match parsed.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => title.to_string(),
        None => {
            warn!("Generator returned empty title, using video title");
            fallback_title.trim().to_string()
        }
    };

    let excerpt = parsed.excerpt.unwrap_or_default().trim().to_string();
    if excerpt.is_empty() {
        warn!("Generator returned empty excerpt");
    }

    let tags: Vec<String> = parsed
        .tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if tags.is_empty() {
        warn!("Generator returned no tags");
    }

    Ok(GeneratedArticle {
        title,
        excerpt,
        body,
        tags,
    })
}

fn system_prompt(language: &str) -> String {
    format!(
        r#"You are a professional journalist at a respected news agency. You turn transcripts of news videos into professional news articles.

Strict rules:
1. Neutral, objective news style.
2. Do not invent anything; use only what the transcript says.
3. Keep every name, number and quotation exact.
4. Write the article in the language with code "{language}".
5. Open with a strong lead summarising who, what, where and when.
6. Split the body into clear paragraphs and add subheadings for the main sections.
7. Close with a summary or additional context and cite the source.

Return ONLY a single JSON object matching this JSON schema:
{schema}"#,
        language = language,
        schema = ARTICLE_SCHEMA.as_str(),
    )
}

fn user_prompt(request: &ArticleRequest<'_>, transcript: &str) -> String {
    format!(
        "Turn the following transcript of the video \"{title}\" from the channel \"{source}\" into a professional news article.\n\nSource: {url}\n\nTranscript:\n{transcript}",
        title = request.title,
        source = request.source_name,
        url = request.source_url,
        transcript = transcript,
    )
}

/// Prompting, bounded retry and parsing around a completion backend.
pub struct ArticleGenerator {
    backend: Arc<dyn TextGenerator>,
    retry: RetryConfig,
    max_transcript_chars: usize,
    max_tokens: u32,
    temperature: f32,
}

impl ArticleGenerator {
    pub fn new(backend: Arc<dyn TextGenerator>, config: &GeneratorConfig) -> Self {
        Self {
            backend,
            retry: config.retry_config(),
            max_transcript_chars: config.max_transcript_chars,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Generator for the configured provider, `None` when it has no key.
    pub fn from_config(config: &GeneratorConfig) -> WorkerResult<Option<Self>> {
        Ok(config.build_backend()?.map(|backend| Self::new(backend, config)))
    }

    fn build_request(&self, request: &ArticleRequest<'_>) -> WorkerResult<GenerationRequest> {
        let transcript = request.transcript.trim();
        if transcript.is_empty() {
            return Err(WorkerError::invalid_input("Transcript is empty"));
        }
        if request.title.trim().is_empty() {
            return Err(WorkerError::invalid_input("Video title is empty"));
        }

        let capped = truncate_chars(transcript, self.max_transcript_chars);
        if capped.len() < transcript.len() {
            warn!(
                from = transcript.chars().count(),
                to = self.max_transcript_chars,
                "Transcript truncated for generation"
            );
        }

        Ok(GenerationRequest {
            system: system_prompt(request.language),
            user: user_prompt(request, capped),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        })
    }
}

#[async_trait]
impl ArticleWriter for ArticleGenerator {
    async fn generate(&self, request: &ArticleRequest<'_>) -> WorkerResult<GeneratedArticle> {
        let generation = self.build_request(request)?;
        let provider = self.backend.provider();
        let started = Instant::now();

        let result = retry_async(&self.retry, WorkerError::is_transient_service_error, || {
            self.backend.complete(&generation)
        })
        .await
        .into_result();

        metrics::record_generation(provider, result.is_ok(), started.elapsed().as_secs_f64());

        let article = parse_article(&result?, request.title)?;
        info!(
            provider,
            blocks = article.body.len(),
            tags = article.tags.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Article generated"
        );
        Ok(article)
    }
}
