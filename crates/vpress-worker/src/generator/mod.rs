//! Article generation through a generative text service.
//!
//! `TextGenerator` is the raw completion seam (one implementation per
//! provider); `ArticleGenerator` owns prompting, retries and parsing of
//! the structured article on top of it.

mod article;
mod gemini;
mod openai;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use vpress_models::GeneratedArticle;

pub use article::{parse_article, strip_code_fences, ArticleGenerator};
pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

use crate::config::env_parse;
use crate::error::WorkerResult;
use crate::retry::RetryConfig;

/// One completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Raw JSON-mode completion backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Provider label for logs and metrics.
    fn provider(&self) -> &'static str;

    /// Return the model's text output, expected to be a JSON object.
    async fn complete(&self, request: &GenerationRequest) -> WorkerResult<String>;
}

/// Inputs of one article generation.
#[derive(Debug, Clone, Copy)]
pub struct ArticleRequest<'a> {
    pub transcript: &'a str,
    pub title: &'a str,
    pub source_name: &'a str,
    pub source_url: &'a str,
    pub language: &'a str,
}

/// Article generation as seen by the pipeline.
#[async_trait]
pub trait ArticleWriter: Send + Sync {
    async fn generate(&self, request: &ArticleRequest<'_>) -> WorkerResult<GeneratedArticle>;
}

/// Generative service provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AiProvider {
    #[default]
    OpenAi,
    Gemini,
}

impl FromStr for AiProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(AiProvider::OpenAi),
            "gemini" | "google" => Ok(AiProvider::Gemini),
            other => Err(format!("unknown AI provider: {}", other)),
        }
    }
}

/// Generator configuration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub provider: AiProvider,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Transcript characters sent to the service
    pub max_transcript_chars: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: AiProvider::OpenAi,
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            gemini_api_key: None,
            gemini_model: "gemini-2.5-flash".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout: Duration::from_secs(120),
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_transcript_chars: 12_000,
            max_tokens: 4_000,
            temperature: 0.3,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl GeneratorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            provider: env_parse("AI_PROVIDER", defaults.provider),
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            openai_model: non_empty_env("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_base_url: non_empty_env("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            gemini_api_key: non_empty_env("GEMINI_API_KEY"),
            gemini_model: non_empty_env("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: defaults.gemini_base_url,
            timeout: Duration::from_secs(env_parse("GENERATOR_TIMEOUT_SECS", defaults.timeout.as_secs())),
            max_retries: env_parse("GENERATOR_MAX_RETRIES", defaults.max_retries),
            base_delay: Duration::from_millis(env_parse(
                "GENERATOR_BASE_DELAY_MS",
                defaults.base_delay.as_millis() as u64,
            )),
            max_transcript_chars: env_parse("GENERATOR_MAX_TRANSCRIPT_CHARS", defaults.max_transcript_chars),
            max_tokens: env_parse("GENERATOR_MAX_TOKENS", defaults.max_tokens),
            temperature: env_parse("GENERATOR_TEMPERATURE", defaults.temperature),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new("article_generation")
            .with_max_retries(self.max_retries)
            .with_base_delay(self.base_delay)
    }

    /// Backend for the configured provider, `None` when its key is missing.
    pub fn build_backend(&self) -> WorkerResult<Option<Arc<dyn TextGenerator>>> {
        let backend: Arc<dyn TextGenerator> = match self.provider {
            AiProvider::OpenAi => {
                let Some(key) = &self.openai_api_key else {
                    return Ok(None);
                };
                Arc::new(OpenAiBackend::new(key, &self.openai_model, &self.openai_base_url, self.timeout)?)
            }
            AiProvider::Gemini => {
                let Some(key) = &self.gemini_api_key else {
                    return Ok(None);
                };
                Arc::new(GeminiBackend::new(key, &self.gemini_model, &self.gemini_base_url, self.timeout)?)
            }
        };
        Ok(Some(backend))
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!("OpenAI".parse::<AiProvider>(), Ok(AiProvider::OpenAi));
        assert_eq!("gemini".parse::<AiProvider>(), Ok(AiProvider::Gemini));
        assert!("claude".parse::<AiProvider>().is_err());
    }

    #[test]
    fn test_missing_key_means_no_backend() {
        let config = GeneratorConfig::default();
        assert!(config.build_backend().unwrap().is_none());

        let gemini = GeneratorConfig {
            provider: AiProvider::Gemini,
            openai_api_key: Some("sk-unused".into()),
            ..Default::default()
        };
        assert!(gemini.build_backend().unwrap().is_none());
    }

    #[test]
    fn test_backend_matches_provider() {
        let config = GeneratorConfig {
            provider: AiProvider::Gemini,
            gemini_api_key: Some("g-key".into()),
            ..Default::default()
        };
        let backend = config.build_backend().unwrap().unwrap();
        assert_eq!(backend.provider(), "gemini");
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var("AI_PROVIDER", "gemini");
        std::env::set_var("GEMINI_API_KEY", "g-key");
        std::env::set_var("OPENAI_API_KEY", "");
        std::env::set_var("GENERATOR_TEMPERATURE", "0.7");

        let config = GeneratorConfig::from_env();
        assert_eq!(config.provider, AiProvider::Gemini);
        assert_eq!(config.gemini_api_key.as_deref(), Some("g-key"));
        assert!(config.openai_api_key.is_none());
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.max_transcript_chars, 12_000);

        for key in ["AI_PROVIDER", "GEMINI_API_KEY", "OPENAI_API_KEY", "GENERATOR_TEMPERATURE"] {
            std::env::remove_var(key);
        }
    }
}
