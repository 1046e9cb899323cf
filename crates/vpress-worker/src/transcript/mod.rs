//! Transcript extraction.
//!
//! A transcript is looked up through an ordered list of caption strategies.
//! Each strategy gets a few attempts on transient network failures; any
//! other failure moves on to the next strategy. `None` is only returned
//! once every strategy has come up empty.

mod normalize;
mod youtube;
mod ytdlp;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use vpress_models::VideoId;

pub use normalize::{decode_entities, normalize_text, parse_timedtext, parse_vtt};
pub use youtube::{choose_track, extract_caption_tracks, CaptionMode, CaptionTrack, YoutubeCaptions};
pub use ytdlp::YtDlpSubtitles;

use crate::config::{env_flag, env_parse};
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::retry::{retry_async, RetryConfig};

/// Browser user agent for watch-page requests.
const WATCH_PAGE_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Normalized transcript text and the language it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub language: String,
}

/// One way of obtaining captions.
#[async_trait]
pub trait CaptionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means this strategy has nothing for the video.
    async fn fetch(&self, video_id: &VideoId, language: &str) -> WorkerResult<Option<Transcript>>;
}

/// Transcript lookup as seen by the pipeline.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// `Ok(None)` is a definitive "no transcript".
    async fn extract(&self, video_id: &VideoId, language: &str) -> WorkerResult<Option<Transcript>>;
}

/// Transcript extraction settings.
#[derive(Debug, Clone)]
pub struct TranscriptConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// Retries per strategy on transient network failures
    pub max_retries: u32,
    pub ytdlp_enabled: bool,
    pub ytdlp_path: String,
    /// Origin serving watch pages
    pub watch_base_url: String,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(25),
            max_retries: 2,
            ytdlp_enabled: false,
            ytdlp_path: "yt-dlp".to_string(),
            watch_base_url: "https://www.youtube.com".to_string(),
        }
    }
}

impl TranscriptConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout: Duration::from_secs(env_parse("TRANSCRIPT_TIMEOUT_SECS", defaults.timeout.as_secs())),
            max_retries: env_parse("TRANSCRIPT_MAX_RETRIES", defaults.max_retries),
            ytdlp_enabled: env_flag("TRANSCRIPT_YTDLP", defaults.ytdlp_enabled),
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            watch_base_url: defaults.watch_base_url,
        }
    }
}

/// Ordered multi-strategy extractor.
pub struct TranscriptExtractor {
    strategies: Vec<Arc<dyn CaptionStrategy>>,
    retry: RetryConfig,
}

impl TranscriptExtractor {
    pub fn new(strategies: Vec<Arc<dyn CaptionStrategy>>, retry: RetryConfig) -> Self {
        Self { strategies, retry }
    }

    /// Requested-language captions, then yt-dlp when enabled, then captions
    /// in any language.
    pub fn from_config(config: &TranscriptConfig) -> WorkerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(WATCH_PAGE_USER_AGENT)
            .build()?;

        let mut strategies: Vec<Arc<dyn CaptionStrategy>> = vec![Arc::new(YoutubeCaptions::new(
            http.clone(),
            &config.watch_base_url,
            CaptionMode::Requested,
        ))];
        if config.ytdlp_enabled {
            strategies.push(Arc::new(YtDlpSubtitles::new(&config.ytdlp_path, config.timeout)));
        }
        strategies.push(Arc::new(YoutubeCaptions::new(
            http,
            &config.watch_base_url,
            CaptionMode::AnyAvailable,
        )));

        let retry = RetryConfig::new("transcript")
            .with_max_retries(config.max_retries)
            .with_base_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(5));

        Ok(Self::new(strategies, retry))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl TranscriptSource for TranscriptExtractor {
    async fn extract(&self, video_id: &VideoId, language: &str) -> WorkerResult<Option<Transcript>> {
        for strategy in &self.strategies {
            let result = retry_async(
                &self.retry,
                WorkerError::is_transient_network_error,
                || strategy.fetch(video_id, language),
            )
            .await
            .into_result();

            match result {
                Ok(Some(transcript)) => {
                    let text = normalize_text(&[transcript.text.as_str()]);
                    if text.is_empty() {
                        continue;
                    }
                    info!(
                        video_id = %video_id,
                        strategy = strategy.name(),
                        language = %transcript.language,
                        chars = text.chars().count(),
                        "Transcript extracted"
                    );
                    metrics::record_transcript(strategy.name());
                    return Ok(Some(Transcript {
                        text,
                        language: transcript.language,
                    }));
                }
                Ok(None) => {
                    debug!(video_id = %video_id, strategy = strategy.name(), "Strategy found no transcript");
                }
                Err(e) => {
                    warn!(video_id = %video_id, strategy = strategy.name(), "Strategy failed: {}", e);
                }
            }
        }

        info!(video_id = %video_id, language, "No transcript available");
        metrics::record_transcript("none");
        Ok(None)
    }
}
