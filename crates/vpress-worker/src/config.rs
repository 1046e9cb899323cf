//! Worker configuration.

use std::str::FromStr;
use std::time::Duration;

use vpress_models::DEFAULT_SOURCE_LANGUAGE;

pub(crate) fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

pub(crate) fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

/// How one source is picked per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionStrategy {
    /// Uniformly at random among active sources
    #[default]
    Random,
    /// The source fetched least recently (never-fetched first)
    OldestFirst,
}

impl FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(SelectionStrategy::Random),
            "oldest_first" | "oldest-first" | "round_robin" => Ok(SelectionStrategy::OldestFirst),
            other => Err(format!("unknown selection strategy: {}", other)),
        }
    }
}

/// Which content store implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// Payload CMS REST API
    #[default]
    Payload,
    /// In-process store, for local runs
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "payload" => Ok(StoreBackend::Payload),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown content store: {}", other)),
        }
    }
}

/// Pipeline orchestration settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// New videos requested per run
    pub max_videos_per_run: usize,
    /// Feed pages walked at most while looking for new videos
    pub max_pages: usize,
    /// Transcript characters stored on the video record
    pub video_transcript_cap: usize,
    /// Transcript characters stored on the article
    pub article_transcript_cap: usize,
    /// Language used when a source has none
    pub default_language: String,
    pub selection: SelectionStrategy,
    /// Copy the source's category onto generated articles
    pub assign_source_category: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_videos_per_run: 5,
            max_pages: 10,
            video_transcript_cap: 5000,
            article_transcript_cap: 15000,
            default_language: DEFAULT_SOURCE_LANGUAGE.to_string(),
            selection: SelectionStrategy::Random,
            assign_source_category: true,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_videos_per_run: env_parse("PIPELINE_MAX_VIDEOS", defaults.max_videos_per_run),
            max_pages: env_parse("PIPELINE_MAX_PAGES", defaults.max_pages),
            video_transcript_cap: env_parse("VIDEO_TRANSCRIPT_CAP", defaults.video_transcript_cap),
            article_transcript_cap: env_parse("ARTICLE_TRANSCRIPT_CAP", defaults.article_transcript_cap),
            default_language: std::env::var("DEFAULT_LANGUAGE")
                .ok()
                .filter(|l| !l.trim().is_empty())
                .unwrap_or(defaults.default_language),
            selection: env_parse("SOURCE_SELECTION", defaults.selection),
            assign_source_category: env_flag("ASSIGN_SOURCE_CATEGORY", defaults.assign_source_category),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub store: StoreBackend,
    pub pipeline: PipelineConfig,
    /// Delay before the first scheduled run
    pub initial_delay: Duration,
    /// Interval between scheduled runs
    pub run_interval: Duration,
    /// Wall-clock budget of a single run
    pub run_deadline: Duration,
    /// Whether the periodic trigger is started
    pub scheduler_enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            store: StoreBackend::Payload,
            pipeline: PipelineConfig::default(),
            initial_delay: Duration::from_secs(10),
            run_interval: Duration::from_secs(300), // 5 minutes
            run_deadline: Duration::from_secs(900), // 15 minutes
            scheduler_enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            store: env_parse("CONTENT_STORE", defaults.store),
            pipeline: PipelineConfig::from_env(),
            initial_delay: Duration::from_secs(env_parse(
                "PIPELINE_INITIAL_DELAY_SECS",
                defaults.initial_delay.as_secs(),
            )),
            run_interval: Duration::from_secs(
                env_parse("PIPELINE_INTERVAL_SECS", defaults.run_interval.as_secs()).max(1),
            ),
            run_deadline: Duration::from_secs(
                env_parse("PIPELINE_RUN_DEADLINE_SECS", defaults.run_deadline.as_secs()).max(1),
            ),
            scheduler_enabled: env_flag("SCHEDULER_ENABLED", defaults.scheduler_enabled),
        }
    }
}
