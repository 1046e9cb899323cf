//! Pipeline orchestrator.
//!
//! One run picks a single active source, discovers its new videos and
//! drives each of them sequentially through transcript, generation,
//! thumbnail and persistence. Per-video failures are counted and recorded
//! on the video; per-source failures are counted; only a failure to load
//! sources escapes `run`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rand::seq::IndexedRandom;
use tracing::{warn, Instrument};
use vpress_models::{
    convert_to_document, truncate_with_ellipsis, ArticleRecord, ArticleTag, Direction, DocumentId,
    PublicationStatus, RunSummary, Source, VideoId, VideoMeta, VideoRecord, VideoStatus,
};
use vpress_store::{ArticleRepository, ContentStore, SourceRepository, VideoRepository};

use crate::config::{PipelineConfig, SelectionStrategy};
use crate::error::{WorkerError, WorkerResult};
use crate::generator::{ArticleRequest, ArticleWriter};
use crate::logging::RunLogger;
use crate::metrics;
use crate::thumbnail::MediaImporter;
use crate::transcript::TranscriptSource;
use crate::video_source::VideoDiscovery;

/// Live counters of a run, readable while it is still in progress.
#[derive(Debug, Default)]
pub struct RunCounters {
    processed: AtomicU32,
    articles: AtomicU32,
    errors: AtomicU32,
    /// Video record being driven right now, if any
    in_flight: Mutex<Option<DocumentId>>,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    fn video_processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    fn article_created(&self) {
        self.articles.fetch_add(1, Ordering::SeqCst);
    }

    /// Count one error at `stage`.
    pub fn record_error(&self, stage: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        metrics::record_error(stage);
    }

    fn begin_video(&self, id: &DocumentId) {
        *self.in_flight.lock().unwrap_or_else(|e| e.into_inner()) = Some(id.clone());
    }

    fn end_video(&self) {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    /// The video an aborted run left mid-flight.
    pub fn take_in_flight(&self) -> Option<DocumentId> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    pub fn snapshot(&self) -> RunSummary {
        RunSummary {
            processed: self.processed.load(Ordering::SeqCst),
            articles: self.articles.load(Ordering::SeqCst),
            errors: self.errors.load(Ordering::SeqCst),
        }
    }
}

/// External collaborators of the pipeline.
#[derive(Clone)]
pub struct PipelineDeps {
    pub store: Arc<dyn ContentStore>,
    pub discovery: Arc<dyn VideoDiscovery>,
    pub transcripts: Arc<dyn TranscriptSource>,
    /// `None` when no generative service is configured
    pub writer: Option<Arc<dyn ArticleWriter>>,
    pub media: Arc<dyn MediaImporter>,
}

/// Pick the source for this run.
pub fn select_source(sources: &[Source], strategy: SelectionStrategy) -> Option<&Source> {
    match strategy {
        SelectionStrategy::Random => sources.choose(&mut rand::rng()),
        // Never-fetched sources sort first
        SelectionStrategy::OldestFirst => sources.iter().min_by_key(|s| s.last_fetched_at),
    }
}

/// Status of one video as it moves through a run.
struct VideoProgress {
    id: DocumentId,
    status: VideoStatus,
}

impl VideoProgress {
    fn ensure(&self, next: VideoStatus) -> WorkerResult<()> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(WorkerError::InvalidTransition {
                from: self.status,
                to: next,
            })
        }
    }

    fn advance(&mut self, next: VideoStatus) -> WorkerResult<()> {
        self.ensure(next)?;
        self.status = next;
        Ok(())
    }
}

/// The orchestrator.
pub struct Pipeline {
    sources: SourceRepository,
    videos: VideoRepository,
    articles: ArticleRepository,
    discovery: Arc<dyn VideoDiscovery>,
    transcripts: Arc<dyn TranscriptSource>,
    writer: Option<Arc<dyn ArticleWriter>>,
    media: Arc<dyn MediaImporter>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(deps: PipelineDeps, config: PipelineConfig) -> Self {
        Self {
            sources: SourceRepository::new(deps.store.clone()),
            videos: VideoRepository::new(deps.store.clone()),
            articles: ArticleRepository::new(deps.store),
            discovery: deps.discovery,
            transcripts: deps.transcripts,
            writer: deps.writer,
            media: deps.media,
            config,
        }
    }

    pub fn videos(&self) -> &VideoRepository {
        &self.videos
    }

    /// Run once, accumulating into `counters`.
    ///
    /// Fails only when the active sources cannot be loaded.
    pub async fn run(&self, counters: &RunCounters) -> WorkerResult<RunSummary> {
        let sources = self.sources.list_active().await?;

        let Some(source) = select_source(&sources, self.config.selection) else {
            tracing::info!("No active sources, nothing to do");
            return Ok(counters.snapshot());
        };

        let logger = RunLogger::new(&source.name);
        self.process_source(source, sources.len(), &logger, counters)
            .instrument(logger.create_span())
            .await;

        Ok(counters.snapshot())
    }

    async fn process_source(
        &self,
        source: &Source,
        active_sources: usize,
        logger: &RunLogger,
        counters: &RunCounters,
    ) {
        logger.log_start(&format!(
            "selected \"{}\" out of {} active sources",
            source.name, active_sources
        ));

        match self.discover(source).await {
            Ok(videos) => {
                logger.log_progress(&format!("{} new videos", videos.len()));
                for meta in videos {
                    self.process_video(source, meta, logger, counters).await;
                }
            }
            Err(e) => {
                counters.record_error("discovery");
                logger.log_error(&format!("discovery failed: {}", e));
            }
        }

        if let Err(e) = self.sources.record_fetch(source).await {
            counters.record_error("source_bookkeeping");
            logger.log_error(&format!("failed to record fetch: {}", e));
        }

        let summary = counters.snapshot();
        logger.log_completion(&format!(
            "{} videos processed, {} articles created, {} errors",
            summary.processed, summary.articles, summary.errors
        ));
    }

    async fn discover(&self, source: &Source) -> WorkerResult<Vec<VideoMeta>> {
        let known: HashSet<VideoId> = self.videos.known_video_ids(&source.id).await?;
        tracing::debug!(source = %source.name, known = known.len(), "Loaded known video ids");

        self.discovery
            .list_new_videos(&source.channel_id, self.config.max_videos_per_run, &known)
            .await
    }

    async fn process_video(
        &self,
        source: &Source,
        meta: VideoMeta,
        logger: &RunLogger,
        counters: &RunCounters,
    ) {
        let record = VideoRecord::fetched(&meta, source.id.clone());
        let id = match self.videos.create(&record).await {
            Ok(id) => id,
            Err(e) if e.is_already_exists() => {
                logger.log_warning(&format!("video {} already recorded, skipping", meta.video_id));
                return;
            }
            Err(e) => {
                counters.record_error("video_create");
                logger.log_error(&format!("failed to record video {}: {}", meta.video_id, e));
                return;
            }
        };

        counters.video_processed();
        metrics::record_video_processed(&source.name);

        counters.begin_video(&id);
        let mut progress = VideoProgress {
            id,
            status: VideoStatus::Fetched,
        };

        if let Err(e) = self.drive_video(source, &meta, &mut progress, logger, counters).await {
            counters.record_error("video");
            logger.log_error(&format!("video {} failed: {}", meta.video_id, e));

            if let Err(mark) = self.videos.fail(&progress.id, &e.to_string()).await {
                warn!(video_id = %meta.video_id, "Could not mark video failed: {}", mark);
            }
        }
        counters.end_video();
    }

    fn language_for<'a>(&'a self, source: &'a Source) -> &'a str {
        match source.language.as_deref().map(str::trim) {
            Some(lang) if !lang.is_empty() => lang,
            _ => self.config.default_language.as_str(),
        }
    }

    async fn transition(&self, progress: &mut VideoProgress, next: VideoStatus) -> WorkerResult<()> {
        progress.ensure(next)?;
        self.videos.update_status(&progress.id, next).await?;
        progress.advance(next)
    }

    async fn drive_video(
        &self,
        source: &Source,
        meta: &VideoMeta,
        progress: &mut VideoProgress,
        logger: &RunLogger,
        counters: &RunCounters,
    ) -> WorkerResult<()> {
        let language = self.language_for(source);

        let Some(transcript) = self.transcripts.extract(&meta.video_id, language).await? else {
            self.transition(progress, VideoStatus::NoTranscript).await?;
            logger.log_progress(&format!("no transcript for \"{}\"", meta.title));
            return Ok(());
        };

        progress.ensure(VideoStatus::Transcribed)?;
        let stored = truncate_with_ellipsis(&transcript.text, self.config.video_transcript_cap);
        self.videos
            .store_transcript(&progress.id, &stored, &transcript.language)
            .await?;
        progress.advance(VideoStatus::Transcribed)?;

        let Some(writer) = &self.writer else {
            logger.log_warning("article generator not configured, skipping generation");
            return Ok(());
        };

        let request = ArticleRequest {
            transcript: &transcript.text,
            title: &meta.title,
            source_name: &source.name,
            source_url: &meta.youtube_url,
            language,
        };
        let generated = match writer.generate(&request).await {
            Ok(article) => article,
            Err(e) if e.is_generator_unavailable() => {
                logger.log_warning(&format!("article generator unavailable: {}", e));
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let hero_image = self.media.import_thumbnail(&meta.thumbnail_url, &meta.title).await;

        let categories = match (&source.category, self.config.assign_source_category) {
            (Some(category), true) => vec![category.clone()],
            _ => Vec::new(),
        };

        let article = ArticleRecord {
            id: DocumentId::default(),
            title: generated.title,
            excerpt: generated.excerpt,
            content: convert_to_document(&generated.body, Direction::for_language(language)),
            author_name: source.name.clone(),
            author: source.id.clone(),
            source_video: progress.id.clone(),
            youtube_url: meta.youtube_url.clone(),
            published_at: Utc::now(),
            is_auto_generated: true,
            featured: false,
            breaking_news: false,
            tags: generated.tags.into_iter().map(|tag| ArticleTag { tag }).collect(),
            transcript: Some(truncate_with_ellipsis(
                &transcript.text,
                self.config.article_transcript_cap,
            )),
            transcript_language: Some(transcript.language.clone()),
            status: PublicationStatus::Published,
            hero_image,
            categories,
        };

        progress.ensure(VideoStatus::ArticleGenerated)?;
        let article_id = self.articles.create(&article).await?;

        if let Err(e) = self.transition(progress, VideoStatus::ArticleGenerated).await {
            // An article must not outlive a video that never reached article_generated
            if let Err(cleanup) = self.articles.delete(&article_id).await {
                warn!(article_id = %article_id, "Could not remove orphaned article: {}", cleanup);
            }
            return Err(e);
        }

        counters.article_created();
        metrics::record_article_created(&source.name);
        logger.log_progress(&format!("article created: \"{}\"", article.title));
        Ok(())
    }
}
