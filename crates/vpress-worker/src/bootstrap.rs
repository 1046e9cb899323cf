//! Wiring of the pipeline from environment configuration.

use std::sync::Arc;

use tracing::{info, warn};
use vpress_store::{ContentStore, MemoryStore, PayloadClient};

use crate::config::{StoreBackend, WorkerConfig};
use crate::error::WorkerResult;
use crate::generator::{ArticleGenerator, ArticleWriter, GeneratorConfig};
use crate::pipeline::{Pipeline, PipelineDeps};
use crate::runner::PipelineRunner;
use crate::thumbnail::{ThumbnailConfig, ThumbnailImporter};
use crate::transcript::{TranscriptConfig, TranscriptExtractor};
use crate::video_source::{VideoSourceClient, YoutubeConfig, YoutubeDataApi};

/// Long-lived services shared by the binaries.
#[derive(Clone)]
pub struct WorkerServices {
    pub store: Arc<dyn ContentStore>,
    pub runner: Arc<PipelineRunner>,
}

/// Content store selected by `CONTENT_STORE`.
pub fn build_store(backend: StoreBackend) -> WorkerResult<Arc<dyn ContentStore>> {
    match backend {
        StoreBackend::Payload => Ok(Arc::new(PayloadClient::from_env()?)),
        StoreBackend::Memory => {
            warn!("Using the in-memory content store; nothing will be persisted");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Build every collaborator from the environment and assemble the runner.
pub fn build_services(config: &WorkerConfig) -> WorkerResult<WorkerServices> {
    let store = build_store(config.store)?;

    let provider = Arc::new(YoutubeDataApi::new(YoutubeConfig::from_env())?);
    let discovery = Arc::new(VideoSourceClient::new(provider, config.pipeline.max_pages));

    let transcripts = TranscriptExtractor::from_config(&TranscriptConfig::from_env())?;
    info!(strategies = ?transcripts.strategy_names(), "Transcript extractor ready");

    let generator_config = GeneratorConfig::from_env();
    let writer: Option<Arc<dyn ArticleWriter>> = match ArticleGenerator::from_config(&generator_config)? {
        Some(generator) => {
            info!(provider = ?generator_config.provider, "Article generator ready");
            Some(Arc::new(generator))
        }
        None => {
            warn!(
                provider = ?generator_config.provider,
                "No API key for the article generator; videos will stop at transcribed"
            );
            None
        }
    };

    let media = Arc::new(ThumbnailImporter::new(store.clone(), ThumbnailConfig::from_env())?);

    let deps = PipelineDeps {
        store: store.clone(),
        discovery,
        transcripts: Arc::new(transcripts),
        writer,
        media,
    };
    let pipeline = Pipeline::new(deps, config.pipeline.clone());
    let runner = Arc::new(PipelineRunner::new(pipeline, config.run_deadline));

    Ok(WorkerServices { store, runner })
}
