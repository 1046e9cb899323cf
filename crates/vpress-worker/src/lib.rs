//! Video to article pipeline worker.
//!
//! This crate provides:
//! - Channel video discovery against the YouTube Data API
//! - Transcript extraction with ordered caption strategies
//! - Article generation through OpenAI or Gemini
//! - Thumbnail import into the content store
//! - The orchestrator, its run latch and the interval scheduler

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod generator;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod runner;
pub mod scheduler;
pub mod thumbnail;
pub mod transcript;
pub mod video_source;

pub use bootstrap::{build_services, build_store, WorkerServices};
pub use config::{PipelineConfig, SelectionStrategy, StoreBackend, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use generator::{ArticleGenerator, ArticleRequest, ArticleWriter, GeneratorConfig, TextGenerator};
pub use logging::RunLogger;
pub use pipeline::{select_source, Pipeline, PipelineDeps, RunCounters};
pub use runner::{LastRun, PipelineRunner, RunnerStatus, TriggerOutcome, DEADLINE_EXCEEDED};
pub use scheduler::Scheduler;
pub use thumbnail::{MediaImporter, ThumbnailImporter};
pub use transcript::{Transcript, TranscriptExtractor, TranscriptSource};
pub use video_source::{VideoDiscovery, VideoProvider, VideoSourceClient};
