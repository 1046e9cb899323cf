//! Application state.

use std::sync::Arc;

use vpress_store::ContentStore;
use vpress_worker::{PipelineRunner, WorkerServices};

use crate::config::ApiConfig;
use crate::security::TriggerSecret;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn ContentStore>,
    /// The one runner shared with the in-process scheduler
    pub runner: Arc<PipelineRunner>,
    pub trigger_secret: Arc<TriggerSecret>,
}

impl AppState {
    pub fn new(config: ApiConfig, services: WorkerServices) -> Self {
        let trigger_secret = Arc::new(TriggerSecret::new(&config.trigger_secret));
        Self {
            config,
            store: services.store,
            runner: services.runner,
            trigger_secret,
        }
    }
}
