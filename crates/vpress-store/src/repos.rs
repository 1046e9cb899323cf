//! Typed repositories for sources, videos and articles.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{info, warn};
use vpress_models::{ArticleRecord, DocumentId, Source, VideoId, VideoRecord, VideoStatus};

use crate::error::StoreResult;
use crate::query::{Collection, Filter};
use crate::store::{document_id, ContentStore};

fn decode_all<T: DeserializeOwned>(collection: Collection, docs: Vec<Value>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| match serde_json::from_value(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(collection = %collection, "Skipping malformed document: {}", e);
                None
            }
        })
        .collect()
}

// =============================================================================
// Sources
// =============================================================================

/// Repository for content sources (the `authors` collection).
#[derive(Clone)]
pub struct SourceRepository {
    store: Arc<dyn ContentStore>,
}

impl SourceRepository {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// All sources flagged active.
    pub async fn list_active(&self) -> StoreResult<Vec<Source>> {
        let docs = self
            .store
            .find(Collection::Authors, &Filter::all().equals("active", true))
            .await?;
        Ok(decode_all(Collection::Authors, docs))
    }

    /// Record a completed run: bump the fetch timestamp and counter.
    pub async fn record_fetch(&self, source: &Source) -> StoreResult<()> {
        self.store
            .update(
                Collection::Authors,
                &source.id,
                json!({
                    "lastFetchedAt": Utc::now(),
                    "fetchCount": source.fetch_count.saturating_add(1),
                }),
            )
            .await?;
        Ok(())
    }
}

// =============================================================================
// Videos
// =============================================================================

/// Repository for video records.
#[derive(Clone)]
pub struct VideoRepository {
    store: Arc<dyn ContentStore>,
}

impl VideoRepository {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Every external id already recorded for a source.
    ///
    /// Reads the complete result set; the uniqueness check depends on it.
    pub async fn known_video_ids(&self, author: &DocumentId) -> StoreResult<HashSet<VideoId>> {
        let docs = self
            .store
            .find(Collection::Videos, &Filter::all().equals("author", author.as_str()))
            .await?;

        Ok(docs
            .iter()
            .filter_map(|doc| doc.get("videoId").and_then(Value::as_str))
            .map(VideoId::from)
            .collect())
    }

    /// Persist a new record and return its document id.
    pub async fn create(&self, record: &VideoRecord) -> StoreResult<DocumentId> {
        let doc = self
            .store
            .create(Collection::Videos, serde_json::to_value(record)?)
            .await?;
        let id = document_id(&doc)?;

        info!(
            video_id = %record.video_id,
            doc_id = %id,
            status = %record.status,
            "Created video record"
        );
        Ok(id)
    }

    pub async fn update_status(&self, id: &DocumentId, status: VideoStatus) -> StoreResult<()> {
        self.store
            .update(Collection::Videos, id, json!({ "status": status }))
            .await?;
        Ok(())
    }

    /// Store a transcript copy and move the record to `transcribed`.
    pub async fn store_transcript(
        &self,
        id: &DocumentId,
        transcript: &str,
        language: &str,
    ) -> StoreResult<()> {
        self.store
            .update(
                Collection::Videos,
                id,
                json!({
                    "transcript": transcript,
                    "transcriptLanguage": language,
                    "status": VideoStatus::Transcribed,
                }),
            )
            .await?;
        Ok(())
    }

    /// Mark a record as failed with an error message.
    pub async fn fail(&self, id: &DocumentId, error: &str) -> StoreResult<()> {
        self.store
            .update(
                Collection::Videos,
                id,
                json!({
                    "status": VideoStatus::Failed,
                    "errorMessage": error,
                }),
            )
            .await?;
        Ok(())
    }

    /// Every record currently in one of the given statuses.
    pub async fn find_by_status(&self, statuses: &[VideoStatus]) -> StoreResult<Vec<VideoRecord>> {
        let filter = Filter::all().is_in("status", statuses.iter().map(|s| s.as_str()));
        let docs = self.store.find(Collection::Videos, &filter).await?;
        Ok(decode_all(Collection::Videos, docs))
    }

    pub async fn delete(&self, id: &DocumentId) -> StoreResult<()> {
        self.store.delete(Collection::Videos, id).await
    }
}

// =============================================================================
// Articles
// =============================================================================

/// Repository for generated articles.
#[derive(Clone)]
pub struct ArticleRepository {
    store: Arc<dyn ContentStore>,
}

impl ArticleRepository {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, article: &ArticleRecord) -> StoreResult<DocumentId> {
        let doc = self
            .store
            .create(Collection::Articles, serde_json::to_value(article)?)
            .await?;
        let id = document_id(&doc)?;

        info!(
            doc_id = %id,
            source_video = %article.source_video,
            title = %article.title,
            "Created article"
        );
        Ok(id)
    }

    pub async fn delete(&self, id: &DocumentId) -> StoreResult<()> {
        self.store.delete(Collection::Articles, id).await
    }

    /// All articles, decoded.
    pub async fn list(&self) -> StoreResult<Vec<ArticleRecord>> {
        let docs = self.store.find(Collection::Articles, &Filter::all()).await?;
        Ok(decode_all(Collection::Articles, docs))
    }
}
