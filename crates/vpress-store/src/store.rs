//! The content store abstraction.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use vpress_models::DocumentId;

use crate::error::StoreResult;
use crate::query::{Collection, Filter};

/// A file to register in the media collection.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    /// Local file holding the bytes
    pub path: PathBuf,
    /// Filename to store the media under
    pub filename: String,
    pub mime_type: String,
    pub alt: String,
}

/// CRUD over typed collections of JSON documents.
///
/// Implementations are shared across tasks; each write targets a distinct
/// document, so no locking is needed beyond the implementation's own.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Every document matching the filter, across all pages.
    async fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Value>>;

    /// Create a document and return it as stored (with its id).
    async fn create(&self, collection: Collection, data: Value) -> StoreResult<Value>;

    /// Merge `patch` into an existing document.
    async fn update(&self, collection: Collection, id: &DocumentId, patch: Value) -> StoreResult<Value>;

    async fn delete(&self, collection: Collection, id: &DocumentId) -> StoreResult<()>;

    /// Register a local file as media and return its id.
    async fn upload_media(&self, upload: MediaUpload) -> StoreResult<DocumentId>;

    /// Cheap reachability check.
    async fn health_check(&self) -> StoreResult<()>;
}

/// Extract the `id` of a stored document.
pub fn document_id(doc: &Value) -> StoreResult<DocumentId> {
    doc.get("id")
        .cloned()
        .map(serde_json::from_value::<DocumentId>)
        .transpose()?
        .filter(|id| !id.is_empty())
        .ok_or_else(|| crate::StoreError::invalid_response("document has no id"))
}
