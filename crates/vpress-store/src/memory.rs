//! In-process content store.
//!
//! Backs `CONTENT_STORE=memory` for local runs and the test suites. It
//! enforces the same uniqueness constraint as the real collections
//! (`videos.videoId`).

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use vpress_models::DocumentId;

use crate::error::{StoreError, StoreResult};
use crate::query::{Collection, Filter};
use crate::store::{ContentStore, MediaUpload};

/// Write operation a fault can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Create,
    Update,
    Delete,
}

/// A one-shot failure armed on the next matching write.
#[derive(Debug, Clone)]
struct Fault {
    collection: Collection,
    op: WriteOp,
    /// Only writes whose payload has this field value match
    when: Option<(String, Value)>,
}

impl Fault {
    fn matches(&self, collection: Collection, op: WriteOp, payload: Option<&Value>) -> bool {
        if self.collection != collection || self.op != op {
            return false;
        }
        match (&self.when, payload) {
            (None, _) => true,
            (Some((field, value)), Some(payload)) => payload.get(field) == Some(value),
            (Some(_), None) => false,
        }
    }
}

#[derive(Default)]
struct Inner {
    collections: HashMap<Collection, BTreeMap<u64, Value>>,
    next_id: u64,
    unavailable: HashSet<Collection>,
    faults: Vec<Fault>,
}

/// Content store held entirely in memory.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    unique_fields: Vec<(Collection, &'static str)>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with the standard uniqueness constraints.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            unique_fields: vec![(Collection::Videos, "videoId")],
        }
    }

    /// All documents of a collection in insertion order.
    pub async fn documents(&self, collection: Collection) -> Vec<Value> {
        let inner = self.inner.read().await;
        inner
            .collections
            .get(&collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: Collection) -> usize {
        let inner = self.inner.read().await;
        inner.collections.get(&collection).map_or(0, BTreeMap::len)
    }

    /// Simulate an outage: every operation on `collection` fails with a
    /// server error until cleared.
    pub async fn set_unavailable(&self, collection: Collection, unavailable: bool) {
        let mut inner = self.inner.write().await;
        if unavailable {
            inner.unavailable.insert(collection);
        } else {
            inner.unavailable.remove(&collection);
        }
    }

    /// Fail the next `op` on `collection` once.
    pub async fn fail_next(&self, collection: Collection, op: WriteOp) {
        let mut inner = self.inner.write().await;
        inner.faults.push(Fault {
            collection,
            op,
            when: None,
        });
    }

    /// Fail the next `op` on `collection` whose payload sets `field` to
    /// `value`, once. Other writes pass through.
    pub async fn fail_next_when(
        &self,
        collection: Collection,
        op: WriteOp,
        field: &str,
        value: impl Into<Value>,
    ) {
        let mut inner = self.inner.write().await;
        inner.faults.push(Fault {
            collection,
            op,
            when: Some((field.to_string(), value.into())),
        });
    }

    fn take_fault(
        inner: &mut Inner,
        collection: Collection,
        op: WriteOp,
        payload: Option<&Value>,
    ) -> StoreResult<()> {
        let Some(index) = inner
            .faults
            .iter()
            .position(|f| f.matches(collection, op, payload))
        else {
            return Ok(());
        };
        inner.faults.remove(index);
        Err(StoreError::ServerError(
            500,
            format!("injected {:?} failure on {}", op, collection),
        ))
    }

    fn check_available(inner: &Inner, collection: Collection) -> StoreResult<()> {
        if inner.unavailable.contains(&collection) {
            return Err(StoreError::ServerError(
                503,
                format!("{} is unavailable", collection),
            ));
        }
        Ok(())
    }

    fn check_unique(
        &self,
        inner: &Inner,
        collection: Collection,
        doc: &Value,
        exclude: Option<u64>,
    ) -> StoreResult<()> {
        let Some(docs) = inner.collections.get(&collection) else {
            return Ok(());
        };

        for (field_collection, field) in &self.unique_fields {
            if *field_collection != collection {
                continue;
            }
            let Some(value) = doc.get(*field).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = docs
                .iter()
                .filter(|(key, _)| Some(**key) != exclude)
                .any(|(_, existing)| existing.get(*field) == Some(value));
            if clash {
                return Err(StoreError::already_exists(format!(
                    "{}.{} must be unique: {}",
                    collection, field, value
                )));
            }
        }
        Ok(())
    }

    fn parse_key(id: &DocumentId) -> StoreResult<u64> {
        id.as_str()
            .parse()
            .map_err(|_| StoreError::not_found(format!("no document with id {}", id)))
    }

    async fn insert(&self, collection: Collection, mut data: Value) -> StoreResult<Value> {
        if !data.is_object() {
            return Err(StoreError::request_failed("document must be a JSON object"));
        }

        let mut inner = self.inner.write().await;
        Self::check_available(&inner, collection)?;
        Self::take_fault(&mut inner, collection, WriteOp::Create, Some(&data))?;

        inner.next_id += 1;
        let key = inner.next_id;
        let now = Utc::now().to_rfc3339();
        let Value::Object(map) = &mut data else {
            unreachable!("checked above")
        };
        map.insert("id".to_string(), Value::String(key.to_string()));
        map.insert("createdAt".to_string(), Value::String(now.clone()));
        map.insert("updatedAt".to_string(), Value::String(now));

        self.check_unique(&inner, collection, &data, None)?;

        inner
            .collections
            .entry(collection)
            .or_default()
            .insert(key, data.clone());
        Ok(data)
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Value>> {
        let inner = self.inner.read().await;
        Self::check_available(&inner, collection)?;

        Ok(inner
            .collections
            .get(&collection)
            .map(|docs| docs.values().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn create(&self, collection: Collection, data: Value) -> StoreResult<Value> {
        self.insert(collection, data).await
    }

    async fn update(&self, collection: Collection, id: &DocumentId, patch: Value) -> StoreResult<Value> {
        let key = Self::parse_key(id)?;

        let mut inner = self.inner.write().await;
        Self::check_available(&inner, collection)?;
        Self::take_fault(&mut inner, collection, WriteOp::Update, Some(&patch))?;

        let Value::Object(patch) = patch else {
            return Err(StoreError::request_failed("patch must be a JSON object"));
        };

        let mut updated = inner
            .collections
            .get(&collection)
            .and_then(|docs| docs.get(&key))
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("{}/{}", collection, id)))?;

        if let Value::Object(map) = &mut updated {
            for (field, value) in patch {
                map.insert(field, value);
            }
            map.insert("id".to_string(), Value::String(key.to_string()));
            map.insert("updatedAt".to_string(), Value::String(Utc::now().to_rfc3339()));
        }

        self.check_unique(&inner, collection, &updated, Some(key))?;

        inner
            .collections
            .entry(collection)
            .or_default()
            .insert(key, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, collection: Collection, id: &DocumentId) -> StoreResult<()> {
        let key = Self::parse_key(id)?;

        let mut inner = self.inner.write().await;
        Self::check_available(&inner, collection)?;
        Self::take_fault(&mut inner, collection, WriteOp::Delete, None)?;

        inner
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.remove(&key))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(format!("{}/{}", collection, id)))
    }

    async fn upload_media(&self, upload: MediaUpload) -> StoreResult<DocumentId> {
        let bytes = tokio::fs::read(&upload.path).await?;

        let doc = self
            .insert(
                Collection::Media,
                json!({
                    "filename": upload.filename,
                    "mimeType": upload.mime_type,
                    "filesize": bytes.len(),
                    "alt": upload.alt,
                }),
            )
            .await?;

        crate::store::document_id(&doc)
    }

    async fn health_check(&self) -> StoreResult<()> {
        let inner = self.inner.read().await;
        Self::check_available(&inner, Collection::Authors)
    }
}
