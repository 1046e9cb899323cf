//! Payload CMS REST API client.
//!
//! - API-key authentication
//! - HTTP client tuning (pooling, timeouts)
//! - Full pagination for finds, retry with jitter for reads
//! - Observability (tracing spans, metrics)

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info_span, Instrument};
use url::Url;
use vpress_models::DocumentId;

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_request;
use crate::query::{Collection, Filter};
use crate::retry::{with_retry, RetryConfig};
use crate::store::{document_id, ContentStore, MediaUpload};

/// Upper bound on pages walked by a single find.
const MAX_FIND_PAGES: u32 = 1000;

// =============================================================================
// Configuration
// =============================================================================

/// Payload client configuration.
#[derive(Debug, Clone)]
pub struct PayloadConfig {
    /// Base URL of the CMS, e.g. `https://cms.example.com`
    pub base_url: String,
    /// API key of the service user
    pub api_key: Option<String>,
    /// Auth-enabled collection the API key belongs to
    pub auth_collection: String,
    /// Documents requested per page
    pub page_size: u32,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration for reads
    pub retry: RetryConfig,
}

impl PayloadConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            auth_collection: "users".to_string(),
            page_size: 100,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        let base_url = std::env::var("PAYLOAD_URL")
            .map_err(|_| StoreError::config_error("PAYLOAD_URL must be set to use the Payload store"))?;

        if base_url.trim().is_empty() {
            return Err(StoreError::config_error("PAYLOAD_URL cannot be empty"));
        }

        Ok(Self {
            base_url,
            api_key: std::env::var("PAYLOAD_API_KEY").ok().filter(|k| !k.is_empty()),
            auth_collection: std::env::var("PAYLOAD_AUTH_COLLECTION")
                .unwrap_or_else(|_| "users".to_string()),
            page_size: std::env::var("PAYLOAD_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(100),
            timeout: Duration::from_secs(
                std::env::var("PAYLOAD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            connect_timeout: Duration::from_secs(
                std::env::var("PAYLOAD_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            retry: RetryConfig::from_env(),
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindResponse {
    #[serde(default)]
    docs: Vec<Value>,
    #[serde(default)]
    has_next_page: bool,
    #[serde(default)]
    next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct DocResponse {
    doc: Value,
}

// =============================================================================
// Client
// =============================================================================

/// Payload REST API client.
#[derive(Clone)]
pub struct PayloadClient {
    http: Client,
    config: PayloadConfig,
    api_base: Url,
}

impl PayloadClient {
    /// Create a new client.
    pub fn new(config: PayloadConfig) -> StoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("vpress-store/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base = config.base_url.trim_end_matches('/');
        let api_base = Url::parse(&format!("{}/api/", base))
            .map_err(|e| StoreError::config_error(format!("invalid PAYLOAD_URL {}: {}", base, e)))?;

        Ok(Self {
            http,
            config,
            api_base,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::new(PayloadConfig::from_env()?)
    }

    fn collection_url(&self, collection: Collection) -> StoreResult<Url> {
        self.api_base
            .join(collection.slug())
            .map_err(|e| StoreError::config_error(e.to_string()))
    }

    fn document_url(&self, collection: Collection, id: &DocumentId) -> StoreResult<Url> {
        let mut url = self.collection_url(collection)?;
        url.path_segments_mut()
            .map_err(|_| StoreError::config_error("base URL cannot carry a path"))?
            .push(id.as_str());
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header(
                reqwest::header::AUTHORIZATION,
                format!("{} API-Key {}", self.config.auth_collection, key),
            ),
            None => request,
        }
    }

    /// Fetch one page of a find.
    async fn find_page(&self, collection: Collection, filter: &Filter, page: u32) -> StoreResult<FindResponse> {
        let mut url = self.collection_url(collection)?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in filter.to_query_pairs() {
                query.append_pair(&key, &value);
            }
            query
                .append_pair("limit", &self.config.page_size.to_string())
                .append_pair("page", &page.to_string())
                .append_pair("depth", "0");
        }

        let response = self.authorize(self.http.get(url.clone())).send().await?;
        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status => Err(Self::handle_error_response(status, url.as_str(), response).await),
        }
    }

    /// Execute a request with tracing span and metrics.
    async fn execute_request<T, F>(
        &self,
        operation: &str,
        collection: Collection,
        doc_id: Option<&DocumentId>,
        fut: F,
    ) -> StoreResult<T>
    where
        F: std::future::Future<Output = StoreResult<T>>,
    {
        let span = match doc_id {
            Some(id) => info_span!("store_request", operation = %operation, collection = %collection, doc_id = %id),
            None => info_span!("store_request", operation = %operation, collection = %collection),
        };

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, collection.slug(), status, latency_ms);

        result
    }

    async fn handle_error_response(status: StatusCode, url: &str, response: Response) -> StoreError {
        let body = response.text().await.unwrap_or_default();
        StoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }

    async fn expect_doc(url: &str, response: Response) -> StoreResult<Value> {
        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let body: DocResponse = response.json().await?;
                Ok(body.doc)
            }
            status => Err(Self::handle_error_response(status, url, response).await),
        }
    }
}

#[async_trait]
impl ContentStore for PayloadClient {
    async fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Value>> {
        self.execute_request("find", collection, None, async {
            let mut docs = Vec::new();
            let mut page = 1;

            loop {
                let response = with_retry(&self.config.retry, "find", || {
                    self.find_page(collection, filter, page)
                })
                .await?;

                docs.extend(response.docs);

                if !response.has_next_page {
                    break;
                }

                // Some deployments omit nextPage and only set hasNextPage
                let next = response.next_page.unwrap_or(page + 1);
                if next <= page {
                    return Err(StoreError::invalid_response(format!(
                        "{} find returned nextPage {} after page {}",
                        collection, next, page
                    )));
                }
                page = next;

                if page > MAX_FIND_PAGES {
                    return Err(StoreError::invalid_response(format!(
                        "{} find exceeded {} pages",
                        collection, MAX_FIND_PAGES
                    )));
                }
            }

            debug!(collection = %collection, count = docs.len(), "Find complete");
            Ok(docs)
        })
        .await
    }

    async fn create(&self, collection: Collection, data: Value) -> StoreResult<Value> {
        let url = self.collection_url(collection)?;

        self.execute_request("create", collection, None, async {
            let response = self
                .authorize(self.http.post(url.clone()))
                .json(&data)
                .send()
                .await?;
            Self::expect_doc(url.as_str(), response).await
        })
        .await
    }

    async fn update(&self, collection: Collection, id: &DocumentId, patch: Value) -> StoreResult<Value> {
        let url = self.document_url(collection, id)?;

        self.execute_request("update", collection, Some(id), async {
            let response = self
                .authorize(self.http.patch(url.clone()))
                .json(&patch)
                .send()
                .await?;
            Self::expect_doc(url.as_str(), response).await
        })
        .await
    }

    async fn delete(&self, collection: Collection, id: &DocumentId) -> StoreResult<()> {
        let url = self.document_url(collection, id)?;

        self.execute_request("delete", collection, Some(id), async {
            let response = self.authorize(self.http.delete(url.clone())).send().await?;
            match response.status() {
                status if status.is_success() => Ok(()),
                status => Err(Self::handle_error_response(status, url.as_str(), response).await),
            }
        })
        .await
    }

    async fn upload_media(&self, upload: MediaUpload) -> StoreResult<DocumentId> {
        let url = self.collection_url(Collection::Media)?;

        self.execute_request("upload_media", Collection::Media, None, async {
            let bytes = tokio::fs::read(&upload.path).await?;
            let file = Part::bytes(bytes)
                .file_name(upload.filename.clone())
                .mime_str(&upload.mime_type)?;
            let form = Form::new()
                .part("file", file)
                .text("_payload", json!({ "alt": upload.alt }).to_string());

            let response = self
                .authorize(self.http.post(url.clone()))
                .multipart(form)
                .send()
                .await?;
            let doc = Self::expect_doc(url.as_str(), response).await?;
            document_id(&doc)
        })
        .await
    }

    async fn health_check(&self) -> StoreResult<()> {
        let mut url = self.collection_url(Collection::Authors)?;
        url.query_pairs_mut()
            .append_pair("limit", "1")
            .append_pair("depth", "0");

        self.execute_request("health_check", Collection::Authors, None, async {
            let response = self.authorize(self.http.get(url.clone())).send().await?;
            match response.status() {
                StatusCode::OK => Ok(()),
                status => Err(Self::handle_error_response(status, url.as_str(), response).await),
            }
        })
        .await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_config_from_env_requires_url() {
        std::env::remove_var("PAYLOAD_URL");
        assert!(PayloadConfig::from_env().is_err());

        std::env::set_var("PAYLOAD_URL", "  ");
        assert!(PayloadConfig::from_env().is_err());
        std::env::remove_var("PAYLOAD_URL");
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        std::env::set_var("PAYLOAD_URL", "http://cms.local");
        std::env::set_var("PAYLOAD_API_KEY", "k");
        std::env::remove_var("PAYLOAD_AUTH_COLLECTION");
        std::env::remove_var("PAYLOAD_PAGE_SIZE");

        let config = PayloadConfig::from_env().unwrap();
        assert_eq!(config.base_url, "http://cms.local");
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.auth_collection, "users");
        assert_eq!(config.page_size, 100);

        std::env::remove_var("PAYLOAD_URL");
        std::env::remove_var("PAYLOAD_API_KEY");
    }

    #[test]
    fn test_document_url_escapes_id() {
        let client = PayloadClient::new(PayloadConfig::new("http://cms.local/")).unwrap();
        let url = client
            .document_url(Collection::Videos, &DocumentId::from("a b"))
            .unwrap();
        assert_eq!(url.as_str(), "http://cms.local/api/videos/a%20b");
    }
}
