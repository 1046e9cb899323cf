//! Hero image import.
//!
//! Downloads a video thumbnail into a temp file and registers it in the
//! content store's media collection. The temp file is removed when the
//! handle drops, whichever way the import ends.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, warn};
use vpress_models::DocumentId;
use vpress_store::{ContentStore, MediaUpload};

use crate::config::env_parse;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Best-effort media import as seen by the pipeline.
#[async_trait]
pub trait MediaImporter: Send + Sync {
    /// Media document id, or `None` when anything went wrong.
    async fn import_thumbnail(&self, url: &str, alt: &str) -> Option<DocumentId>;
}

#[derive(Debug, Clone)]
pub struct ThumbnailConfig {
    /// Wall-clock budget for the download
    pub timeout: Duration,
    pub max_bytes: usize,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ThumbnailConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout: Duration::from_secs(env_parse("THUMBNAIL_TIMEOUT_SECS", defaults.timeout.as_secs())),
            max_bytes: env_parse("THUMBNAIL_MAX_BYTES", defaults.max_bytes),
        }
    }
}

/// `(extension, mime type)` for a response content type.
pub fn image_format(content_type: Option<&str>) -> (&'static str, &'static str) {
    match content_type {
        Some(ct) if ct.to_ascii_lowercase().contains("png") => (".png", "image/png"),
        _ => (".jpg", "image/jpeg"),
    }
}

/// `yt-{title}-{unix_ms}{ext}` with the title reduced to `[A-Za-z0-9-]`.
pub fn safe_filename(title: &str, extension: &str, unix_ms: i64) -> String {
    let mut slug = String::new();
    for word in title.split_whitespace() {
        let cleaned: String = word.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        if cleaned.is_empty() {
            continue;
        }
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&cleaned);
    }
    let slug: String = slug.chars().take(50).collect();
    let slug = slug.trim_end_matches('-');

    if slug.is_empty() {
        format!("yt-{}{}", unix_ms, extension)
    } else {
        format!("yt-{}-{}{}", slug, unix_ms, extension)
    }
}

/// Thumbnail downloader backed by a content store.
pub struct ThumbnailImporter {
    http: Client,
    store: Arc<dyn ContentStore>,
    config: ThumbnailConfig,
}

impl ThumbnailImporter {
    pub fn new(store: Arc<dyn ContentStore>, config: ThumbnailConfig) -> WorkerResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, store, config })
    }

    async fn download(&self, url: &str) -> WorkerResult<(Vec<u8>, Option<String>)> {
        let mut response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::media_failed(format!("thumbnail returned {}", status)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if response.content_length().is_some_and(|len| len as usize > self.config.max_bytes) {
            return Err(WorkerError::media_failed("thumbnail exceeds size limit"));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() + chunk.len() > self.config.max_bytes {
                return Err(WorkerError::media_failed("thumbnail exceeds size limit"));
            }
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            return Err(WorkerError::media_failed("thumbnail is empty"));
        }

        Ok((bytes, content_type))
    }

    /// Download and register a thumbnail.
    pub async fn import(&self, url: &str, alt: &str) -> WorkerResult<DocumentId> {
        let (bytes, content_type) = tokio::time::timeout(self.config.timeout, self.download(url))
            .await
            .map_err(|_| WorkerError::timeout(format!("thumbnail download exceeded {:?}", self.config.timeout)))??;

        let (extension, mime_type) = image_format(content_type.as_deref());
        let mut file = tempfile::Builder::new()
            .prefix("vpress-thumb-")
            .suffix(extension)
            .tempfile()?;
        file.write_all(&bytes)?;
        file.flush()?;

        let filename = safe_filename(alt, extension, chrono::Utc::now().timestamp_millis());
        debug!(filename = %filename, size = bytes.len(), "Uploading thumbnail");

        let id = self
            .store
            .upload_media(MediaUpload {
                path: file.path().to_path_buf(),
                filename,
                mime_type: mime_type.to_string(),
                alt: alt.to_string(),
            })
            .await?;

        Ok(id)
    }
}

#[async_trait]
impl MediaImporter for ThumbnailImporter {
    async fn import_thumbnail(&self, url: &str, alt: &str) -> Option<DocumentId> {
        if url.trim().is_empty() {
            return None;
        }

        match self.import(url, alt).await {
            Ok(id) => {
                metrics::record_thumbnail(true);
                Some(id)
            }
            Err(e) => {
                warn!(url, "Thumbnail import failed, continuing without hero image: {}", e);
                metrics::record_thumbnail(false);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_format() {
        assert_eq!(image_format(Some("image/png")), (".png", "image/png"));
        assert_eq!(image_format(Some("image/webp")), (".jpg", "image/jpeg"));
        assert_eq!(image_format(None), (".jpg", "image/jpeg"));
    }

    #[test]
    fn test_safe_filename() {
        assert_eq!(
            safe_filename("Breaking: Storm hits   the coast!", ".jpg", 1700000000000),
            "yt-Breaking-Storm-hits-the-coast-1700000000000.jpg"
        );
        assert_eq!(safe_filename("عاجل", ".png", 5), "yt-5.png");

        let long = "word ".repeat(30);
        let name = safe_filename(&long, ".jpg", 1);
        let slug = name.trim_start_matches("yt-").trim_end_matches("-1.jpg");
        assert!(slug.len() <= 50);
        assert!(slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    }
}
