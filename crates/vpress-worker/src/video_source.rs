//! Video discovery.
//!
//! `VideoProvider` fetches raw pages of a channel's uploads; the
//! `VideoSourceClient` walks those pages, drops already-known ids and
//! normalizes metadata into a bounded batch of `VideoMeta`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};
use vpress_models::{default_thumbnail_url, watch_url, VideoId, VideoMeta};

use crate::config::env_parse;
use crate::error::{WorkerError, WorkerResult};

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.\d+)?S)?)?$")
        .expect("static regex")
});

// =============================================================================
// Provider seam
// =============================================================================

/// Video metadata as delivered by a provider, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawVideo {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    /// Provider timestamp, possibly missing or not RFC 3339
    pub published_at: Option<String>,
    /// ISO-8601 duration such as `PT4M13S`
    pub duration: Option<String>,
    pub view_count: Option<u64>,
}

/// One page of a channel feed.
#[derive(Debug, Clone, Default)]
pub struct VideoPage {
    pub items: Vec<RawVideo>,
    /// Continuation cursor; `None` on the last page
    pub next_cursor: Option<String>,
}

/// External provider of channel video feeds.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    async fn fetch_page(&self, channel_id: &str, cursor: Option<&str>) -> WorkerResult<VideoPage>;
}

/// Discovery of new videos for a source.
#[async_trait]
pub trait VideoDiscovery: Send + Sync {
    /// Up to `max_results` videos whose ids are not in `known_ids`.
    async fn list_new_videos(
        &self,
        channel_id: &str,
        max_results: usize,
        known_ids: &HashSet<VideoId>,
    ) -> WorkerResult<Vec<VideoMeta>>;
}

// =============================================================================
// Client
// =============================================================================

/// Paginating, filtering discovery client.
pub struct VideoSourceClient {
    provider: Arc<dyn VideoProvider>,
    max_pages: usize,
}

impl VideoSourceClient {
    pub fn new(provider: Arc<dyn VideoProvider>, max_pages: usize) -> Self {
        Self {
            provider,
            max_pages: max_pages.max(1),
        }
    }
}

#[async_trait]
impl VideoDiscovery for VideoSourceClient {
    async fn list_new_videos(
        &self,
        channel_id: &str,
        max_results: usize,
        known_ids: &HashSet<VideoId>,
    ) -> WorkerResult<Vec<VideoMeta>> {
        let mut batch = Vec::new();
        if max_results == 0 {
            return Ok(batch);
        }

        let mut seen = HashSet::new();
        let mut cursor: Option<String> = None;
        let now = Utc::now();

        for page_number in 1..=self.max_pages {
            let page = self.provider.fetch_page(channel_id, cursor.as_deref()).await?;

            for raw in page.items {
                if raw.video_id.is_empty() {
                    continue;
                }
                let id = VideoId::from(raw.video_id.as_str());
                if known_ids.contains(&id) || !seen.insert(id) {
                    continue;
                }

                batch.push(normalize_video(raw, now));
                if batch.len() >= max_results {
                    debug!(channel_id, pages = page_number, "Discovery batch full");
                    return Ok(batch);
                }
            }

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(batch),
            }
        }

        warn!(
            channel_id,
            max_pages = self.max_pages,
            found = batch.len(),
            "Stopped discovery at page cap"
        );
        Ok(batch)
    }
}

/// Normalize a provider record; missing or unparseable fields get defaults.
pub fn normalize_video(raw: RawVideo, now: DateTime<Utc>) -> VideoMeta {
    let video_id = VideoId::from(raw.video_id);

    VideoMeta {
        thumbnail_url: raw
            .thumbnail_url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| default_thumbnail_url(&video_id)),
        youtube_url: watch_url(&video_id),
        published_at: normalize_published_at(raw.published_at.as_deref(), now),
        duration: raw.duration.as_deref().map(format_iso_duration).unwrap_or_default(),
        view_count: raw.view_count.unwrap_or(0),
        title: raw.title,
        description: raw.description,
        video_id,
    }
}

/// Parse an RFC 3339 timestamp, substituting `now` for anything else
/// (relative strings like "3 days ago", empty values).
pub fn normalize_published_at(raw: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}

/// Render an ISO-8601 duration as `H:MM:SS` or `M:SS`.
///
/// Values that do not parse are returned unchanged.
pub fn format_iso_duration(iso: &str) -> String {
    let Some(caps) = ISO_DURATION.captures(iso.trim()) else {
        return iso.to_string();
    };

    let part = |i: usize| -> u64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    let hours = part(1) * 24 + part(2);
    let minutes = part(3);
    let seconds = part(4);

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

// =============================================================================
// YouTube Data API v3
// =============================================================================

/// YouTube Data API configuration.
#[derive(Debug, Clone)]
pub struct YoutubeConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

impl YoutubeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("YOUTUBE_API_KEY").ok().filter(|k| !k.is_empty()),
            base_url: std::env::var("YOUTUBE_API_BASE_URL").unwrap_or(defaults.base_url),
            timeout: Duration::from_secs(env_parse("YOUTUBE_TIMEOUT_SECS", defaults.timeout.as_secs())),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    #[serde(default)]
    snippet: PlaylistSnippet,
    #[serde(default)]
    content_details: PlaylistContentDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
    #[serde(default)]
    resource_id: Option<ResourceId>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistContentDetails {
    video_id: Option<String>,
    video_published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    #[serde(default)]
    content_details: Option<VideoContentDetails>,
    #[serde(default)]
    statistics: Option<VideoStatistics>,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    /// The API encodes counts as strings
    view_count: Option<String>,
}

/// Thumbnail sizes in order of preference.
const THUMBNAIL_PREFERENCE: [&str; 5] = ["maxres", "standard", "high", "medium", "default"];

/// Provider backed by the YouTube Data API v3.
pub struct YoutubeDataApi {
    http: Client,
    api_key: String,
    base_url: String,
    /// Resolved uploads playlists, keyed by channel id or handle.
    playlists: Mutex<HashMap<String, String>>,
}

impl YoutubeDataApi {
    pub fn new(config: YoutubeConfig) -> WorkerResult<Self> {
        let api_key = config
            .api_key
            .ok_or_else(|| WorkerError::config_error("YOUTUBE_API_KEY not set"))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("vpress-worker/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            playlists: Mutex::new(HashMap::new()),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> WorkerResult<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .http
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(WorkerError::discovery_failed(format!(
                "{} returned 404 for {:?}",
                endpoint, params
            ))),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(WorkerError::from_http_status(
                    status.as_u16(),
                    format!("{} failed: {}", endpoint, body),
                ))
            }
        }
    }

    /// Uploads playlist of a channel: derived for `UC...` ids, looked up
    /// by handle otherwise. Handle lookups are cached for the client's
    /// lifetime, so paging a channel costs one `channels` call.
    async fn uploads_playlist(&self, channel_id: &str) -> WorkerResult<String> {
        if let Some(suffix) = channel_id.strip_prefix("UC").filter(|s| !s.is_empty()) {
            return Ok(format!("UU{}", suffix));
        }

        let cached = self
            .playlists
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(channel_id)
            .cloned();
        if let Some(playlist_id) = cached {
            return Ok(playlist_id);
        }

        let handle = channel_id.trim_start_matches('@');
        let response: ListResponse<ChannelItem> = self
            .get_json("channels", &[("part", "contentDetails"), ("forHandle", handle)])
            .await?;

        let playlist_id = response
            .items
            .into_iter()
            .next()
            .map(|c| c.content_details.related_playlists.uploads)
            .ok_or_else(|| WorkerError::discovery_failed(format!("channel {} not found", channel_id)))?;

        debug!(channel = %channel_id, playlist = %playlist_id, "Resolved uploads playlist");
        self.playlists
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(channel_id.to_string(), playlist_id.clone());
        Ok(playlist_id)
    }

    /// Duration and view counts for a set of videos.
    async fn video_details(&self, ids: &[String]) -> WorkerResult<HashMap<String, VideoItem>> {
        let joined = ids.join(",");
        let response: ListResponse<VideoItem> = self
            .get_json("videos", &[("part", "contentDetails,statistics"), ("id", &joined)])
            .await?;

        Ok(response.items.into_iter().map(|v| (v.id.clone(), v)).collect())
    }
}

#[async_trait]
impl VideoProvider for YoutubeDataApi {
    async fn fetch_page(&self, channel_id: &str, cursor: Option<&str>) -> WorkerResult<VideoPage> {
        let playlist_id = self.uploads_playlist(channel_id).await?;

        let mut params = vec![
            ("part", "snippet,contentDetails"),
            ("playlistId", playlist_id.as_str()),
            ("maxResults", "50"),
        ];
        if let Some(token) = cursor {
            params.push(("pageToken", token));
        }

        let response: ListResponse<PlaylistItem> = self.get_json("playlistItems", &params).await?;

        let mut items: Vec<RawVideo> = response
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item
                    .content_details
                    .video_id
                    .or_else(|| item.snippet.resource_id.and_then(|r| r.video_id))?;
                let thumbnail_url = THUMBNAIL_PREFERENCE
                    .iter()
                    .find_map(|size| item.snippet.thumbnails.get(*size))
                    .map(|t| t.url.clone());

                Some(RawVideo {
                    video_id,
                    title: item.snippet.title,
                    description: item.snippet.description,
                    thumbnail_url,
                    published_at: item
                        .content_details
                        .video_published_at
                        .or(item.snippet.published_at),
                    duration: None,
                    view_count: None,
                })
            })
            .collect();

        if !items.is_empty() {
            let ids: Vec<String> = items.iter().map(|v| v.video_id.clone()).collect();
            match self.video_details(&ids).await {
                Ok(details) => {
                    for item in &mut items {
                        if let Some(detail) = details.get(&item.video_id) {
                            item.duration = detail
                                .content_details
                                .as_ref()
                                .and_then(|c| c.duration.clone());
                            item.view_count = detail
                                .statistics
                                .as_ref()
                                .and_then(|s| s.view_count.as_deref())
                                .and_then(|v| v.parse().ok());
                        }
                    }
                }
                Err(e) => warn!(channel_id, "Video details unavailable, continuing without: {}", e),
            }
        }

        info!(
            channel_id,
            count = items.len(),
            has_more = response.next_page_token.is_some(),
            "Fetched uploads page"
        );

        Ok(VideoPage {
            items,
            next_cursor: response.next_page_token,
        })
    }
}
