//! Caption tracks published on the YouTube watch page.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use vpress_models::VideoId;

use super::normalize::{normalize_text, parse_timedtext};
use super::{CaptionStrategy, Transcript};
use crate::error::{WorkerError, WorkerResult};

/// Which tracks a strategy is allowed to pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionMode {
    /// Only tracks in the requested language
    Requested,
    /// Any language, requested one first
    AnyAvailable,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    /// `asr` for auto-generated tracks
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    fn matches_language(&self, language: &str) -> bool {
        primary_subtag(&self.language_code) == primary_subtag(language)
    }
}

fn primary_subtag(tag: &str) -> String {
    tag.split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Pick a track: requested language before others, manual before generated.
pub fn choose_track<'a>(
    tracks: &'a [CaptionTrack],
    mode: CaptionMode,
    language: &str,
) -> Option<&'a CaptionTrack> {
    let rank = |t: &CaptionTrack| (!t.matches_language(language), t.is_generated());

    tracks
        .iter()
        .filter(|t| mode == CaptionMode::AnyAvailable || t.matches_language(language))
        .min_by_key(|t| rank(t))
}

/// Locate the `captionTracks` JSON array inside a watch page.
///
/// The page embeds it in a large script blob, so the array is cut out by
/// bracket matching rather than parsing the whole player response.
pub fn extract_caption_tracks(html: &str) -> Option<Vec<CaptionTrack>> {
    const KEY: &str = "\"captionTracks\":";
    let start = html.find(KEY)? + KEY.len();
    let rest = &html[start..];
    if !rest.starts_with('[') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in rest.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return serde_json::from_str(&rest[..=idx]).ok();
                }
            }
            _ => {}
        }
    }

    None
}

/// Watch-page caption strategy.
pub struct YoutubeCaptions {
    http: Client,
    base_url: String,
    mode: CaptionMode,
}

impl YoutubeCaptions {
    pub fn new(http: Client, base_url: impl Into<String>, mode: CaptionMode) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            mode,
        }
    }

    async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> WorkerResult<Option<String>> {
        let response = self.http.get(url).query(query).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(Some(response.text().await?));
        }
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(WorkerError::from_http_status(
                status.as_u16(),
                format!("caption request to {} failed", url),
            ));
        }

        debug!(url, status = status.as_u16(), "Caption request rejected");
        Ok(None)
    }
}

#[async_trait]
impl CaptionStrategy for YoutubeCaptions {
    fn name(&self) -> &'static str {
        match self.mode {
            CaptionMode::Requested => "captions",
            CaptionMode::AnyAvailable => "captions_any_language",
        }
    }

    async fn fetch(&self, video_id: &VideoId, language: &str) -> WorkerResult<Option<Transcript>> {
        let watch_url = format!("{}/watch", self.base_url);
        let Some(page) = self
            .get_text(&watch_url, &[("v", video_id.as_str()), ("hl", language)])
            .await?
        else {
            return Ok(None);
        };

        let Some(tracks) = extract_caption_tracks(&page) else {
            debug!(video_id = %video_id, "No caption tracks on watch page");
            return Ok(None);
        };

        let Some(track) = choose_track(&tracks, self.mode, language) else {
            debug!(
                video_id = %video_id,
                language,
                available = tracks.len(),
                "No caption track for language"
            );
            return Ok(None);
        };

        let Some(xml) = self.get_text(&track.base_url, &[]).await? else {
            return Ok(None);
        };

        let text = normalize_text(&parse_timedtext(&xml));
        if text.is_empty() {
            return Ok(None);
        }

        Ok(Some(Transcript {
            text,
            language: track.language_code.clone(),
        }))
    }
}
