//! Video records and their processing state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{DocumentId, VideoId};

/// Processing status of a video record.
///
/// ```text
/// pending -> fetched -> transcribed -> article_generated
/// fetched -> no_transcript
/// any non-failed -> failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Discovered, nothing persisted beyond the record itself
    #[default]
    Pending,
    /// Metadata persisted
    Fetched,
    /// Transcript persisted
    Transcribed,
    /// Article persisted for this video
    ArticleGenerated,
    /// Every transcript strategy came back empty
    NoTranscript,
    /// Unrecoverable error while processing
    Failed,
}

impl VideoStatus {
    pub const ALL: [VideoStatus; 6] = [
        VideoStatus::Pending,
        VideoStatus::Fetched,
        VideoStatus::Transcribed,
        VideoStatus::ArticleGenerated,
        VideoStatus::NoTranscript,
        VideoStatus::Failed,
    ];

    /// Statuses the recovery surface deletes so the video is rediscovered.
    pub const RECOVERABLE: [VideoStatus; 2] = [VideoStatus::NoTranscript, VideoStatus::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Fetched => "fetched",
            VideoStatus::Transcribed => "transcribed",
            VideoStatus::ArticleGenerated => "article_generated",
            VideoStatus::NoTranscript => "no_transcript",
            VideoStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more transitions expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VideoStatus::ArticleGenerated | VideoStatus::NoTranscript | VideoStatus::Failed
        )
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: VideoStatus) -> bool {
        use VideoStatus::*;

        match (self, next) {
            (Failed, _) => false,
            (_, Failed) => true,
            (Pending, Fetched) => true,
            (Fetched, Transcribed) | (Fetched, NoTranscript) => true,
            (Transcribed, ArticleGenerated) => true,
            _ => false,
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown video status: {0}")]
pub struct UnknownVideoStatus(pub String);

impl FromStr for VideoStatus {
    type Err = UnknownVideoStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VideoStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVideoStatus(s.to_string()))
    }
}

/// Video metadata returned by discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMeta {
    pub video_id: VideoId,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub youtube_url: String,
    /// Normalized publish time (falls back to discovery time)
    pub published_at: DateTime<Utc>,
    /// Human readable duration, e.g. `12:34`
    pub duration: String,
    pub view_count: u64,
}

/// Persisted record tracking one external video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    /// Content-store document id (empty until persisted)
    #[serde(default, skip_serializing_if = "DocumentId::is_empty")]
    pub id: DocumentId,

    pub title: String,

    /// External video id, unique across the collection
    pub video_id: VideoId,

    pub youtube_url: String,

    /// Owning source
    pub author: DocumentId,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub thumbnail_url: String,

    #[serde(default)]
    pub duration: String,

    pub published_at: DateTime<Utc>,

    #[serde(default)]
    pub view_count: u64,

    /// Length-capped transcript copy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_language: Option<String>,

    #[serde(default)]
    pub status: VideoStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl VideoRecord {
    /// Build a new record for a discovered video in the `fetched` state.
    pub fn fetched(meta: &VideoMeta, author: DocumentId) -> Self {
        Self {
            id: DocumentId::default(),
            title: meta.title.clone(),
            video_id: meta.video_id.clone(),
            youtube_url: meta.youtube_url.clone(),
            author,
            description: meta.description.clone(),
            thumbnail_url: meta.thumbnail_url.clone(),
            duration: meta.duration.clone(),
            published_at: meta.published_at,
            view_count: meta.view_count,
            transcript: None,
            transcript_language: None,
            status: VideoStatus::Fetched,
            error_message: None,
        }
    }
}

/// Canonical watch URL for a video.
pub fn watch_url(video_id: &VideoId) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Thumbnail used when the provider does not return one.
pub fn default_thumbnail_url(video_id: &VideoId) -> String {
    format!("https://i.ytimg.com/vi/{}/maxresdefault.jpg", video_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(VideoStatus::Pending.can_transition_to(VideoStatus::Fetched));
        assert!(VideoStatus::Fetched.can_transition_to(VideoStatus::Transcribed));
        assert!(VideoStatus::Transcribed.can_transition_to(VideoStatus::ArticleGenerated));
        assert!(VideoStatus::Fetched.can_transition_to(VideoStatus::NoTranscript));
    }

    #[test]
    fn test_article_generated_requires_transcribed() {
        for status in VideoStatus::ALL {
            let allowed = status.can_transition_to(VideoStatus::ArticleGenerated);
            assert_eq!(allowed, status == VideoStatus::Transcribed, "from {status}");
        }
    }

    #[test]
    fn test_failed_reachable_from_everything_but_itself() {
        for status in VideoStatus::ALL {
            assert_eq!(
                status.can_transition_to(VideoStatus::Failed),
                status != VideoStatus::Failed
            );
        }
        assert!(!VideoStatus::Failed.can_transition_to(VideoStatus::Fetched));
    }

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in VideoStatus::ALL {
            assert_eq!(status.as_str().parse::<VideoStatus>(), Ok(status));
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!("processing".parse::<VideoStatus>().is_err());
    }

    #[test]
    fn test_record_omits_unassigned_id() {
        let meta = VideoMeta {
            video_id: VideoId::from("abc"),
            title: "Title".into(),
            description: String::new(),
            thumbnail_url: default_thumbnail_url(&VideoId::from("abc")),
            youtube_url: watch_url(&VideoId::from("abc")),
            published_at: Utc::now(),
            duration: "1:00".into(),
            view_count: 10,
        };
        let record = VideoRecord::fetched(&meta, DocumentId::from("src"));
        let value = serde_json::to_value(&record).unwrap();

        assert!(value.get("id").is_none());
        assert_eq!(value["videoId"], "abc");
        assert_eq!(value["status"], "fetched");
        assert_eq!(value["youtubeUrl"], "https://www.youtube.com/watch?v=abc");
    }
}
