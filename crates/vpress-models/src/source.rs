//! Content sources (channel authors).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::DocumentId;

/// Language assumed for a source that does not declare one.
pub const DEFAULT_SOURCE_LANGUAGE: &str = "ar";

fn default_active() -> bool {
    true
}

/// A channel/author polled for new videos.
///
/// Created by an operator; the pipeline only bumps `last_fetched_at` and
/// `fetch_count` after each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Content-store document id
    #[serde(default)]
    pub id: DocumentId,

    /// Display name
    pub name: String,

    /// External channel identifier (`UC...` id or `@handle`)
    pub channel_id: String,

    /// Only active sources are selected for runs
    #[serde(default = "default_active")]
    pub active: bool,

    /// Language hint for transcripts and generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// When the pipeline last ran against this source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fetched_at: Option<DateTime<Utc>>,

    /// Number of completed pipeline runs for this source
    #[serde(default)]
    pub fetch_count: u32,

    /// Optional category applied to generated articles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<DocumentId>,
}

impl Source {
    /// Language hint, falling back to the default when unset or blank.
    pub fn language_or_default(&self) -> &str {
        match self.language.as_deref().map(str::trim) {
            Some(lang) if !lang.is_empty() => lang,
            _ => DEFAULT_SOURCE_LANGUAGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_deserializes_store_document() {
        let json = serde_json::json!({
            "id": 3,
            "name": "Tech Weekly",
            "channelId": "UC123",
            "language": "en",
            "fetchCount": 4,
            "category": "cat-1",
            "createdAt": "2024-01-01T00:00:00.000Z"
        });

        let source: Source = serde_json::from_value(json).unwrap();
        assert_eq!(source.id.as_str(), "3");
        assert!(source.active);
        assert_eq!(source.fetch_count, 4);
        assert_eq!(source.category, Some(DocumentId::from("cat-1")));
        assert!(source.last_fetched_at.is_none());
    }

    #[test]
    fn test_language_fallback() {
        let mut source: Source = serde_json::from_value(serde_json::json!({
            "name": "x",
            "channelId": "UC1",
            "language": "  "
        }))
        .unwrap();
        assert_eq!(source.language_or_default(), "ar");

        source.language = Some("en".into());
        assert_eq!(source.language_or_default(), "en");
    }
}
