//! Generated articles.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::ids::DocumentId;

/// Kind of a generated body block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Heading,
    #[default]
    Paragraph,
}

impl BlockKind {
    /// Parse a block type reported by the generator. Anything unrecognized
    /// is treated as a paragraph.
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(|l| l.trim().to_ascii_lowercase()) {
            Some(l) if l == "heading" || l == "h2" || l == "h3" => BlockKind::Heading,
            _ => BlockKind::Paragraph,
        }
    }
}

/// One block of generated article body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BodyBlock {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub text: String,
}

impl BodyBlock {
    pub fn heading(text: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Heading,
            text: text.into(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Paragraph,
            text: text.into(),
        }
    }
}

/// Structured output of the article generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArticle {
    pub title: String,
    pub excerpt: String,
    pub body: Vec<BodyBlock>,
    pub tags: Vec<String>,
}

/// Publication state of an article in the content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PublicationStatus {
    Draft,
    #[default]
    Published,
}

/// Tag entry as stored in the article's array field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleTag {
    pub tag: String,
}

/// Persisted article derived from a video's transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    #[serde(default, skip_serializing_if = "DocumentId::is_empty")]
    pub id: DocumentId,

    pub title: String,

    #[serde(default)]
    pub excerpt: String,

    /// Rich-text body
    pub content: Document,

    pub author_name: String,

    /// Source the video came from
    pub author: DocumentId,

    /// The one video this article was generated from
    pub source_video: DocumentId,

    pub youtube_url: String,

    pub published_at: DateTime<Utc>,

    /// Marks machine-authored content
    pub is_auto_generated: bool,

    #[serde(default)]
    pub featured: bool,

    #[serde(default)]
    pub breaking_news: bool,

    #[serde(default)]
    pub tags: Vec<ArticleTag>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_language: Option<String>,

    #[serde(rename = "_status", default)]
    pub status: PublicationStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero_image: Option<DocumentId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<DocumentId>,
}

impl ArticleRecord {
    /// Plain tag names.
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.tag.as_str()).collect()
    }
}
