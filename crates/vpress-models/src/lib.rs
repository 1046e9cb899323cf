//! Shared data models for the VideoPress pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Content sources, video records and their status machine
//! - Generated articles and the rich-text block-tree document
//! - Run and recovery summaries

pub mod article;
pub mod document;
pub mod ids;
pub mod source;
pub mod summary;
pub mod utils;
pub mod video;

// Re-export common types
pub use article::{
    ArticleRecord, ArticleTag, BlockKind, BodyBlock, GeneratedArticle, PublicationStatus,
};
pub use document::{convert_to_document, BlockNode, Direction, Document};
pub use ids::{DocumentId, VideoId};
pub use source::{Source, DEFAULT_SOURCE_LANGUAGE};
pub use summary::{RecoverySummary, RunSummary};
pub use utils::{collapse_whitespace, truncate_chars, truncate_with_ellipsis};
pub use video::{default_thumbnail_url, watch_url, VideoMeta, VideoRecord, VideoStatus};
