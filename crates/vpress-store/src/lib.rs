//! Content store access.
//!
//! This crate provides:
//! - The `ContentStore` trait over typed collections
//! - A Payload CMS REST client with paginated finds and read retries
//! - An in-memory store enforcing the same uniqueness constraints
//! - Typed repositories for sources, videos and articles

pub mod error;
pub mod memory;
pub mod metrics;
pub mod payload;
pub mod query;
pub mod repos;
pub mod retry;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStore, WriteOp};
pub use payload::{PayloadClient, PayloadConfig};
pub use query::{Collection, Filter};
pub use repos::{ArticleRepository, SourceRepository, VideoRepository};
pub use retry::RetryConfig;
pub use store::{document_id, ContentStore, MediaUpload};
