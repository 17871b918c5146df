// ============================================
// Content Store
// ============================================
//
// Single storage interface in front of the persistent backends:
// - MemoryContentStore: local fallback, process-lifetime only
// - RedisContentStore: shared store, events also published on a channel
//
// The backend is chosen once at startup (see `open_store`). Every successful
// write emits a StoreEvent on a broadcast channel so readers can re-rank.

mod memory;
mod redis_store;

pub use memory::MemoryContentStore;
pub use redis_store::RedisContentStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::models::{Comment, ContentItem, ItemChange, OwnerId, ValidationError, Vote};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::info;

/// Capacity of the change-event channel per store
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<ValidationError> for StoreError {
    fn from(err: ValidationError) -> Self {
        StoreError::InvalidInput(err.to_string())
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Redis(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Change notification emitted after a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreEvent {
    ItemInserted { item_id: String },
    ItemUpdated { item_id: String },
    ItemDeleted { item_id: String },
    VoteCast { item_id: String, voter: OwnerId },
    VoteRetracted { item_id: String, voter: OwnerId },
    CommentAdded { item_id: String, comment_id: String },
    CommentDeleted { item_id: String, comment_id: String },
}

impl StoreEvent {
    pub fn item_id(&self) -> &str {
        match self {
            StoreEvent::ItemInserted { item_id }
            | StoreEvent::ItemUpdated { item_id }
            | StoreEvent::ItemDeleted { item_id }
            | StoreEvent::VoteCast { item_id, .. }
            | StoreEvent::VoteRetracted { item_id, .. }
            | StoreEvent::CommentAdded { item_id, .. }
            | StoreEvent::CommentDeleted { item_id, .. } => item_id,
        }
    }
}

/// Persistent home of content items and votes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// All items, newest first
    async fn list_items(&self) -> Result<Vec<ContentItem>>;

    async fn get_item(&self, id: &str) -> Result<Option<ContentItem>>;

    /// Fails with `Conflict` when the id is taken
    async fn insert_item(&self, item: ContentItem) -> Result<()>;

    /// Replaces an existing item; `NotFound` if it does not exist
    async fn update_item(&self, item: ContentItem) -> Result<()>;

    /// Applies one field-level change atomically and returns the stored result
    async fn apply_change(&self, id: &str, change: ItemChange) -> Result<ContentItem>;

    /// Removes the item with every vote and comment on it
    async fn delete_item(&self, id: &str) -> Result<()>;

    /// Fails with `Conflict` when this voter already voted for the item
    async fn insert_vote(&self, vote: Vote) -> Result<()>;

    /// Fails with `NotFound` when there is no such vote
    async fn delete_vote(&self, item_id: &str, voter: &OwnerId) -> Result<()>;

    async fn list_votes(&self) -> Result<Vec<Vote>>;

    /// `NotFound` when the item is missing, `Conflict` when the comment id is taken
    async fn insert_comment(&self, comment: Comment) -> Result<()>;

    /// Comments on one item, oldest first
    async fn list_comments(&self, item_id: &str) -> Result<Vec<Comment>>;

    async fn delete_comment(&self, item_id: &str, comment_id: &str) -> Result<()>;

    /// Stream of change events for writes made through this store
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

/// Open the backend selected by configuration.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn ContentStore>> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory content store");
            Ok(Arc::new(MemoryContentStore::new()))
        }
        StoreBackend::Redis => {
            let store = RedisContentStore::new(&config.redis_url, &config.redis_key_prefix)?;
            info!(prefix = %config.redis_key_prefix, "Using Redis content store");
            Ok(Arc::new(store))
        }
    }
}
