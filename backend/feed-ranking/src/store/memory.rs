use super::{ContentStore, Result, StoreError, StoreEvent, EVENT_CHANNEL_CAPACITY};
use crate::models::{Comment, ContentItem, ItemChange, OwnerId, Vote};
use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// In-process store used when no shared backend is configured.
pub struct MemoryContentStore {
    /// Newest first
    items: RwLock<Vec<ContentItem>>,
    votes: RwLock<Vec<Vote>>,
    /// Insertion order per item
    comments: RwLock<Vec<Comment>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::with_items(Vec::new())
    }

    /// Seed with existing items (no events are emitted)
    pub fn with_items(mut items: Vec<ContentItem>) -> Self {
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            items: RwLock::new(items),
            votes: RwLock::new(Vec::new()),
            comments: RwLock::new(Vec::new()),
            events,
        }
    }

    fn emit(&self, event: StoreEvent) {
        // No receivers is fine
        if self.events.send(event).is_err() {
            debug!("No subscribers for store event");
        }
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn list_items(&self) -> Result<Vec<ContentItem>> {
        Ok(self.items.read().await.clone())
    }

    async fn get_item(&self, id: &str) -> Result<Option<ContentItem>> {
        Ok(self.items.read().await.iter().find(|i| i.id == id).cloned())
    }

    async fn insert_item(&self, item: ContentItem) -> Result<()> {
        item.validate()?;
        let item_id = item.id.clone();
        {
            let mut items = self.items.write().await;
            if items.iter().any(|i| i.id == item.id) {
                return Err(StoreError::Conflict(format!("item {} already exists", item.id)));
            }
            let position = items
                .iter()
                .position(|i| i.created_at < item.created_at)
                .unwrap_or(items.len());
            items.insert(position, item);
        }
        self.emit(StoreEvent::ItemInserted { item_id });
        Ok(())
    }

    async fn update_item(&self, item: ContentItem) -> Result<()> {
        item.validate()?;
        let item_id = item.id.clone();
        {
            let mut items = self.items.write().await;
            let slot = items
                .iter_mut()
                .find(|i| i.id == item.id)
                .ok_or_else(|| StoreError::NotFound(format!("item {}", item.id)))?;
            *slot = item;
        }
        self.emit(StoreEvent::ItemUpdated { item_id });
        Ok(())
    }

    async fn apply_change(&self, id: &str, change: ItemChange) -> Result<ContentItem> {
        let updated = {
            let mut items = self.items.write().await;
            let slot = items
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| StoreError::NotFound(format!("item {}", id)))?;
            let mut updated = slot.clone();
            change.apply_to(&mut updated);
            updated.validate()?;
            *slot = updated.clone();
            updated
        };
        self.emit(StoreEvent::ItemUpdated {
            item_id: id.to_string(),
        });
        Ok(updated)
    }

    async fn delete_item(&self, id: &str) -> Result<()> {
        {
            let mut items = self.items.write().await;
            let before = items.len();
            items.retain(|i| i.id != id);
            if items.len() == before {
                return Err(StoreError::NotFound(format!("item {}", id)));
            }
        }
        self.votes.write().await.retain(|v| v.item_id != id);
        self.comments.write().await.retain(|c| c.item_id != id);
        self.emit(StoreEvent::ItemDeleted {
            item_id: id.to_string(),
        });
        Ok(())
    }

    async fn insert_vote(&self, vote: Vote) -> Result<()> {
        if !self.items.read().await.iter().any(|i| i.id == vote.item_id) {
            return Err(StoreError::NotFound(format!("item {}", vote.item_id)));
        }
        {
            let mut votes = self.votes.write().await;
            if votes
                .iter()
                .any(|v| v.item_id == vote.item_id && v.voter == vote.voter)
            {
                return Err(StoreError::Conflict(format!(
                    "{} already voted for {}",
                    vote.voter, vote.item_id
                )));
            }
            votes.push(vote.clone());
        }
        self.emit(StoreEvent::VoteCast {
            item_id: vote.item_id,
            voter: vote.voter,
        });
        Ok(())
    }

    async fn delete_vote(&self, item_id: &str, voter: &OwnerId) -> Result<()> {
        {
            let mut votes = self.votes.write().await;
            let position = votes
                .iter()
                .position(|v| v.item_id == item_id && &v.voter == voter)
                .ok_or_else(|| StoreError::NotFound(format!("vote by {} on {}", voter, item_id)))?;
            votes.remove(position);
        }
        self.emit(StoreEvent::VoteRetracted {
            item_id: item_id.to_string(),
            voter: voter.clone(),
        });
        Ok(())
    }

    async fn list_votes(&self) -> Result<Vec<Vote>> {
        Ok(self.votes.read().await.clone())
    }

    async fn insert_comment(&self, comment: Comment) -> Result<()> {
        comment.validate()?;
        if !self.items.read().await.iter().any(|i| i.id == comment.item_id) {
            return Err(StoreError::NotFound(format!("item {}", comment.item_id)));
        }
        let event = StoreEvent::CommentAdded {
            item_id: comment.item_id.clone(),
            comment_id: comment.id.clone(),
        };
        {
            let mut comments = self.comments.write().await;
            if comments.iter().any(|c| c.id == comment.id) {
                return Err(StoreError::Conflict(format!("comment {} already exists", comment.id)));
            }
            comments.push(comment);
        }
        self.emit(event);
        Ok(())
    }

    async fn list_comments(&self, item_id: &str) -> Result<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .comments
            .read()
            .await
            .iter()
            .filter(|c| c.item_id == item_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.created_at);
        Ok(comments)
    }

    async fn delete_comment(&self, item_id: &str, comment_id: &str) -> Result<()> {
        {
            let mut comments = self.comments.write().await;
            let position = comments
                .iter()
                .position(|c| c.item_id == item_id && c.id == comment_id)
                .ok_or_else(|| StoreError::NotFound(format!("comment {}", comment_id)))?;
            comments.remove(position);
        }
        self.emit(StoreEvent::CommentDeleted {
            item_id: item_id.to_string(),
            comment_id: comment_id.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
