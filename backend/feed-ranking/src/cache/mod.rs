// ============================================
// Content Cache
// ============================================
//
// Read-through cache in front of a ContentStore.
//
// Write path:
// 1. Apply the change locally so readers see it immediately
// 2. Send the same field-level change to the store
// 3. On failure undo exactly that change and return the error
//
// Undoing only the failed write's own delta keeps concurrent writes to the
// same item intact: a later write that succeeded is never rolled back with it.
//
// Readers take `snapshot()` and hand it to the ranking engine; `changes()`
// ticks whenever the snapshot may have changed.

use crate::models::{Comment, ContentItem, ItemChange, NewContentItem, OwnerId, Vote};
use crate::store::{ContentStore, Result, StoreError, StoreEvent};
use crate::utils::Clock;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

type VoteKey = (String, OwnerId);

pub struct ContentCache {
    store: Arc<dyn ContentStore>,
    clock: Arc<dyn Clock>,
    /// Newest first, mirrors the store listing
    items: RwLock<Vec<ContentItem>>,
    votes: DashSet<VoteKey>,
    /// Comments of items whose thread has been loaded, oldest first
    comments: DashMap<String, Vec<Comment>>,
    /// Ids of comments shown locally but not yet confirmed by the store
    pending_comments: DashSet<String>,
    generation: watch::Sender<u64>,
}

impl ContentCache {
    pub fn new(store: Arc<dyn ContentStore>, clock: Arc<dyn Clock>) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            store,
            clock,
            items: RwLock::new(Vec::new()),
            votes: DashSet::new(),
            comments: DashMap::new(),
            pending_comments: DashSet::new(),
            generation,
        }
    }

    /// Receiver that changes every time the cached collection is touched
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    fn bump(&self) {
        self.generation.send_modify(|g| *g = g.wrapping_add(1));
    }

    /// Reload items and votes from the store.
    pub async fn refresh(&self) -> Result<()> {
        let items = self.store.list_items().await?;
        let votes = self.store.list_votes().await?;

        let count = items.len();
        *self.items.write().await = items;

        self.votes.clear();
        for vote in votes {
            self.votes.insert((vote.item_id, vote.voter));
        }

        debug!(items = count, votes = self.votes.len(), "Content cache refreshed");
        self.bump();
        Ok(())
    }

    /// Follow store events until the channel closes.
    pub async fn sync(&self, mut events: broadcast::Receiver<StoreEvent>) {
        loop {
            let result = match events.recv().await {
                Ok(
                    StoreEvent::CommentAdded { item_id, .. }
                    | StoreEvent::CommentDeleted { item_id, .. },
                ) => {
                    debug!(item_id = %item_id, "Comment change received");
                    self.reload_comments_if_loaded(&item_id).await
                }
                Ok(event) => {
                    debug!(item_id = %event.item_id(), "Store change received");
                    self.refresh().await
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Store events lagged, reloading");
                    self.reload_everything().await
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Store event stream closed");
                    break;
                }
            };

            if let Err(e) = result {
                warn!(error = %e, "Failed to refresh content cache");
            }
        }
    }

    async fn reload_everything(&self) -> Result<()> {
        self.refresh().await?;
        let loaded: Vec<String> = self.comments.iter().map(|e| e.key().clone()).collect();
        for item_id in loaded {
            self.load_comments(&item_id).await?;
        }
        Ok(())
    }

    /// Read-only copy of the current collection for a ranking pass
    pub async fn snapshot(&self) -> Vec<ContentItem> {
        self.items.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<ContentItem> {
        self.items.read().await.iter().find(|i| i.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Create a new item with a fresh id, zero votes and donations.
    pub async fn add_item(&self, new: NewContentItem) -> Result<ContentItem> {
        let item = ContentItem {
            id: Uuid::new_v4().to_string(),
            owner_id: OwnerId::new(&new.owner_id),
            title: new.title,
            image_url: new.image_url,
            vote_count: 0,
            created_at: self.clock.now_millis(),
            quality_score: new.quality_score,
            donation_total: 0.0,
        };
        item.validate()?;

        self.items.write().await.insert(0, item.clone());
        self.bump();

        if let Err(e) = self.store.insert_item(item.clone()).await {
            warn!(item_id = %item.id, error = %e, "Insert failed, rolling back");
            self.items.write().await.retain(|i| i.id != item.id);
            self.bump();
            return Err(e);
        }

        info!(item_id = %item.id, owner = %item.owner_id, "Content item added");
        Ok(item)
    }

    pub async fn update_title(&self, id: &str, title: &str) -> Result<ContentItem> {
        self.apply_change(id, ItemChange::Title(title.to_string()))
            .await
    }

    pub async fn delete_item(&self, id: &str) -> Result<()> {
        let (position, previous) = {
            let mut items = self.items.write().await;
            let position = items
                .iter()
                .position(|i| i.id == id)
                .ok_or_else(|| StoreError::NotFound(format!("item {}", id)))?;
            (position, items.remove(position))
        };
        let removed_votes: Vec<VoteKey> = self
            .votes
            .iter()
            .filter(|key| key.0 == id)
            .map(|key| key.key().clone())
            .collect();
        for key in &removed_votes {
            self.votes.remove(key);
        }
        let removed_comments = self.comments.remove(id);
        self.bump();

        if let Err(e) = self.store.delete_item(id).await {
            warn!(item_id = %id, error = %e, "Delete failed, rolling back");
            {
                let mut items = self.items.write().await;
                let position = position.min(items.len());
                items.insert(position, previous);
            }
            for key in removed_votes {
                self.votes.insert(key);
            }
            if let Some((item_id, comments)) = removed_comments {
                self.comments.insert(item_id, comments);
            }
            self.bump();
            return Err(e);
        }

        info!(item_id = %id, "Content item deleted");
        Ok(())
    }

    /// Add a tip to the item's donation total.
    pub async fn add_donation(&self, id: &str, amount: f64) -> Result<ContentItem> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(StoreError::InvalidInput(format!(
                "donation amount {} must be positive",
                amount
            )));
        }
        self.apply_change(id, ItemChange::Donation(amount)).await
    }

    /// Record a vote. Returns `false` when this voter already voted.
    pub async fn add_vote(&self, id: &str, voter: &OwnerId) -> Result<bool> {
        if voter.is_empty() {
            return Err(StoreError::InvalidInput("voter must not be empty".to_string()));
        }
        if self.get(id).await.is_none() {
            return Err(StoreError::NotFound(format!("item {}", id)));
        }

        let key: VoteKey = (id.to_string(), voter.clone());
        if !self.votes.insert(key.clone()) {
            return Ok(false);
        }

        let vote = Vote {
            item_id: id.to_string(),
            voter: voter.clone(),
            created_at: self.clock.now_millis(),
        };
        match self.store.insert_vote(vote).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                // Already recorded remotely; keep the local marker
                return Ok(false);
            }
            Err(e) => {
                warn!(item_id = %id, voter = %voter, error = %e, "Vote failed, rolling back");
                self.votes.remove(&key);
                return Err(e);
            }
        }

        if let Err(e) = self.apply_change(id, ItemChange::Votes(1)).await {
            self.votes.remove(&key);
            if let Err(undo) = self.store.delete_vote(id, voter).await {
                warn!(item_id = %id, voter = %voter, error = %undo, "Failed to undo vote");
            }
            return Err(e);
        }

        debug!(item_id = %id, voter = %voter, "Vote recorded");
        Ok(true)
    }

    /// Retract a vote. Returns `false` when this voter had not voted.
    pub async fn remove_vote(&self, id: &str, voter: &OwnerId) -> Result<bool> {
        let key: VoteKey = (id.to_string(), voter.clone());
        if self.votes.remove(&key).is_none() {
            return Ok(false);
        }

        match self.store.delete_vote(id, voter).await {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                // Already gone remotely
                return Ok(false);
            }
            Err(e) => {
                warn!(item_id = %id, voter = %voter, error = %e, "Unvote failed, rolling back");
                self.votes.insert(key);
                return Err(e);
            }
        }

        if let Err(e) = self.apply_change(id, ItemChange::Votes(-1)).await {
            self.votes.insert(key);
            let vote = Vote {
                item_id: id.to_string(),
                voter: voter.clone(),
                created_at: self.clock.now_millis(),
            };
            if let Err(undo) = self.store.insert_vote(vote).await {
                warn!(item_id = %id, voter = %voter, error = %undo, "Failed to restore vote");
            }
            return Err(e);
        }

        debug!(item_id = %id, voter = %voter, "Vote retracted");
        Ok(true)
    }

    pub fn has_voted(&self, id: &str, voter: &OwnerId) -> bool {
        self.votes.contains(&(id.to_string(), voter.clone()))
    }

    /// Number of items this voter has voted for
    pub fn votes_cast_by(&self, voter: &OwnerId) -> usize {
        self.votes.iter().filter(|key| &key.1 == voter).count()
    }

    /// Fetch an item's comment thread and start tracking it.
    pub async fn load_comments(&self, item_id: &str) -> Result<Vec<Comment>> {
        let confirmed = self.store.list_comments(item_id).await?;
        let merged = {
            let local = self.comments.get(item_id);
            merge_comments(
                confirmed,
                local.as_deref().map(Vec::as_slice).unwrap_or_default(),
                &self.pending_comments,
            )
        };
        self.comments.insert(item_id.to_string(), merged.clone());
        self.bump();
        Ok(merged)
    }

    async fn reload_comments_if_loaded(&self, item_id: &str) -> Result<()> {
        if self.comments.contains_key(item_id) {
            self.load_comments(item_id).await?;
        }
        Ok(())
    }

    /// Comments known locally for an item, oldest first
    pub fn comments(&self, item_id: &str) -> Vec<Comment> {
        self.comments
            .get(item_id)
            .map(|thread| thread.clone())
            .unwrap_or_default()
    }

    pub fn comment_count(&self, item_id: &str) -> usize {
        self.comments.get(item_id).map_or(0, |thread| thread.len())
    }

    /// Post a comment. Content is trimmed; blank comments are rejected.
    pub async fn add_comment(
        &self,
        item_id: &str,
        author: &OwnerId,
        content: &str,
    ) -> Result<Comment> {
        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            item_id: item_id.to_string(),
            author: author.clone(),
            content: content.trim().to_string(),
            created_at: self.clock.now_millis(),
        };
        comment.validate()?;
        if self.get(item_id).await.is_none() {
            return Err(StoreError::NotFound(format!("item {}", item_id)));
        }

        self.pending_comments.insert(comment.id.clone());
        self.comments
            .entry(item_id.to_string())
            .or_default()
            .push(comment.clone());
        self.bump();

        let result = self.store.insert_comment(comment.clone()).await;
        self.pending_comments.remove(&comment.id);
        if let Err(e) = result {
            warn!(item_id = %item_id, error = %e, "Comment failed, rolling back");
            if let Some(mut thread) = self.comments.get_mut(item_id) {
                thread.retain(|c| c.id != comment.id);
            }
            self.bump();
            return Err(e);
        }

        debug!(item_id = %item_id, comment_id = %comment.id, "Comment added");
        Ok(comment)
    }

    /// Remove a comment. A comment already gone from the store counts as removed.
    pub async fn delete_comment(&self, item_id: &str, comment_id: &str) -> Result<()> {
        let removed = self.comments.get_mut(item_id).and_then(|mut thread| {
            let position = thread.iter().position(|c| c.id == comment_id)?;
            Some((position, thread.remove(position)))
        });
        self.bump();

        match self.store.delete_comment(item_id, comment_id).await {
            Ok(()) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => {
                warn!(item_id = %item_id, comment_id = %comment_id, error = %e, "Comment delete failed, rolling back");
                if let Some((position, comment)) = removed {
                    let mut thread = self.comments.entry(item_id.to_string()).or_default();
                    let position = position.min(thread.len());
                    thread.insert(position, comment);
                }
                self.bump();
                Err(e)
            }
        }
    }

    /// Apply `change` locally, persist it, and undo only this change on failure.
    async fn apply_change(&self, id: &str, change: ItemChange) -> Result<ContentItem> {
        let previous_title = {
            let mut items = self.items.write().await;
            let slot = items
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| StoreError::NotFound(format!("item {}", id)))?;
            let previous_title = slot.title.clone();
            change.apply_to(slot);
            previous_title
        };
        self.bump();

        match self.store.apply_change(id, change.clone()).await {
            Ok(stored) => Ok(stored),
            Err(e) => {
                warn!(item_id = %id, error = %e, "Update failed, rolling back");
                self.revert(id, &change, previous_title).await;
                Err(e)
            }
        }
    }

    async fn revert(&self, id: &str, change: &ItemChange, previous_title: String) {
        let mut items = self.items.write().await;
        if let Some(slot) = items.iter_mut().find(|i| i.id == id) {
            match change {
                // A newer title wins over the one being undone
                ItemChange::Title(title) => {
                    if &slot.title == title {
                        slot.title = previous_title;
                    }
                }
                ItemChange::Donation(amount) => {
                    slot.donation_total = (slot.donation_total - amount).max(0.0);
                }
                ItemChange::Votes(delta) => ItemChange::Votes(-delta).apply_to(slot),
            }
        }
        drop(items);
        self.bump();
    }
}

/// Store listing plus local comments still awaiting confirmation, deduplicated by id.
fn merge_comments(
    confirmed: Vec<Comment>,
    local: &[Comment],
    pending: &DashSet<String>,
) -> Vec<Comment> {
    let mut merged = confirmed;
    for comment in local {
        if pending.contains(&comment.id) && !merged.iter().any(|c| c.id == comment.id) {
            merged.push(comment.clone());
        }
    }
    merged.sort_by_key(|c| c.created_at);
    merged
}
