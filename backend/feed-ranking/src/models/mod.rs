use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Per-item view counts keyed by content id. Missing entries count as one view.
pub type Impressions = HashMap<String, u64>;

/// Identity of a contributor (wallet address or equivalent).
///
/// Always stored trimmed and lower-cased so that every comparison and map key
/// agrees no matter how the caller spelled the address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for OwnerId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for OwnerId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<OwnerId> for String {
    fn from(owner: OwnerId) -> Self {
        owner.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A shared photo together with its engagement metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub owner_id: OwnerId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub vote_count: u64,
    /// Creation time, milliseconds since the Unix epoch
    pub created_at: i64,
    /// Output of the external image analyzer, in [0, 1]
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub donation_total: f64,
}

impl ContentItem {
    pub const DEFAULT_QUALITY: f64 = 0.5;

    pub fn new(id: impl Into<String>, owner_id: impl Into<OwnerId>, created_at: i64) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            title: String::new(),
            image_url: String::new(),
            vote_count: 0,
            created_at,
            quality_score: None,
            donation_total: 0.0,
        }
    }

    pub fn with_votes(mut self, vote_count: u64) -> Self {
        self.vote_count = vote_count;
        self
    }

    pub fn with_quality(mut self, quality_score: f64) -> Self {
        self.quality_score = Some(quality_score);
        self
    }

    pub fn with_donations(mut self, donation_total: f64) -> Self {
        self.donation_total = donation_total;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Quality signal used for scoring: defaulted when absent or not a number,
    /// clamped to [0, 1] otherwise.
    pub fn quality(&self) -> f64 {
        match self.quality_score {
            Some(q) if q.is_finite() => q.clamp(0.0, 1.0),
            _ => Self::DEFAULT_QUALITY,
        }
    }

    /// Boundary check applied before an item reaches a store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if self.owner_id.is_empty() {
            return Err(ValidationError::EmptyOwner);
        }
        if let Some(q) = self.quality_score {
            if !(0.0..=1.0).contains(&q) {
                return Err(ValidationError::QualityOutOfRange(q));
            }
        }
        if !self.donation_total.is_finite() || self.donation_total < 0.0 {
            return Err(ValidationError::InvalidDonation(self.donation_total));
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("content id must not be empty")]
    EmptyId,

    #[error("owner id must not be empty")]
    EmptyOwner,

    #[error("quality score {0} is outside [0, 1]")]
    QualityOutOfRange(f64),

    #[error("donation amount {0} is not a non-negative number")]
    InvalidDonation(f64),

    #[error("comment must not be empty")]
    EmptyComment,
}

/// Fields supplied by the uploader; the cache fills in id, timestamps and counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewContentItem {
    pub owner_id: String,
    pub title: String,
    pub image_url: String,
    pub quality_score: Option<f64>,
}

/// A content item with its composite feed score attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: ContentItem,
    pub feed_score: u32,
}

/// A content item with its votes-per-hour velocity attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingItem {
    #[serde(flatten)]
    pub item: ContentItem,
    pub velocity: f64,
}

/// One affirmative vote. At most one exists per (item, voter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub item_id: String,
    pub voter: OwnerId,
    pub created_at: i64,
}

/// Field-level change to a stored item.
///
/// Writers send the change, not the whole item, so concurrent writes to one
/// item compose instead of overwriting each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ItemChange {
    Title(String),
    /// Added to `donation_total`
    Donation(f64),
    /// Added to `vote_count`, saturating at zero
    Votes(i64),
}

impl ItemChange {
    pub fn apply_to(&self, item: &mut ContentItem) {
        match self {
            ItemChange::Title(title) => item.title = title.clone(),
            ItemChange::Donation(amount) => item.donation_total += amount,
            ItemChange::Votes(delta) if *delta >= 0 => {
                item.vote_count = item.vote_count.saturating_add(delta.unsigned_abs())
            }
            ItemChange::Votes(delta) => {
                item.vote_count = item.vote_count.saturating_sub(delta.unsigned_abs())
            }
        }
    }
}

/// A comment left on a content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub item_id: String,
    pub author: OwnerId,
    pub content: String,
    pub created_at: i64,
}

impl Comment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() || self.item_id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if self.author.is_empty() {
            return Err(ValidationError::EmptyOwner);
        }
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyComment);
        }
        Ok(())
    }
}

/// Anything that can be attributed to an owner, used by the diversity layer.
pub trait HasOwner {
    fn owner(&self) -> &OwnerId;
}

impl HasOwner for ContentItem {
    fn owner(&self) -> &OwnerId {
        &self.owner_id
    }
}

impl HasOwner for ScoredItem {
    fn owner(&self) -> &OwnerId {
        &self.item.owner_id
    }
}

impl HasOwner for TrendingItem {
    fn owner(&self) -> &OwnerId {
        &self.item.owner_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_id_is_case_insensitive() {
        let a = OwnerId::new("0xAbCDef01");
        let b = OwnerId::from(" 0xabcdef01 ");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "0xabcdef01");
    }

    #[test]
    fn test_owner_id_serde_normalizes() {
        let item: ContentItem = serde_json::from_str(
            r#"{"id":"p1","owner_id":"0xDEAD","created_at":1000,"vote_count":3}"#,
        )
        .unwrap();
        assert_eq!(item.owner_id.as_str(), "0xdead");
        assert_eq!(item.vote_count, 3);
        assert_eq!(item.quality_score, None);
        assert_eq!(item.donation_total, 0.0);
    }

    #[test]
    fn test_quality_defaults_and_clamps() {
        let item = ContentItem::new("p1", "0xa", 0);
        assert_eq!(item.quality(), 0.5);
        assert_eq!(item.clone().with_quality(0.0).quality(), 0.0);
        assert_eq!(item.clone().with_quality(1.7).quality(), 1.0);
        assert_eq!(item.with_quality(f64::NAN).quality(), 0.5);
    }

    #[test]
    fn test_validate() {
        let item = ContentItem::new("p1", "0xa", 0);
        assert!(item.validate().is_ok());
        assert_eq!(
            ContentItem::new(" ", "0xa", 0).validate(),
            Err(ValidationError::EmptyId)
        );
        assert_eq!(
            ContentItem::new("p1", "  ", 0).validate(),
            Err(ValidationError::EmptyOwner)
        );
        assert_eq!(
            item.clone().with_quality(1.5).validate(),
            Err(ValidationError::QualityOutOfRange(1.5))
        );
        assert_eq!(
            item.with_donations(-1.0).validate(),
            Err(ValidationError::InvalidDonation(-1.0))
        );
    }

    #[test]
    fn test_item_change_applies_deltas() {
        let mut item = ContentItem::new("p1", "0xa", 0).with_votes(1).with_donations(0.5);

        ItemChange::Donation(0.25).apply_to(&mut item);
        ItemChange::Votes(2).apply_to(&mut item);
        ItemChange::Title("Rex".to_string()).apply_to(&mut item);
        assert_eq!(item.donation_total, 0.75);
        assert_eq!(item.vote_count, 3);
        assert_eq!(item.title, "Rex");

        ItemChange::Votes(-5).apply_to(&mut item);
        assert_eq!(item.vote_count, 0);
    }

    #[test]
    fn test_comment_validate() {
        let comment = Comment {
            id: "c1".to_string(),
            item_id: "p1".to_string(),
            author: OwnerId::new("0xa"),
            content: "good dog".to_string(),
            created_at: 0,
        };
        assert!(comment.validate().is_ok());

        let blank = Comment {
            content: "   ".to_string(),
            ..comment.clone()
        };
        assert_eq!(blank.validate(), Err(ValidationError::EmptyComment));

        let anonymous = Comment {
            author: OwnerId::new(""),
            ..comment
        };
        assert_eq!(anonymous.validate(), Err(ValidationError::EmptyOwner));
    }

    #[test]
    fn test_scored_item_serializes_flat() {
        let scored = ScoredItem {
            item: ContentItem::new("p1", "0xa", 0),
            feed_score: 42,
        };
        let json = serde_json::to_value(&scored).unwrap();
        assert_eq!(json["id"], "p1");
        assert_eq!(json["feed_score"], 42);
    }
}
