use super::FeedScorer;
use crate::models::{ContentItem, Impressions, ScoredItem};

/// Ranking Layer - 綜合分數打分排序
pub struct RankingLayer {
    scorer: FeedScorer,
}

impl Default for RankingLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl RankingLayer {
    pub fn new() -> Self {
        Self {
            scorer: FeedScorer::new(),
        }
    }

    /// 對內容打分並按分數降序排序
    ///
    /// `now` is captured once by the caller so every item in the pass is
    /// scored against the same instant. Ties keep their input order.
    pub fn rank(&self, items: &[ContentItem], impressions: &Impressions, now: i64) -> Vec<ScoredItem> {
        let mut ranked: Vec<ScoredItem> = items
            .iter()
            .map(|item| {
                let views = impressions.get(&item.id).copied().unwrap_or(1);
                ScoredItem {
                    feed_score: self.scorer.score(item, views, now),
                    item: item.clone(),
                }
            })
            .collect();

        // sort_by is stable
        ranked.sort_by(|a, b| b.feed_score.cmp(&a.feed_score));

        ranked
    }
}
