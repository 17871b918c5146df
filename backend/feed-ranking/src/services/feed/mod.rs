use super::diversity::DiversityLayer;
use super::ranking::{FeedScorer, RankingLayer};
use super::selectors::{self, Champions, TopVotedOptions};
use super::stats::{compute_stats, FeedStats};
use crate::config::FeedConfig;
use crate::models::{ContentItem, Impressions, ScoredItem, TrendingItem};
use crate::utils::{month_start_millis, Clock, SystemClock, MS_PER_HOUR};
use std::sync::Arc;
use tracing::debug;

/// Feed Engine - 組合打分、多樣性與各種選擇器
///
/// Every call reads the clock exactly once, so all items in one pass are
/// judged against the same instant.
pub struct FeedEngine {
    config: FeedConfig,
    clock: Arc<dyn Clock>,
    scorer: FeedScorer,
    ranking: RankingLayer,
    diversity: DiversityLayer,
}

impl FeedEngine {
    pub fn new(config: FeedConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: FeedConfig, clock: Arc<dyn Clock>) -> Self {
        let diversity = DiversityLayer::new(config.max_consecutive);
        Self {
            config,
            clock,
            scorer: FeedScorer::new(),
            ranking: RankingLayer::new(),
            diversity,
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Composite score of a single item right now.
    pub fn score(&self, item: &ContentItem, impressions: Option<u64>) -> u32 {
        self.scorer
            .score(item, impressions.unwrap_or(1), self.clock.now_millis())
    }

    /// Score, sort and diversify every item; nothing is dropped.
    /// `None` uses the configured consecutive-owner limit.
    pub fn rank_with_diversity(
        &self,
        items: &[ContentItem],
        impressions: &Impressions,
        max_consecutive: Option<usize>,
    ) -> Vec<ScoredItem> {
        let now = self.clock.now_millis();
        let ranked = self.ranking.rank(items, impressions, now);

        match max_consecutive {
            Some(limit) if limit != self.diversity.max_consecutive() => {
                DiversityLayer::new(limit).diversify(ranked)
            }
            _ => self.diversity.diversify(ranked),
        }
    }

    /// One page of the personalized feed.
    pub fn for_you(&self, items: &[ContentItem], impressions: &Impressions) -> Vec<ScoredItem> {
        let mut page = self.rank_with_diversity(items, impressions, None);
        page.truncate(self.config.page_size);

        debug!(
            candidates = items.len(),
            page = page.len(),
            top_score = page.first().map(|s| s.feed_score),
            "For-you feed ranked"
        );

        page
    }

    pub fn trending(&self, items: &[ContentItem], limit: Option<usize>) -> Vec<TrendingItem> {
        selectors::trending_within(
            items,
            self.config.trending_window_hours.saturating_mul(MS_PER_HOUR),
            limit.unwrap_or(selectors::DEFAULT_LIMIT),
            self.clock.now_millis(),
        )
    }

    pub fn top_voted(&self, items: &[ContentItem], options: TopVotedOptions) -> Vec<ContentItem> {
        selectors::top_voted(items, options, self.clock.now_millis())
    }

    pub fn recent(&self, items: &[ContentItem], limit: Option<usize>) -> Vec<ContentItem> {
        selectors::recent(items, limit.unwrap_or(selectors::DEFAULT_LIMIT))
    }

    /// Top three of the current calendar month.
    pub fn champions(&self, items: &[ContentItem]) -> Champions {
        selectors::monthly_champions(items, month_start_millis(self.clock.now()))
    }

    pub fn stats(&self, items: &[ContentItem]) -> FeedStats {
        compute_stats(items, self.clock.now())
    }
}
