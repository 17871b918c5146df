use crate::models::ContentItem;
use crate::utils::{hours_since, linear_decay};

pub const ENGAGEMENT_WEIGHT: f64 = 40.0;
pub const RECENCY_WEIGHT: f64 = 30.0;
pub const VELOCITY_WEIGHT: f64 = 20.0;
pub const QUALITY_WEIGHT: f64 = 10.0;

/// Hours until the recency signal reaches its floor
pub const RECENCY_HORIZON_HOURS: f64 = 48.0;
pub const RECENCY_FLOOR: f64 = 0.1;

/// Votes per hour at which velocity saturates
pub const VELOCITY_CAP: f64 = 10.0;
/// Minimum age used as the velocity denominator
pub const MIN_VELOCITY_HOURS: f64 = 0.1;

/// Per-signal points before rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub engagement: f64,
    pub recency: f64,
    pub velocity: f64,
    pub quality: f64,
}

impl ScoreBreakdown {
    /// Final feed score, rounded to the nearest integer in [0, 100].
    pub fn total(&self) -> u32 {
        let sum = self.engagement + self.recency + self.velocity + self.quality;
        sum.round().clamp(0.0, 100.0) as u32
    }
}

/// Composite feed scorer. Pure: the same item, impressions and `now`
/// always give the same score.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedScorer;

impl FeedScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, item: &ContentItem, impressions: u64, now: i64) -> u32 {
        self.breakdown(item, impressions, now).total()
    }

    pub fn breakdown(&self, item: &ContentItem, impressions: u64, now: i64) -> ScoreBreakdown {
        let votes = item.vote_count as f64;
        let hours_age = hours_since(item.created_at, now);

        let engagement_rate = (votes / impressions.max(1) as f64).min(1.0);
        let recency = linear_decay(hours_age, RECENCY_HORIZON_HOURS, RECENCY_FLOOR);
        let velocity = velocity(item.vote_count, hours_age).min(VELOCITY_CAP) / VELOCITY_CAP;

        ScoreBreakdown {
            engagement: engagement_rate * ENGAGEMENT_WEIGHT,
            recency: recency * RECENCY_WEIGHT,
            velocity: velocity * VELOCITY_WEIGHT,
            quality: item.quality() * QUALITY_WEIGHT,
        }
    }
}

/// Votes per hour, with the age floored so brand-new items cannot divide by zero.
pub fn velocity(vote_count: u64, hours_age: f64) -> f64 {
    vote_count as f64 / hours_age.max(MIN_VELOCITY_HOURS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MS_PER_HOUR;

    const NOW: i64 = 1_700_000_000_000;

    fn item_aged(votes: u64, hours: f64) -> ContentItem {
        ContentItem::new("p", "0xowner", NOW - (hours * MS_PER_HOUR as f64) as i64)
            .with_votes(votes)
    }

    #[test]
    fn test_fresh_item_without_votes() {
        let scorer = FeedScorer::new();
        // 0 engagement + 30 recency + 0 velocity + 5 quality
        assert_eq!(scorer.score(&item_aged(0, 0.0), 1, NOW), 35);
    }

    #[test]
    fn test_maximum_score() {
        let scorer = FeedScorer::new();
        let item = item_aged(1_000, 0.0).with_quality(1.0);
        assert_eq!(scorer.score(&item, 1, NOW), 100);
    }

    #[test]
    fn test_breakdown_values() {
        let scorer = FeedScorer::new();
        let b = scorer.breakdown(&item_aged(10, 24.0).with_quality(0.8), 20, NOW);
        assert!((b.engagement - 20.0).abs() < 1e-9);
        assert!((b.recency - 16.5).abs() < 1e-9);
        // 10 votes / 24h = 0.4167/h → 0.8333 pts
        assert!((b.velocity - (10.0 / 24.0) / 10.0 * 20.0).abs() < 1e-9);
        assert!((b.quality - 8.0).abs() < 1e-9);
        assert_eq!(b.total(), 45);
    }

    #[test]
    fn test_score_bounds() {
        let scorer = FeedScorer::new();
        for votes in [0u64, 1, 5, 50, 10_000] {
            for hours in [0.0, 0.05, 1.0, 47.0, 48.0, 1_000.0] {
                for impressions in [0u64, 1, 10, 1_000_000] {
                    for quality in [0.0, 0.5, 1.0] {
                        let item = item_aged(votes, hours).with_quality(quality);
                        let score = scorer.score(&item, impressions, NOW);
                        assert!(score <= 100, "score {} out of range", score);
                    }
                }
            }
        }
    }

    #[test]
    fn test_monotonic_in_votes() {
        let scorer = FeedScorer::new();
        let mut previous = 0;
        for votes in 0..200 {
            let score = scorer.score(&item_aged(votes, 5.0), 50, NOW);
            assert!(score >= previous);
            previous = score;
        }
    }

    #[test]
    fn test_monotonic_in_age() {
        let scorer = FeedScorer::new();
        let mut previous = u32::MAX;
        for half_hours in 0..96 {
            let score = scorer.score(&item_aged(10, half_hours as f64 / 2.0), 10, NOW);
            assert!(score <= previous);
            previous = score;
        }
    }

    #[test]
    fn test_recency_floor_beyond_horizon() {
        let scorer = FeedScorer::new();
        let at_horizon = scorer.breakdown(&item_aged(0, 48.0), 1, NOW);
        let ancient = scorer.breakdown(&item_aged(0, 24.0 * 365.0), 1, NOW);
        assert!((at_horizon.recency - 3.0).abs() < 1e-9);
        assert!((ancient.recency - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_floor_for_new_items() {
        let scorer = FeedScorer::new();
        // 0.1h 下限：1 票 / 0.1h = 10/h，已達上限
        let b = scorer.breakdown(&item_aged(1, 0.0), 1, NOW);
        assert!((b.velocity - 20.0).abs() < 1e-9);
        let b = scorer.breakdown(&item_aged(1, 0.05), 1, NOW);
        assert!((b.velocity - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_impressions_treated_as_one() {
        let scorer = FeedScorer::new();
        let item = item_aged(3, 2.0);
        assert_eq!(scorer.score(&item, 0, NOW), scorer.score(&item, 1, NOW));
    }

    #[test]
    fn test_future_timestamp_counts_as_new() {
        let scorer = FeedScorer::new();
        let future = ContentItem::new("p", "0xowner", NOW + 5 * MS_PER_HOUR);
        assert_eq!(scorer.score(&future, 1, NOW), 35);
    }

    #[test]
    fn test_time_decay_orders_equal_votes() {
        let scorer = FeedScorer::new();
        let a = item_aged(10, 1.0);
        let b = item_aged(10, 40.0);
        assert!(scorer.score(&a, 1, NOW) > scorer.score(&b, 1, NOW));
    }
}
