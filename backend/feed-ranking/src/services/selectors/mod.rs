// ============================================
// Feed Selectors
// ============================================
//
// Read-only views over one item collection:
// - Trending: last 24h, ranked by votes per hour
// - Top voted: optional time window, ranked by vote count
// - Recent: newest first
// - Monthly champions: top three of the current calendar month
//
// All sorts are stable; inputs are never mutated.

use crate::models::{ContentItem, TrendingItem};
use crate::services::ranking::scorer::velocity;
use crate::utils::{hours_since, MS_PER_HOUR};
use chrono::Duration;
use std::cmp::Ordering;

pub const DEFAULT_LIMIT: usize = 12;
pub const TRENDING_WINDOW_HOURS: i64 = 24;
pub const CHAMPIONS_LIMIT: usize = 3;

/// Options for [`top_voted`]. No period means all-time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopVotedOptions {
    pub limit: usize,
    pub period: Option<Duration>,
}

impl Default for TopVotedOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            period: None,
        }
    }
}

impl TopVotedOptions {
    pub fn all_time() -> Self {
        Self::default()
    }

    pub fn within(period: Duration) -> Self {
        Self {
            period: Some(period),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Items from the last 24 hours, fastest-growing first.
pub fn trending(items: &[ContentItem], limit: usize, now: i64) -> Vec<TrendingItem> {
    trending_within(items, TRENDING_WINDOW_HOURS * MS_PER_HOUR, limit, now)
}

/// Items created strictly after `now - window_ms`, ranked by votes per hour.
pub fn trending_within(
    items: &[ContentItem],
    window_ms: i64,
    limit: usize,
    now: i64,
) -> Vec<TrendingItem> {
    let cutoff = now.saturating_sub(window_ms);

    let mut hot: Vec<TrendingItem> = items
        .iter()
        .filter(|item| item.created_at > cutoff)
        .map(|item| TrendingItem {
            velocity: velocity(item.vote_count, hours_since(item.created_at, now)),
            item: item.clone(),
        })
        .collect();

    hot.sort_by(|a, b| {
        b.velocity
            .partial_cmp(&a.velocity)
            .unwrap_or(Ordering::Equal)
    });
    hot.truncate(limit);
    hot
}

/// Most-voted items, optionally restricted to `created_at > now - period`.
pub fn top_voted(items: &[ContentItem], options: TopVotedOptions, now: i64) -> Vec<ContentItem> {
    let cutoff = options
        .period
        .map(|period| now.saturating_sub(period.num_milliseconds()));

    let mut top: Vec<ContentItem> = items
        .iter()
        .filter(|item| cutoff.map_or(true, |cutoff| item.created_at > cutoff))
        .cloned()
        .collect();

    top.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));
    top.truncate(options.limit);
    top
}

/// Newest items first.
pub fn recent(items: &[ContentItem], limit: usize) -> Vec<ContentItem> {
    let mut newest = items.to_vec();
    newest.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    newest.truncate(limit);
    newest
}

/// Leaderboard of the current month.
#[derive(Debug, Clone, PartialEq)]
pub struct Champions {
    /// Rank order, best first, at most three entries
    pub ranked: Vec<ContentItem>,
}

impl Champions {
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Display order 2nd, 1st, 3rd once three champions exist; rank order otherwise.
    pub fn podium(&self) -> Vec<&ContentItem> {
        match self.ranked.as_slice() {
            [first, second, third] => vec![second, first, third],
            other => other.iter().collect(),
        }
    }
}

/// Top three items created at or after `month_start` (epoch millis).
pub fn monthly_champions(items: &[ContentItem], month_start: i64) -> Champions {
    let mut ranked: Vec<ContentItem> = items
        .iter()
        .filter(|item| item.created_at >= month_start)
        .cloned()
        .collect();

    ranked.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));
    ranked.truncate(CHAMPIONS_LIMIT);
    Champions { ranked }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn aged(id: &str, votes: u64, hours: f64) -> ContentItem {
        ContentItem::new(id, "0xowner", NOW - (hours * MS_PER_HOUR as f64) as i64)
            .with_votes(votes)
    }

    fn ids<T, F: Fn(&T) -> &str>(items: &[T], f: F) -> Vec<&str> {
        items.iter().map(f).collect()
    }

    #[test]
    fn test_trending_prefers_velocity_over_recency() {
        let items = vec![
            aged("a", 10, 1.0),
            aged("b", 10, 40.0),
            aged("c", 1, 0.5),
        ];

        let hot = trending(&items, DEFAULT_LIMIT, NOW);

        // b 超過 24 小時被排除
        assert_eq!(ids(&hot, |t| t.item.id.as_str()), vec!["a", "c"]);
        assert!((hot[0].velocity - 10.0).abs() < 1e-9);
        assert!((hot[1].velocity - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_trending_window_is_exclusive() {
        let items = vec![aged("edge", 5, 24.0), aged("inside", 1, 23.9)];
        let hot = trending(&items, DEFAULT_LIMIT, NOW);
        assert_eq!(ids(&hot, |t| t.item.id.as_str()), vec!["inside"]);
    }

    #[test]
    fn test_trending_respects_limit() {
        let items: Vec<ContentItem> = (0..20).map(|i| aged(&format!("p{}", i), i, 2.0)).collect();
        let hot = trending(&items, 5, NOW);
        assert_eq!(hot.len(), 5);
        assert_eq!(hot[0].item.id, "p19");
    }

    #[test]
    fn test_top_voted_all_time() {
        let items = vec![aged("a", 3, 100.0), aged("b", 9, 2.0), aged("c", 5, 1_000.0)];

        let top = top_voted(&items, TopVotedOptions::all_time(), NOW);

        assert_eq!(ids(&top, |i| i.id.as_str()), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_top_voted_with_period() {
        let items = vec![aged("a", 3, 100.0), aged("b", 9, 2.0), aged("c", 5, 20.0)];

        let top = top_voted(&items, TopVotedOptions::within(Duration::hours(24)), NOW);

        assert_eq!(ids(&top, |i| i.id.as_str()), vec!["b", "c"]);
        for pair in top.windows(2) {
            assert!(pair[0].vote_count >= pair[1].vote_count);
        }
    }

    #[test]
    fn test_top_voted_limit_and_ties() {
        let items = vec![aged("a", 4, 1.0), aged("b", 4, 2.0), aged("c", 4, 3.0)];
        let top = top_voted(&items, TopVotedOptions::all_time().with_limit(2), NOW);
        assert_eq!(ids(&top, |i| i.id.as_str()), vec!["a", "b"]);
    }

    #[test]
    fn test_recent_newest_first() {
        let items = vec![aged("mid", 0, 5.0), aged("new", 0, 1.0), aged("old", 0, 50.0)];

        let newest = recent(&items, DEFAULT_LIMIT);

        assert_eq!(ids(&newest, |i| i.id.as_str()), vec!["new", "mid", "old"]);
        for pair in newest.windows(2) {
            assert!(pair[0].created_at > pair[1].created_at);
        }
    }

    #[test]
    fn test_selectors_do_not_mutate_input() {
        let items = vec![aged("a", 1, 5.0), aged("b", 9, 1.0)];
        let before = items.clone();
        let _ = trending(&items, 1, NOW);
        let _ = top_voted(&items, TopVotedOptions::default(), NOW);
        let _ = recent(&items, 1);
        assert_eq!(items, before);
    }

    #[test]
    fn test_monthly_champions_and_podium() {
        let month_start = NOW - 10 * 24 * MS_PER_HOUR;
        let items = vec![
            aged("last-month", 100, 24.0 * 20.0),
            aged("gold", 30, 5.0),
            aged("bronze", 10, 48.0),
            aged("silver", 20, 24.0),
            aged("fourth", 5, 2.0),
        ];

        let champions = monthly_champions(&items, month_start);

        assert_eq!(
            ids(&champions.ranked, |i| i.id.as_str()),
            vec!["gold", "silver", "bronze"]
        );
        let podium: Vec<&str> = champions.podium().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(podium, vec!["silver", "gold", "bronze"]);
    }

    #[test]
    fn test_podium_with_fewer_than_three() {
        let items = vec![aged("a", 1, 1.0), aged("b", 2, 1.0)];
        let champions = monthly_champions(&items, 0);
        let podium: Vec<&str> = champions.podium().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(podium, vec!["b", "a"]);
        assert!(monthly_champions(&[], 0).is_empty());
    }
}
