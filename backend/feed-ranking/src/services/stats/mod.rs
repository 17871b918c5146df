use crate::models::{ContentItem, OwnerId};
use crate::utils::{month_start_millis, round_to};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// Aggregate numbers shown on the landing page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStats {
    pub total: usize,
    pub total_votes: u64,
    /// Sum of donations, formatted with four decimals
    pub total_donations: String,
    /// Items created since the start of the current calendar month (local time)
    pub this_month: usize,
    pub unique_owners: usize,
    /// Average votes per item, one decimal; 0 when there are no items
    pub avg_votes: f64,
}

pub fn compute_stats(items: &[ContentItem], now: DateTime<Utc>) -> FeedStats {
    let total = items.len();
    let total_votes: u64 = items.iter().map(|i| i.vote_count).sum();
    let total_donations: f64 = items.iter().map(|i| i.donation_total).sum();

    let month_start = month_start_millis(now);
    let this_month = items.iter().filter(|i| i.created_at >= month_start).count();

    let unique_owners = items
        .iter()
        .map(|i| &i.owner_id)
        .collect::<HashSet<&OwnerId>>()
        .len();

    let avg_votes = if total > 0 {
        round_to(total_votes as f64 / total as f64, 1)
    } else {
        0.0
    };

    FeedStats {
        total,
        total_votes,
        total_donations: format!("{:.4}", total_donations),
        this_month,
        unique_owners,
        avg_votes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MS_PER_HOUR;

    #[test]
    fn test_empty_stats() {
        let stats = compute_stats(&[], Utc::now());
        assert_eq!(
            stats,
            FeedStats {
                total: 0,
                total_votes: 0,
                total_donations: "0.0000".to_string(),
                this_month: 0,
                unique_owners: 0,
                avg_votes: 0.0,
            }
        );
    }

    #[test]
    fn test_stats_aggregate() {
        let now = Utc::now();
        let now_ms = now.timestamp_millis();
        let items = vec![
            ContentItem::new("p1", "0xAAA", now_ms)
                .with_votes(3)
                .with_donations(0.0015),
            ContentItem::new("p2", "0xaaa", now_ms - 40 * 24 * MS_PER_HOUR)
                .with_votes(4)
                .with_donations(0.01),
            ContentItem::new("p3", "0xbbb", now_ms).with_votes(0),
        ];

        let stats = compute_stats(&items, now);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.total_votes, 7);
        assert_eq!(stats.total_donations, "0.0115");
        assert_eq!(stats.this_month, 2);
        assert_eq!(stats.unique_owners, 2);
        assert_eq!(stats.avg_votes, 2.3);
    }

    #[test]
    fn test_single_owner() {
        let now = Utc::now();
        let items: Vec<ContentItem> = (0..5)
            .map(|i| ContentItem::new(format!("p{}", i), "0xsame", now.timestamp_millis()))
            .collect();
        assert_eq!(compute_stats(&items, now).unique_owners, 1);
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let json = serde_json::to_value(compute_stats(&[], Utc::now())).unwrap();
        assert_eq!(json["totalDonations"], "0.0000");
        assert_eq!(json["uniqueOwners"], 0);
        assert_eq!(json["avgVotes"], 0.0);
    }
}
