/// Ranking Module
///
/// Composite feed scoring for the "for you" feed.
///
/// # Signals
/// - **Engagement** (40 pts): votes per impression, capped at 1
/// - **Recency** (30 pts): linear decay to a 10% floor over 48 hours
/// - **Velocity** (20 pts): votes per hour, capped at 10/h
/// - **Quality** (10 pts): external image analyzer score, default 0.5
///
/// # Workflow
/// 1. Capture `now` once for the whole pass
/// 2. Score every item with [`FeedScorer`]
/// 3. Stable sort by descending score in [`RankingLayer`]
/// 4. Hand the sorted sequence to the diversity layer
pub mod layer;
pub mod scorer;

pub use layer::RankingLayer;
pub use scorer::{FeedScorer, ScoreBreakdown};
