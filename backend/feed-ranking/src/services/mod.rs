pub mod diversity;
pub mod feed;
pub mod ranking;
pub mod selectors;
pub mod stats;

pub use diversity::DiversityLayer;
pub use feed::FeedEngine;
pub use ranking::{FeedScorer, RankingLayer};
pub use selectors::TopVotedOptions;
pub use stats::FeedStats;
