pub mod cache;
pub mod config;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use cache::ContentCache;
pub use config::Config;
pub use services::{DiversityLayer, FeedEngine, FeedScorer, RankingLayer, TopVotedOptions};
pub use store::{open_store, ContentStore, MemoryContentStore, RedisContentStore, StoreError, StoreEvent};
