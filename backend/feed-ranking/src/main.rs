use anyhow::Context;
use pawfeed_ranking::{
    config::{LogFormat, TelemetryConfig},
    models::Impressions,
    open_store,
    utils::SystemClock,
    Config, ContentCache, FeedEngine,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = Config::from_env().context("Failed to load config")?;

    init_tracing(&config.telemetry);

    info!(
        backend = ?config.store.backend,
        page_size = config.feed.page_size,
        max_consecutive = config.feed.max_consecutive,
        "Starting pawfeed-ranking"
    );

    let store = open_store(&config.store).context("Failed to open content store")?;
    let cache = Arc::new(ContentCache::new(store.clone(), Arc::new(SystemClock)));
    cache
        .refresh()
        .await
        .context("Failed to load content items")?;

    let engine = FeedEngine::new(config.feed.clone());

    // Keep the cache in step with the store
    let syncing = {
        let cache = cache.clone();
        let events = store.subscribe();
        tokio::spawn(async move { cache.sync(events).await })
    };

    let mut changes = cache.changes();
    publish_feed(&engine, &cache).await;

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    warn!("Content cache dropped, stopping");
                    break;
                }
                publish_feed(&engine, &cache).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    syncing.abort();
    Ok(())
}

/// Re-rank the current snapshot and log the head of every view.
async fn publish_feed(engine: &FeedEngine, cache: &ContentCache) {
    let items = cache.snapshot().await;

    let for_you = engine.for_you(&items, &Impressions::new());
    let trending = engine.trending(&items, None);
    let stats = engine.stats(&items);

    info!(
        total = stats.total,
        total_votes = stats.total_votes,
        unique_owners = stats.unique_owners,
        this_month = stats.this_month,
        "Feed stats"
    );

    for (position, scored) in for_you.iter().enumerate() {
        info!(
            position,
            item_id = %scored.item.id,
            owner = %scored.item.owner_id,
            feed_score = scored.feed_score,
            "for-you"
        );
    }

    if let Some(hottest) = trending.first() {
        info!(
            item_id = %hottest.item.id,
            velocity = hottest.velocity,
            "Trending leader"
        );
    }
}

fn init_tracing(config: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init(),
    }
}
