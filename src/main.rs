use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cinelist_api::{
    api::{create_router, AppState},
    config::Config,
    db::{self, SharedTier, TieredCache, TtlPolicy},
    services::{
        collections::{CollectionStore, InMemoryCollectionStore, PgCollectionStore},
        providers::TmdbProvider,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cinelist_api=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let provider = TmdbProvider::new(
        config.tmdb_api_token.clone(),
        config.tmdb_api_url.clone(),
        config.catalog_language.clone(),
        config.catalog_timeout(),
    )
    .context("Failed to build catalog HTTP client")?;

    let mut cache = TieredCache::new(
        config.cache_capacity,
        TtlPolicy::new(config.short_ttl(), config.long_ttl()),
    );
    let mut cache_writer = None;
    if let Some(redis_url) = &config.redis_url {
        let client = db::create_redis_client(redis_url)?;
        let (shared, handle) = SharedTier::connect(client)
            .await
            .context("Failed to connect to Redis")?;
        cache = cache.with_shared_tier(shared);
        cache_writer = Some(handle);
        tracing::info!("Shared Redis cache tier enabled");
    }

    let collections: Arc<dyn CollectionStore> = match &config.database_url {
        Some(database_url) => {
            let pool = db::create_pool(database_url).await?;
            db::postgres::run_migrations(&pool).await?;
            Arc::new(PgCollectionStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, collections are kept in memory");
            Arc::new(InMemoryCollectionStore::new())
        }
    };

    let state = AppState::new(Arc::new(provider), collections, Arc::new(cache));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!(address = %config.bind_address(), "Server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
