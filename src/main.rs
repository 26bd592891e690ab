use std::sync::Arc;

use tasting_api::{
    config::{Config, StoreBackend},
    db::{self, Cache, CacheWriterHandle, MemoryStore, PgStore, TasteStore},
    observability::{Observer, TracingObserver},
    routes::{create_router, AppState},
    services::RecommendationService,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tasting_api=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn TasteStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = db::create_pool(&config.database_url).await?;
            db::run_migrations(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    tracing::info!(backend = store.name(), "Taste store ready");

    let (cache, cache_handle): (Option<Cache>, Option<CacheWriterHandle>) =
        match &config.redis_url {
            Some(url) => {
                let client = db::create_redis_client(url)?;
                let (cache, handle) = Cache::new(client).await;
                (Some(cache), Some(handle))
            }
            None => {
                tracing::info!("REDIS_URL not set, recommendation caching disabled");
                (None, None)
            }
        };

    let observer: Arc<dyn Observer> = Arc::new(TracingObserver);
    tracing::info!(observer = observer.name(), "Recommendation events enabled");

    let service = RecommendationService::new(
        store,
        observer,
        cache,
        config.recommendation_cache_ttl,
    );

    let addr = format!("{}:{}", config.host, config.port);
    let app = create_router(Arc::new(AppState::new(service, config)));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_handle {
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
