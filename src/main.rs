use std::sync::Arc;

use bookworm_api::{
    config::{Config, StorageBackend},
    db::{
        create_pool, create_redis_client, run_migrations, Cache, CatalogStore, InMemoryStore,
        PgCatalogStore,
    },
    routes::{create_router, AppState},
    services::auth::AuthSettings,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bookworm_api=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn CatalogStore> = match config.storage {
        StorageBackend::Postgres => {
            let pool = create_pool(&config.database_url).await?;
            run_migrations(&pool).await?;
            tracing::info!("Connected to PostgreSQL");
            Arc::new(PgCatalogStore::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on shutdown");
            Arc::new(InMemoryStore::new())
        }
    };

    let (cache, cache_handle) = match &config.redis_url {
        Some(url) => match Cache::connect(create_redis_client(url)?).await {
            Ok((cache, handle)) => {
                tracing::info!("Redis caching enabled");
                (Some(cache), Some(handle))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable; running without a cache");
                (None, None)
            }
        },
        None => (None, None),
    };

    let state = AppState::new(store, cache, AuthSettings::from_config(&config));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!(address = %config.bind_address(), "Server listening");

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
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
