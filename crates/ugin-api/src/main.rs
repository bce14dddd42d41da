//! ugin API Server
//!
//! Stores are PostgreSQL when `DATABASE_URL` is set, in-memory otherwise.

use anyhow::Context;
use std::sync::Arc;
use ugin_api::{create_router, state::AppState};
use ugin_core::config::{AppConfig, LoggingConfig};
use ugin_core::{AccountStore, PostStore};
use ugin_store::{InMemoryAccountStore, InMemoryPostStore, PgAccountStore, PgPostStore};

fn init_tracing(logging: &LoggingConfig) {
    let level = &logging.level;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("ugin_api={level},ugin_store={level},tower_http={level},audit=info").into()
    });

    if logging.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var("UGIN_CONFIG") {
        Ok(path) => AppConfig::from_file(&path)
            .and_then(AppConfig::with_env_override)
            .with_context(|| format!("loading configuration from {path}"))?,
        Err(_) => AppConfig::from_env().context("loading configuration from environment")?,
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.logging);

    let (posts, accounts): (Arc<dyn PostStore>, Arc<dyn AccountStore>) =
        match config.database.url.as_deref() {
            Some(url) => {
                let pool = ugin_store::connect(url, &config.database).await?;
                ugin_store::init_schema(&pool).await?;
                tracing::info!(pool_size = config.database.pool_size, "Connected to PostgreSQL");
                (
                    Arc::new(PgPostStore::new(pool.clone())),
                    Arc::new(PgAccountStore::new(pool)),
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory stores (data is not persisted)");
                (
                    Arc::new(InMemoryPostStore::new()),
                    Arc::new(InMemoryAccountStore::new()),
                )
            }
        };

    if config.admin.accounts.is_empty() {
        tracing::warn!("No admin accounts configured, /admin/dashboard will reject every request");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, posts, accounts));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("ugin API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
