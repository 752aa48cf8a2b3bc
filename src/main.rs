//! Chaleur Commerce - storefront and back-office API

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chaleur_commerce::routes::{self, AppState};
use chaleur_commerce::store::PgProductStore;
use chaleur_commerce::{Config, StockService};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!("NATS unavailable, events disabled: {e}");
                None
            }
        },
        None => None,
    };
    if !config.admin_auth_enabled() {
        tracing::warn!("ADMIN_TOKEN not set, back-office routes are open");
    }

    let stock = Arc::new(StockService::new(PgProductStore::new(db.clone())));
    let state = AppState { db, stock, nats, config: config.clone() };
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!("chaleur-commerce listening on 0.0.0.0:{}", config.port);
    axum::serve(listener, app).await?;
    Ok(())
}
