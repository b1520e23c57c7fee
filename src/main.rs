//! slotmarket server entry point.
//!
//! Starts the Axum HTTP server with REST, webhook and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use slotmarket::api;
use slotmarket::app_state::AppState;
use slotmarket::config::MarketConfig;
use slotmarket::gateway::{MockGateway, PaymentGateway, StripeGateway};
use slotmarket::persistence::{MemoryStore, PostgresStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MarketConfig::from_env().map_err(|e| anyhow::anyhow!("configuration: {e}"))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(addr = %config.listen_addr, "starting slotmarket");

    let store: Arc<dyn Store> = if config.database_url.is_some() {
        let pg = PostgresStore::connect(&config)
            .await
            .context("connecting to PostgreSQL")?;
        if config.run_migrations {
            pg.migrate(&config.migrations_dir)
                .await
                .context("applying migrations")?;
        }
        Arc::new(pg)
    } else {
        tracing::warn!("DATABASE_URL not set, using the in-memory store");
        Arc::new(MemoryStore::new())
    };

    let gateway: Arc<dyn PaymentGateway> = match &config.stripe_secret_key {
        Some(key) => Arc::new(StripeGateway::new(config.stripe_api_base.clone(), key.clone())),
        None => {
            tracing::warn!("STRIPE_SECRET_KEY not set, using the offline mock gateway");
            Arc::new(MockGateway::new())
        }
    };
    if config.webhook_secret.is_empty() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET is empty, every webhook will be rejected");
    }

    let app_state = AppState::build(&config, store, gateway);
    let app = api::build_app(app_state, Duration::from_secs(config.request_timeout_secs));

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
