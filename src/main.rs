//! OpenSASE Catalog - Product variation configurator and checkout service

use anyhow::Result;
use opensase_catalog::{api::{self, AppState}, config::AppConfig, service::VariationService, store::PgStore};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = AppConfig::from_env()?;

    let store = PgStore::connect(&config.database, &config.server.public_url).await?;
    store.migrate().await?;

    let mut service = VariationService::new(Arc::new(store), config.storefront.clone(), config.regenerate_debounce);
    if let Some(url) = &config.nats_url {
        match async_nats::connect(url.as_str()).await {
            Ok(client) => service = service.with_nats(client),
            Err(e) => tracing::warn!("NATS unavailable at {}: {}", url, e),
        }
    }

    let app = api::create_router(AppState::new(service));
    let addr = config.server_address();
    tracing::info!("🚀 OpenSASE Catalog listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
