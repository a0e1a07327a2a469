//! E-commerce API server

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ecommerce_api::auth::TokenKeys;
use ecommerce_api::config::Config;
use ecommerce_api::payments::{PaymentGateway, StripeGateway};
use ecommerce_api::publisher::EventPublisher;
use ecommerce_api::store::{MemoryStore, PgStore, Store};
use ecommerce_api::workflow::{OrderWorkflow, WorkflowSettings};
use ecommerce_api::{api, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = Arc::new(Config::from_env()?);

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(10).connect(url).await.context("connecting to postgres")?;
            sqlx::migrate!("./migrations").run(&db).await.context("running migrations")?;
            Arc::new(PgStore::new(db))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let gateway: Arc<dyn PaymentGateway> = Arc::new(StripeGateway::new(&config.stripe)?);
    let publisher = EventPublisher::connect(config.nats_url.as_deref()).await;
    let workflow = OrderWorkflow::new(store.clone(), gateway, publisher, WorkflowSettings::from(config.as_ref()));

    let state = AppState {
        store,
        workflow: Arc::new(workflow),
        tokens: Arc::new(TokenKeys::new(&config.jwt_secret, config.jwt_ttl)),
        config: config.clone(),
    };

    let app = api::router(state).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    tracing::info!("🚀 E-commerce API listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
