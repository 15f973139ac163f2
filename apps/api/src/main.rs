mod config;
mod cron;
mod db;
mod errors;
mod generation;
mod llm_client;
mod models;
mod reddit;
mod routes;
mod state;
mod sync;

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::reddit::RedditClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::sync::changes::ChangeFeed;
use crate::sync::repository::PgRepository;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting LinkFlow API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (migrations run here)
    let db = create_pool(&config.database_url).await?;

    // Change feed over Redis pub/sub so every instance sees every write
    let redis = redis::Client::open(config.redis_url.clone())?;
    let changes = ChangeFeed::with_redis(redis);
    changes.spawn_relay();
    info!("Change feed relaying through Redis");

    let repo = Arc::new(PgRepository::new(db, changes.clone()));

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let reddit = RedditClient::new(&config.reddit_user_agent, config.reddit_hot_limit)?;
    info!(
        "Reddit client initialized (hot limit: {})",
        config.reddit_hot_limit
    );

    let state = AppState::new(repo, Arc::new(llm), reddit, changes, config.clone());

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the dashboard host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
