//! Zorg Sentiment Collector — Binary Entrypoint
//! Boots the hourly collection scheduler and the Axum read API.
//!
//! See `README.md` for quickstart and configuration.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use zorg_sentiment_collector::api::{self, AppState};
use zorg_sentiment_collector::collector;
use zorg_sentiment_collector::config::{RedditKeywords, SourcesConfig};
use zorg_sentiment_collector::metrics::Metrics;
use zorg_sentiment_collector::sources::AdapterRegistry;
use zorg_sentiment_collector::store::{HistoryStore, JsonFileStore};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("zorg_sentiment_collector=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the vars come from the environment.
    let _ = dotenvy::dotenv();
    init_tracing();

    let metrics = Metrics::init();

    let sources = SourcesConfig::load();
    let keywords = RedditKeywords::load();
    let registry = Arc::new(AdapterRegistry::new(keywords));
    let store: Arc<dyn HistoryStore> = Arc::new(JsonFileStore::from_env());

    collector::spawn_scheduler(Arc::clone(&registry), Arc::clone(&store));

    let state = AppState::new(Arc::clone(&store), sources.sources.clone());
    let router = api::create_router(state).merge(metrics.router());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "zorg sentiment collector listening");

    axum::serve(listener, router).await?;
    Ok(())
}
