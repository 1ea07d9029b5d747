// tests/metrics_endpoint.rs
//
// Prometheus wiring: the recorder installs, a collection cycle records its
// series, and /metrics renders them in exposition format.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt as _;

use zorg_sentiment_collector::collector::run_cycle;
use zorg_sentiment_collector::config::{SourceCategory, SourceConfig, SourceType};
use zorg_sentiment_collector::metrics::Metrics;
use zorg_sentiment_collector::sources::{AdapterRegistry, SourceAdapter};
use zorg_sentiment_collector::store::MemoryStore;
use zorg_sentiment_collector::types::Article;

// axum::body::to_bytes requires an explicit limit
const BODY_LIMIT: usize = 1_048_576;

/// Always reachable, never has anything to say.
struct EmptyFeed;

#[async_trait]
impl SourceAdapter for EmptyFeed {
    async fn fetch_articles(&self, _source: &SourceConfig) -> Result<Vec<Article>> {
        Ok(Vec::new())
    }

    fn validate_config(&self, _source: &SourceConfig) -> Result<()> {
        Ok(())
    }

    fn supports(&self, kind: SourceType) -> bool {
        kind == SourceType::Rss
    }

    fn name(&self) -> &'static str {
        "empty-feed"
    }
}

fn stub_source() -> SourceConfig {
    SourceConfig {
        id: "stub-rss".to_string(),
        name: "Stub feed".to_string(),
        url: "https://example.test/rss".to_string(),
        kind: SourceType::Rss,
        category: SourceCategory::General,
        active: true,
        priority: 1,
        max_articles: 30,
        timeout_secs: 5,
        reddit: None,
        reliability: None,
    }
}

// Single test in this file: the recorder installs process-wide and
// Metrics::init must only run once.
#[tokio::test]
async fn metrics_endpoint_exposes_cycle_series() {
    let metrics = Metrics::init();

    let registry = Arc::new(AdapterRegistry::with_adapters(vec![Box::new(EmptyFeed)]));
    let store = MemoryStore::new();
    run_cycle(registry, &[stub_source()], &store)
        .await
        .expect("empty cycle should still store a point");

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    for needle in [
        "collect_interval_secs",
        "collect_cycle_ms",
        "collect_last_run_ts",
        "collect_kept_total",
        "collect_dedup_total",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
}
