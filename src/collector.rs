//! # The hourly collection cycle
//!
//! One cycle: read history for reliability snapshots, fan out to the sources,
//! score the unique articles, aggregate into a data point, append it to the
//! store. Everything short of the storage write degrades instead of failing;
//! a storage error is the one condition that makes the cycle itself fail.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use metrics::{gauge, histogram};
use tokio::task::JoinHandle;

use crate::aggregator;
use crate::analyzer::SentimentAnalyzer;
use crate::config::{SourceConfig, SourcesConfig};
use crate::orchestrator::{self, CollectionOutcome};
use crate::sources::AdapterRegistry;
use crate::store::{self, HistoryStore};
use crate::types::{ScoredArticle, SentimentDataPoint};

pub const ENV_COLLECT_INTERVAL_SECS: &str = "ZORG_COLLECT_INTERVAL_SECS";
pub const DEFAULT_COLLECT_INTERVAL_SECS: u64 = 3600;

/// Collection interval from `ZORG_COLLECT_INTERVAL_SECS`, hourly by default.
pub fn collect_interval_secs() -> u64 {
    std::env::var(ENV_COLLECT_INTERVAL_SECS)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_COLLECT_INTERVAL_SECS)
}

/// Run one collection cycle and persist the resulting data point.
pub async fn run_cycle(
    registry: Arc<AdapterRegistry>,
    sources: &[SourceConfig],
    store: &dyn HistoryStore,
) -> Result<SentimentDataPoint> {
    let started = Instant::now();
    let now = Utc::now();

    // last cycles' reliability feeds this cycle's source weights
    let history = store
        .get_history()
        .context("loading history before the cycle")?;
    let snapshots = crate::reliability::snapshots_from_history(&history);
    let mut configs: Vec<SourceConfig> = sources.to_vec();
    for config in configs.iter_mut() {
        config.reliability = snapshots.get(&config.id).cloned();
    }

    let CollectionOutcome {
        articles,
        contributions,
        diversity,
        duplicates_removed,
        absorbed,
        total_duration_ms: _,
    } = orchestrator::collect_from_sources(registry, &configs).await;

    let analyzer = SentimentAnalyzer::new();
    let by_id: HashMap<&str, &SourceConfig> =
        configs.iter().map(|c| (c.id.as_str(), c)).collect();
    let scored: Vec<ScoredArticle> = articles
        .into_iter()
        .map(|article| {
            let reliability = by_id
                .get(article.source_id.as_str())
                .and_then(|c| c.reliability.as_ref());
            let deduplicated = absorbed.contains(&article.deduplication_hash);
            analyzer.score_article(article, reliability, deduplicated, now)
        })
        .collect();

    let duration_ms = started.elapsed().as_millis() as u64;
    let point = aggregator::build_data_point(now, duration_ms, scored, contributions, diversity);

    store::append_data_point(store, point.clone()).context("persisting data point")?;

    histogram!("collect_cycle_ms").record(duration_ms as f64);
    gauge!("collect_last_run_ts").set(now.timestamp() as f64);
    tracing::info!(
        mood = ?point.mood_classification,
        articles = point.articles_analyzed,
        duplicates_removed,
        confidence = point.confidence.unwrap_or(0.0),
        duration_ms,
        "collection cycle stored"
    );

    Ok(point)
}

/// Spawn the periodic collector. Source configs are re-read from disk on
/// every tick, so edits to `config/sources.toml` apply without a restart.
/// Per-cycle errors are logged and absorbed; the loop never exits.
pub fn spawn_scheduler(
    registry: Arc<AdapterRegistry>,
    store: Arc<dyn HistoryStore>,
) -> JoinHandle<()> {
    let interval_secs = collect_interval_secs();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        tracing::info!(interval_secs, "collection scheduler started");
        loop {
            ticker.tick().await;
            let sources = SourcesConfig::load();
            if let Err(e) = run_cycle(Arc::clone(&registry), &sources.sources, store.as_ref()).await
            {
                tracing::warn!("collection tick failed: {e:#}");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[serial_test::serial]
    #[test]
    fn interval_comes_from_env_with_hourly_default() {
        std::env::remove_var(ENV_COLLECT_INTERVAL_SECS);
        assert_eq!(collect_interval_secs(), 3600);

        std::env::set_var(ENV_COLLECT_INTERVAL_SECS, "900");
        assert_eq!(collect_interval_secs(), 900);

        std::env::set_var(ENV_COLLECT_INTERVAL_SECS, "not-a-number");
        assert_eq!(collect_interval_secs(), 3600);

        std::env::remove_var(ENV_COLLECT_INTERVAL_SECS);
    }
}
