//! # Collection orchestrator
//!
//! Fans out one fetch task per active source, waits for every task to
//! settle, and folds the results back in configuration order. A failing
//! adapter becomes a failed `SourceContribution`; it never aborts the cycle
//! or disturbs the other sources. Cross-source deduplication runs over the
//! merged list, so the first source in configuration order keeps the story.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use tokio::task::JoinSet;

use crate::config::SourceConfig;
use crate::dedup;
use crate::sources::AdapterRegistry;
use crate::types::{
    Article, EngagementMetrics, EngagementStats, FetchStatus, SentimentBreakdown,
    SourceContribution, SourceDiversity,
};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "collect_articles_total",
            "Articles parsed out of source payloads."
        );
        describe_counter!(
            "collect_kept_total",
            "Unique articles kept after deduplication."
        );
        describe_counter!(
            "collect_dedup_total",
            "Articles removed as cross-source duplicates."
        );
        describe_counter!(
            "collect_source_errors_total",
            "Source fetches that ended in a failed contribution."
        );
        describe_counter!("collect_retry_total", "Transient fetch retries.");
        describe_counter!(
            "collect_posts_rejected_total",
            "Social posts rejected by the filter gates."
        );
        describe_histogram!("collect_parse_ms", "Feed parse time in milliseconds.");
        describe_histogram!("collect_cycle_ms", "Full collection cycle duration.");
        describe_gauge!(
            "collect_last_run_ts",
            "Unix ts when a collection cycle last completed."
        );
    });
}

/// Everything one fan-out pass produces, pre-scoring.
#[derive(Debug)]
pub struct CollectionOutcome {
    /// Deduplicated articles, configuration order preserved.
    pub articles: Vec<Article>,
    /// One contribution per active source, configuration order.
    pub contributions: Vec<SourceContribution>,
    pub diversity: SourceDiversity,
    pub duplicates_removed: u32,
    /// Fingerprints of survivors that absorbed a duplicate.
    pub absorbed: HashSet<String>,
    /// Fetch fan-out plus deduplication, wall clock.
    pub total_duration_ms: u64,
}

/// Fetch all active sources concurrently and merge the results.
pub async fn collect_from_sources(
    registry: Arc<AdapterRegistry>,
    sources: &[SourceConfig],
) -> CollectionOutcome {
    ensure_metrics_described();
    let t0 = Instant::now();

    let active: Vec<SourceConfig> = sources.iter().filter(|s| s.active).cloned().collect();

    let mut set = JoinSet::new();
    for (idx, source) in active.iter().enumerate() {
        let registry = Arc::clone(&registry);
        let source = source.clone();
        set.spawn(async move {
            let pair = fetch_one(registry.as_ref(), &source).await;
            (idx, pair)
        });
    }

    let mut slots: Vec<Option<(SourceContribution, Vec<Article>)>> =
        active.iter().map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, pair)) => slots[idx] = Some(pair),
            Err(e) => tracing::error!(error = ?e, "source fetch task aborted"),
        }
    }

    let mut contributions = Vec::with_capacity(active.len());
    let mut merged: Vec<Article> = Vec::new();
    for (idx, slot) in slots.into_iter().enumerate() {
        match slot {
            Some((contribution, articles)) => {
                contributions.push(contribution);
                merged.extend(articles);
            }
            // the task never reported back (panic); record it as failed
            None => {
                counter!("collect_source_errors_total").increment(1);
                contributions.push(failed_contribution(
                    &active[idx],
                    "source task aborted before completion",
                    0,
                ));
            }
        }
    }

    let dedup_outcome = dedup::dedup_articles(merged);
    counter!("collect_kept_total").increment(dedup_outcome.unique.len() as u64);
    counter!("collect_dedup_total").increment(dedup_outcome.duplicates_removed as u64);

    let failed = contributions
        .iter()
        .filter(|c| c.status == FetchStatus::Failed)
        .count() as u32;
    let diversity = SourceDiversity {
        total_sources: active.len() as u32,
        active_sources: active.len() as u32 - failed,
        failed_sources: failed,
    };

    let total_duration_ms = t0.elapsed().as_millis() as u64;
    tracing::info!(
        sources = active.len(),
        failed,
        unique_articles = dedup_outcome.unique.len(),
        duplicates_removed = dedup_outcome.duplicates_removed,
        duration_ms = total_duration_ms,
        "collection pass finished"
    );

    CollectionOutcome {
        articles: dedup_outcome.unique,
        contributions,
        diversity,
        duplicates_removed: dedup_outcome.duplicates_removed,
        absorbed: dedup_outcome.absorbed,
        total_duration_ms,
    }
}

/// Fetch a single source through its adapter, isolating any error into a
/// failed contribution.
async fn fetch_one(
    registry: &AdapterRegistry,
    source: &SourceConfig,
) -> (SourceContribution, Vec<Article>) {
    let fetched_at = Utc::now();
    let t0 = Instant::now();

    let result = match registry.adapter_for(source.kind) {
        Some(adapter) => adapter.fetch_articles(source).await,
        None => Err(anyhow!("no adapter registered for {:?}", source.kind)),
    };
    let duration_ms = t0.elapsed().as_millis() as u64;

    match result {
        Ok(articles) => {
            let status = if articles.is_empty() {
                FetchStatus::Partial
            } else {
                FetchStatus::Success
            };
            let contribution = SourceContribution {
                source_id: source.id.clone(),
                source_name: source.name.clone(),
                source_type: source.kind,
                articles_collected: articles.len() as u32,
                sentiment_breakdown: SentimentBreakdown::neutral(),
                fetched_at,
                fetch_duration_ms: duration_ms,
                status,
                error: None,
                engagement_stats: engagement_stats(&articles),
            };
            (contribution, articles)
        }
        Err(e) => {
            tracing::warn!(error = ?e, source = %source.id, adapter = ?source.kind, "source fetch failed");
            counter!("collect_source_errors_total").increment(1);
            (
                failed_contribution(source, &format!("{e:#}"), duration_ms),
                Vec::new(),
            )
        }
    }
}

fn failed_contribution(source: &SourceConfig, error: &str, duration_ms: u64) -> SourceContribution {
    SourceContribution {
        source_id: source.id.clone(),
        source_name: source.name.clone(),
        source_type: source.kind,
        articles_collected: 0,
        sentiment_breakdown: SentimentBreakdown::neutral(),
        fetched_at: Utc::now(),
        fetch_duration_ms: duration_ms,
        status: FetchStatus::Failed,
        error: Some(error.to_string()),
        engagement_stats: None,
    }
}

/// Average engagement over the articles that carry metrics, None when none do.
fn engagement_stats(articles: &[Article]) -> Option<EngagementStats> {
    let metrics: Vec<&EngagementMetrics> = articles
        .iter()
        .filter_map(|a| a.engagement_metrics.as_ref())
        .collect();
    if metrics.is_empty() {
        return None;
    }
    let n = metrics.len() as f64;
    let avg_upvotes = metrics.iter().map(|m| m.likes.unwrap_or(0) as f64).sum::<f64>() / n;
    let avg_comments = metrics
        .iter()
        .map(|m| m.comments.unwrap_or(0) as f64)
        .sum::<f64>()
        / n;
    Some(EngagementStats {
        avg_upvotes,
        avg_comments,
    })
}
