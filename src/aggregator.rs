//! # Hourly aggregation
//!
//! Folds one cycle's scored articles into a single `SentimentDataPoint`:
//! bucket counts become a percentage breakdown, the breakdown becomes a mood,
//! and per-source breakdowns are written back onto the contributions.

use chrono::{DateTime, Utc};

use crate::analyzer;
use crate::summary;
use crate::types::{
    ScoredArticle, SentimentBreakdown, SentimentDataPoint, SourceContribution, SourceDiversity,
};

/// Raw comparative score above which an article counts as positive.
const POSITIVE_CUTOFF: f64 = 0.2;
/// Below this it counts as negative; the band in between is neutral.
const NEGATIVE_CUTOFF: f64 = -0.2;

/// Percentage breakdown over a batch of scored articles. Empty batch is all
/// neutral.
pub fn breakdown_for(articles: &[ScoredArticle]) -> SentimentBreakdown {
    let mut positive = 0usize;
    let mut negative = 0usize;
    for a in articles {
        if a.raw_sentiment_score > POSITIVE_CUTOFF {
            positive += 1;
        } else if a.raw_sentiment_score < NEGATIVE_CUTOFF {
            negative += 1;
        }
    }
    breakdown_from_counts(positive, negative, articles.len())
}

fn breakdown_from_counts(positive: usize, negative: usize, total: usize) -> SentimentBreakdown {
    if total == 0 {
        return SentimentBreakdown::neutral();
    }
    let pos = percentage(positive, total);
    let neg = percentage(negative, total);
    SentimentBreakdown {
        positive: pos,
        neutral: 100u32.saturating_sub(pos + neg),
        negative: neg,
    }
    .normalize()
}

fn percentage(count: usize, total: usize) -> u32 {
    ((count as f64 / total as f64) * 100.0).round() as u32
}

/// Recompute each contribution's breakdown from the articles that survived
/// deduplication for that source.
pub fn apply_source_breakdowns(
    contributions: &mut [SourceContribution],
    articles: &[ScoredArticle],
) {
    for contribution in contributions.iter_mut() {
        let mut positive = 0usize;
        let mut negative = 0usize;
        let mut total = 0usize;
        for a in articles
            .iter()
            .filter(|a| a.article.source_id == contribution.source_id)
        {
            total += 1;
            if a.raw_sentiment_score > POSITIVE_CUTOFF {
                positive += 1;
            } else if a.raw_sentiment_score < NEGATIVE_CUTOFF {
                negative += 1;
            }
        }
        contribution.sentiment_breakdown = breakdown_from_counts(positive, negative, total);
    }
}

/// Total matched lexicon words across the batch, feeds the confidence score.
pub fn total_sentiment_words(articles: &[ScoredArticle]) -> usize {
    articles
        .iter()
        .map(|a| a.positive_words.len() + a.negative_words.len())
        .sum()
}

/// Comma-joined ids of the sources that actually contributed articles.
pub fn source_label(contributions: &[SourceContribution]) -> String {
    let ids: Vec<&str> = contributions
        .iter()
        .filter(|c| c.articles_collected > 0)
        .map(|c| c.source_id.as_str())
        .collect();
    if ids.is_empty() {
        "none".to_string()
    } else {
        ids.join(", ")
    }
}

/// Assemble the persisted data point for one collection cycle. Also runs the
/// second scoring pass (contribution percentages) and fills the per-source
/// breakdowns, so callers hand over ownership of both vectors.
pub fn build_data_point(
    timestamp: DateTime<Utc>,
    collection_duration_ms: u64,
    mut scored: Vec<ScoredArticle>,
    mut contributions: Vec<SourceContribution>,
    diversity: SourceDiversity,
) -> SentimentDataPoint {
    analyzer::assign_contributions(&mut scored);
    apply_source_breakdowns(&mut contributions, &scored);

    let breakdown = breakdown_for(&scored);
    let mood = analyzer::classify_mood(&breakdown);
    let words = total_sentiment_words(&scored);
    let confidence = analyzer::confidence(words, scored.len(), &breakdown);
    let summary = if scored.is_empty() {
        summary::no_data_line()
    } else {
        summary::detailed_line(mood, &breakdown, timestamp)
    };

    let errors: Vec<String> = contributions
        .iter()
        .filter_map(|c| {
            c.error
                .as_ref()
                .map(|e| format!("{}: {}", c.source_id, e))
        })
        .collect();

    SentimentDataPoint {
        timestamp,
        collection_duration_ms,
        mood_classification: mood,
        breakdown,
        summary,
        articles_analyzed: scored.len() as u32,
        source: source_label(&contributions),
        confidence: Some(confidence),
        errors: (!errors.is_empty()).then_some(errors),
        source_contributions: contributions,
        source_diversity: Some(diversity),
        articles: Some(scored),
    }
}
