//! types.rs — wire and storage data model for the collection pipeline.
//!
//! Field names serialize in camelCase: stored history files and API payloads
//! share these shapes, and downstream consumers read them verbatim. Breakdown
//! percentages are 0-100 integers that always sum to exactly 100.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SourceType;

/// Categorical mood label derived from a breakdown via fixed thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoodType {
    Positive,
    Negative,
    Mixed,
    Neutral,
}

/// A {positive, neutral, negative} percentage triple summing to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentBreakdown {
    pub positive: u32,
    pub neutral: u32,
    pub negative: u32,
}

impl SentimentBreakdown {
    /// All-neutral breakdown, used when a cycle collects nothing.
    pub fn neutral() -> Self {
        Self {
            positive: 0,
            neutral: 100,
            negative: 0,
        }
    }

    pub fn sum(&self) -> u32 {
        self.positive + self.neutral + self.negative
    }

    /// Repair rounding drift so the triple sums to exactly 100. Components are
    /// rescaled proportionally and the residual goes to the largest one.
    pub fn normalize(self) -> Self {
        let sum = self.sum();
        if sum == 100 {
            return self;
        }
        if sum == 0 {
            return Self::neutral();
        }

        let factor = 100.0 / sum as f64;
        let mut out = Self {
            positive: (self.positive as f64 * factor).round() as u32,
            neutral: (self.neutral as f64 * factor).round() as u32,
            negative: (self.negative as f64 * factor).round() as u32,
        };

        let new_sum = out.sum() as i64;
        let diff = 100 - new_sum;
        if diff != 0 {
            if out.positive >= out.neutral && out.positive >= out.negative {
                out.positive = (out.positive as i64 + diff) as u32;
            } else if out.neutral >= out.negative {
                out.neutral = (out.neutral as i64 + diff) as u32;
            } else {
                out.negative = (out.negative as i64 + diff) as u32;
            }
        }
        out
    }
}

/// Engagement counters carried by social-source articles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EngagementMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upvote_ratio: Option<f64>,
}

/// Unified article representation from any source type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    pub description: String,
    /// Full text used for sentiment analysis (title+description for RSS,
    /// post body plus top comments for social sources).
    pub content: String,
    pub link: String,
    pub pub_date: DateTime<Utc>,
    /// References SourceConfig.id.
    pub source_id: String,
    /// SHA-256 hex over normalized title+text, exact-duplicate short-circuit.
    pub deduplication_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_metrics: Option<EngagementMetrics>,
}

/// Article plus its per-cycle sentiment analysis. Created once per collection
/// cycle; only `contribution_percentage` is filled in later, in a second pass
/// once the batch total impact is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredArticle {
    #[serde(flatten)]
    pub article: Article,
    /// `{source_id}-{hash prefix}`, stable across re-runs of the same input.
    pub id: String,
    /// Comparative lexicon score clamped into [-1.0, 1.0].
    pub raw_sentiment_score: f64,
    pub positive_words: Vec<String>,
    pub negative_words: Vec<String>,
    /// Exponential-decay freshness factor, always within [0.5, 1.0].
    pub recency_weight: f64,
    /// Reliability-derived source factor, always within [0.5, 1.0].
    pub source_weight: f64,
    /// raw_sentiment_score * recency_weight * source_weight.
    pub final_weighted_score: f64,
    /// Share of the batch's total absolute weighted impact, 0-100.
    pub contribution_percentage: f64,
    pub deduplicated: bool,
}

/// Outcome of one source's fetch within a collection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Success,
    /// Fetch succeeded but produced zero articles.
    Partial,
    Failed,
}

/// Averaged engagement over one source's articles in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementStats {
    pub avg_upvotes: f64,
    pub avg_comments: f64,
}

/// Per-source summary of one collection cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceContribution {
    pub source_id: String,
    pub source_name: String,
    pub source_type: SourceType,
    pub articles_collected: u32,
    pub sentiment_breakdown: SentimentBreakdown,
    pub fetched_at: DateTime<Utc>,
    pub fetch_duration_ms: u64,
    pub status: FetchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_stats: Option<EngagementStats>,
}

/// How many sources were attempted, answered, and failed in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDiversity {
    pub total_sources: u32,
    pub active_sources: u32,
    pub failed_sources: u32,
}

/// The unit of persisted history: one hourly measurement of overall sentiment.
/// Immutable once stored; the retention store prunes points older than the
/// retention window on every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentDataPoint {
    pub timestamp: DateTime<Utc>,
    pub collection_duration_ms: u64,
    pub mood_classification: MoodType,
    pub breakdown: SentimentBreakdown,
    /// Human-readable Dutch summary line.
    pub summary: String,
    pub articles_analyzed: u32,
    /// Source label: the contributing source ids, comma separated.
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_contributions: Vec<SourceContribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_diversity: Option<SourceDiversity>,
    /// Per-article drill-down, kept for the articles endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub articles: Option<Vec<ScoredArticle>>,
}

/// Derived (never stored) rolling-window statistics over data points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPeriod {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Points inside the window, ordered chronologically (oldest first).
    pub data_points: Vec<SentimentDataPoint>,
    pub average_mood: SentimentBreakdown,
    pub dominant_mood: MoodType,
    pub total_data_points: u32,
    pub missing_hours: i64,
    /// 0-100, actual points over expected points.
    pub data_completeness: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_keeps_exact_sum_untouched() {
        let b = SentimentBreakdown {
            positive: 40,
            neutral: 35,
            negative: 25,
        };
        assert_eq!(b.normalize(), b);
    }

    #[test]
    fn normalize_rescales_and_fixes_rounding_on_largest() {
        let b = SentimentBreakdown {
            positive: 33,
            neutral: 33,
            negative: 33,
        }
        .normalize();
        assert_eq!(b.sum(), 100);
        // the residual point lands on the largest (first in tie order)
        assert_eq!(b.positive, 34);
        assert_eq!(b.neutral, 33);
        assert_eq!(b.negative, 33);
    }

    #[test]
    fn normalize_zero_sum_falls_back_to_all_neutral() {
        let b = SentimentBreakdown {
            positive: 0,
            neutral: 0,
            negative: 0,
        }
        .normalize();
        assert_eq!(b, SentimentBreakdown::neutral());
    }

    #[test]
    fn mood_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&MoodType::Positive).unwrap(),
            "\"positive\""
        );
        assert_eq!(serde_json::to_string(&MoodType::Mixed).unwrap(), "\"mixed\"");
    }

    #[test]
    fn data_point_roundtrips_through_json() {
        let point = SentimentDataPoint {
            timestamp: Utc::now(),
            collection_duration_ms: 1234,
            mood_classification: MoodType::Neutral,
            breakdown: SentimentBreakdown::neutral(),
            summary: "De stemming over zorg is neutraal".to_string(),
            articles_analyzed: 0,
            source: "nu-nl-gezondheid".to_string(),
            confidence: Some(0.0),
            errors: None,
            source_contributions: Vec::new(),
            source_diversity: None,
            articles: None,
        };
        let json = serde_json::to_string(&point).unwrap();
        let back: SentimentDataPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, point);
        // wire contract: camelCase field names
        assert!(json.contains("\"moodClassification\""));
        assert!(json.contains("\"articlesAnalyzed\""));
        assert!(json.contains("\"collectionDurationMs\""));
    }
}
