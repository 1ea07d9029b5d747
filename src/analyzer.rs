//! # Sentiment analyzer
//!
//! Lexicon scoring plus the weighting pipeline that turns a fetched article
//! into a `ScoredArticle`:
//!
//! - token score with one-token-back negation ("niet goed" counts negative),
//! - comparative = score / token count, clamped to [-1, 1],
//! - recency weight: exponential decay towards a 0.5 floor,
//! - source weight: reliability ladder (unknown 1.0, inactive 0.5,
//!   unhealthy 0.7, healthy scales with success rate),
//! - final weighted score = raw × recency × source,
//! - contribution percentages assigned batch-wide in a second pass.
//!
//! Mood classification and confidence live here too since both read the
//! same percentage breakdowns.

use chrono::{DateTime, Utc};

use crate::config::ReliabilitySnapshot;
use crate::lexicon;
use crate::types::{Article, MoodType, ScoredArticle, SentimentBreakdown};

/// Half-life of the recency decay curve, in hours.
const RECENCY_HALF_LIFE_HOURS: f64 = 24.0;

/// Outcome of lexicon scoring over one text.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// Summed polarity of matched terms, negation applied.
    pub score: i32,
    /// Score divided by total token count, 0.0 for empty text.
    pub comparative: f64,
    /// Matched terms that counted positive (post-negation).
    pub positive: Vec<String>,
    /// Matched terms that counted negative (post-negation).
    pub negative: Vec<String>,
}

impl Analysis {
    pub fn sentiment_word_count(&self) -> usize {
        self.positive.len() + self.negative.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Score a Dutch text against the lexicon. A negator token inverts only
    /// the polarity of the token immediately after it.
    pub fn analyze(&self, text: &str) -> Analysis {
        let tokens: Vec<String> = lexicon::tokenize(text).collect();
        let mut score: i32 = 0;
        let mut positive = Vec::new();
        let mut negative = Vec::new();

        for i in 0..tokens.len() {
            let base = lexicon::polarity(tokens[i].as_str());
            if base == 0 {
                continue;
            }
            let negated = i >= 1 && lexicon::is_negator(tokens[i - 1].as_str());
            let adj = if negated { -base } else { base };
            score += adj;
            if adj > 0 {
                positive.push(tokens[i].clone());
            } else {
                negative.push(tokens[i].clone());
            }
        }

        let comparative = if tokens.is_empty() {
            0.0
        } else {
            score as f64 / tokens.len() as f64
        };

        Analysis {
            score,
            comparative,
            positive,
            negative,
        }
    }

    /// Turn one deduplicated article into a `ScoredArticle`. The contribution
    /// percentage stays 0 until `assign_contributions` runs over the batch.
    pub fn score_article(
        &self,
        article: Article,
        reliability: Option<&ReliabilitySnapshot>,
        deduplicated: bool,
        now: DateTime<Utc>,
    ) -> ScoredArticle {
        let analysis = self.analyze(&article.content);
        let raw = analysis.comparative.clamp(-1.0, 1.0);
        let recency = recency_weight(article.pub_date, now);
        let source_w = source_weight(reliability);
        let id = article_id(&article);

        ScoredArticle {
            id,
            raw_sentiment_score: raw,
            positive_words: analysis.positive,
            negative_words: analysis.negative,
            recency_weight: recency,
            source_weight: source_w,
            final_weighted_score: raw * recency * source_w,
            contribution_percentage: 0.0,
            deduplicated,
            article,
        }
    }
}

/// Stable article id: source id plus a fingerprint prefix.
fn article_id(article: &Article) -> String {
    let prefix = article
        .deduplication_hash
        .get(..8)
        .unwrap_or(&article.deduplication_hash);
    format!("{}-{}", article.source_id, prefix)
}

/// Freshness factor: 1.0 at publication time, exponential decay towards an
/// asymptote of 0.5. Future-dated articles count as age zero.
pub fn recency_weight(pub_date: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    recency_weight_with_half_life(pub_date, now, RECENCY_HALF_LIFE_HOURS)
}

pub fn recency_weight_with_half_life(
    pub_date: DateTime<Utc>,
    now: DateTime<Utc>,
    half_life_hours: f64,
) -> f64 {
    let age_ms = (now - pub_date).num_milliseconds().max(0);
    let age_hours = age_ms as f64 / 3_600_000.0;
    let w = 0.5 + 0.5 * (-age_hours / half_life_hours).exp();
    w.clamp(0.5, 1.0)
}

/// Reliability ladder. Sources without history get full weight; a source
/// marked inactive is floored rather than dropped so it can recover.
pub fn source_weight(reliability: Option<&ReliabilitySnapshot>) -> f64 {
    let Some(r) = reliability else {
        return 1.0;
    };
    if r.is_inactive {
        return 0.5;
    }
    if !r.is_healthy {
        return 0.7;
    }
    let w = 0.8 + (r.success_rate / 100.0) * 0.2;
    w.clamp(0.5, 1.0)
}

/// Second pass over a scored batch: each article's share of the total
/// absolute weighted impact, split evenly when the batch nets out to zero.
pub fn assign_contributions(articles: &mut [ScoredArticle]) {
    if articles.is_empty() {
        return;
    }
    let total: f64 = articles
        .iter()
        .map(|a| a.final_weighted_score.abs())
        .sum();
    if total == 0.0 {
        let share = 100.0 / articles.len() as f64;
        for a in articles.iter_mut() {
            a.contribution_percentage = share;
        }
        return;
    }
    for a in articles.iter_mut() {
        a.contribution_percentage = a.final_weighted_score.abs() / total * 100.0;
    }
}

/// Fixed-threshold mood label for a percentage breakdown. Mixed requires a
/// positive lead of at least 40 that exceeds the negative share; a negative
/// lean below 60 classifies neutral.
pub fn classify_mood(b: &SentimentBreakdown) -> MoodType {
    if b.positive >= 60 {
        return MoodType::Positive;
    }
    if b.negative >= 60 {
        return MoodType::Negative;
    }
    if b.positive >= 40 && b.positive > b.negative {
        return MoodType::Mixed;
    }
    MoodType::Neutral
}

/// Confidence in a cycle's breakdown: matched-word volume (up to 0.5),
/// article volume (up to 0.3) and breakdown clarity (up to 0.2).
pub fn confidence(
    sentiment_words: usize,
    article_count: usize,
    breakdown: &SentimentBreakdown,
) -> f64 {
    let word_part = (sentiment_words as f64 / 50.0).min(0.5);
    let volume_part = (article_count as f64 / 20.0).min(0.3);
    let spread = (breakdown.positive as f64 - breakdown.negative as f64).abs();
    let clarity_part = spread / 100.0 * 0.2;
    (word_part + volume_part + clarity_part).min(1.0)
}
