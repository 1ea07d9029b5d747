//! Rolling trend statistics over stored data points.
//!
//! Everything here is derived on read; nothing is persisted. The expected
//! point count for a window assumes one data point per hour.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MoodType, SentimentBreakdown, SentimentDataPoint, TrendPeriod};

/// Slack added to the hourly interval before a missing point counts as a gap.
pub const GAP_TOLERANCE_MINUTES: i64 = 10;
/// Net-sentiment delta between adjacent points that counts as a swing.
pub const SWING_THRESHOLD: i64 = 20;

/// A hole in the hourly series, between two stored points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataGap {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub duration_hours: i64,
}

/// A jump in net sentiment (positive minus negative) between adjacent points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentSwing {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub delta: i64,
}

/// Window statistics over `[now - window_hours, now]`.
pub fn calculate(
    points: &[SentimentDataPoint],
    window_hours: i64,
    now: DateTime<Utc>,
) -> TrendPeriod {
    let start = now - Duration::hours(window_hours);
    let mut inside: Vec<SentimentDataPoint> = points
        .iter()
        .filter(|p| p.timestamp >= start && p.timestamp <= now)
        .cloned()
        .collect();
    inside.sort_by_key(|p| p.timestamp);

    let actual = inside.len();
    let expected = window_hours.max(0);
    let average_mood = average_breakdown(&inside);
    let dominant_mood = dominant_mood(&inside);
    let data_completeness = if expected == 0 {
        0.0
    } else {
        ((actual as f64 / expected as f64) * 100.0).round()
    };

    TrendPeriod {
        start_date: start,
        end_date: now,
        average_mood,
        dominant_mood,
        total_data_points: actual as u32,
        missing_hours: expected - actual as i64,
        data_completeness,
        data_points: inside,
    }
}

/// Rounded per-field averages; neutral takes the remainder so the triple keeps
/// summing to 100. No points means all neutral.
fn average_breakdown(points: &[SentimentDataPoint]) -> SentimentBreakdown {
    if points.is_empty() {
        return SentimentBreakdown::neutral();
    }
    let n = points.len() as f64;
    let positive = (points
        .iter()
        .map(|p| p.breakdown.positive as f64)
        .sum::<f64>()
        / n)
        .round() as u32;
    let negative = (points
        .iter()
        .map(|p| p.breakdown.negative as f64)
        .sum::<f64>()
        / n)
        .round() as u32;
    SentimentBreakdown {
        positive,
        neutral: 100u32.saturating_sub(positive + negative),
        negative,
    }
    .normalize()
}

/// Mood with the highest point count; ties go to the mood seen first in
/// chronological order. Empty input is Neutral.
fn dominant_mood(points: &[SentimentDataPoint]) -> MoodType {
    let mut counts: Vec<(MoodType, usize)> = Vec::new();
    for p in points {
        match counts
            .iter_mut()
            .find(|(mood, _)| *mood == p.mood_classification)
        {
            Some((_, count)) => *count += 1,
            None => counts.push((p.mood_classification, 1)),
        }
    }
    let mut best = MoodType::Neutral;
    let mut best_count = 0usize;
    for (mood, count) in counts {
        if count > best_count {
            best = mood;
            best_count = count;
        }
    }
    best
}

/// Adjacent pairs further apart than an hour plus the tolerance.
pub fn detect_gaps(points: &[SentimentDataPoint], tolerance_minutes: i64) -> Vec<DataGap> {
    let mut sorted: Vec<&SentimentDataPoint> = points.iter().collect();
    sorted.sort_by_key(|p| p.timestamp);

    let limit = Duration::hours(1) + Duration::minutes(tolerance_minutes);
    let mut gaps = Vec::new();
    for pair in sorted.windows(2) {
        let delta = pair[1].timestamp - pair[0].timestamp;
        if delta > limit {
            gaps.push(DataGap {
                from: pair[0].timestamp,
                to: pair[1].timestamp,
                duration_hours: delta.num_hours(),
            });
        }
    }
    gaps
}

/// Adjacent pairs whose net sentiment moved by at least `threshold` points.
pub fn detect_swings(points: &[SentimentDataPoint], threshold: i64) -> Vec<SentimentSwing> {
    let mut sorted: Vec<&SentimentDataPoint> = points.iter().collect();
    sorted.sort_by_key(|p| p.timestamp);

    let mut swings = Vec::new();
    for pair in sorted.windows(2) {
        let delta = net_sentiment(&pair[1].breakdown) - net_sentiment(&pair[0].breakdown);
        if delta.abs() >= threshold {
            swings.push(SentimentSwing {
                from: pair[0].timestamp,
                to: pair[1].timestamp,
                delta,
            });
        }
    }
    swings
}

fn net_sentiment(b: &SentimentBreakdown) -> i64 {
    b.positive as i64 - b.negative as i64
}
