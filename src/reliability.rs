//! Source reliability, folded out of stored contributions.
//!
//! The history document is already pruned to the retention window, so one
//! fold over all of it covers exactly the last seven days. Contributions are
//! folded oldest to newest: a success resets the consecutive-failure counter,
//! a partial fetch (empty but working) resets it too without counting as a
//! success.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ReliabilitySnapshot;
use crate::store::SentimentHistory;
use crate::types::FetchStatus;

/// Success rate at or above this marks a source healthy.
pub const HEALTHY_SUCCESS_RATE: f64 = 90.0;
/// Consecutive failures at or above this mark a source inactive (72 hourly
/// cycles, three days of silence).
pub const INACTIVE_FAILURE_THRESHOLD: u32 = 72;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetrics {
    /// 0-100, one decimal.
    pub success_rate: f64,
    /// Mean fetch duration over successful fetches, whole milliseconds.
    pub avg_response_time_ms: f64,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<DateTime<Utc>>,
    pub is_healthy: bool,
    pub is_inactive: bool,
}

impl SourceMetrics {
    /// The slice of this that feeds `source_weight` on the next cycle.
    pub fn snapshot(&self) -> ReliabilitySnapshot {
        ReliabilitySnapshot {
            success_rate: self.success_rate,
            avg_response_time_ms: self.avg_response_time_ms,
            consecutive_failures: self.consecutive_failures,
            is_healthy: self.is_healthy,
            is_inactive: self.is_inactive,
        }
    }
}

#[derive(Debug, Default)]
struct Accum {
    total: u32,
    successes: u32,
    consecutive_failures: u32,
    response_total_ms: f64,
    response_samples: u32,
    last_success_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
}

impl Accum {
    fn finish(self) -> SourceMetrics {
        let success_rate = if self.total == 0 {
            0.0
        } else {
            round1(f64::from(self.successes) / f64::from(self.total) * 100.0)
        };
        let avg_response_time_ms = if self.response_samples == 0 {
            0.0
        } else {
            (self.response_total_ms / f64::from(self.response_samples)).round()
        };
        SourceMetrics {
            success_rate,
            avg_response_time_ms,
            consecutive_failures: self.consecutive_failures,
            last_success_at: self.last_success_at,
            last_failure_at: self.last_failure_at,
            is_healthy: success_rate >= HEALTHY_SUCCESS_RATE,
            is_inactive: self.consecutive_failures >= INACTIVE_FAILURE_THRESHOLD,
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Per-source reliability over everything the history still retains.
pub fn aggregate_from_history(history: &SentimentHistory) -> HashMap<String, SourceMetrics> {
    let mut accums: HashMap<String, Accum> = HashMap::new();

    // stored newest first; fold oldest first so the consecutive counter ends
    // on the present
    for point in history.data_points.iter().rev() {
        for contribution in &point.source_contributions {
            let acc = accums.entry(contribution.source_id.clone()).or_default();
            acc.total += 1;
            match contribution.status {
                FetchStatus::Success => {
                    acc.successes += 1;
                    acc.consecutive_failures = 0;
                    acc.last_success_at = Some(contribution.fetched_at);
                    acc.response_total_ms += contribution.fetch_duration_ms as f64;
                    acc.response_samples += 1;
                }
                FetchStatus::Partial => {
                    acc.consecutive_failures = 0;
                }
                FetchStatus::Failed => {
                    acc.consecutive_failures += 1;
                    acc.last_failure_at = Some(contribution.fetched_at);
                }
            }
        }
    }

    accums
        .into_iter()
        .map(|(id, acc)| (id, acc.finish()))
        .collect()
}

/// Snapshots keyed by source id, for injection into the next cycle's configs.
pub fn snapshots_from_history(history: &SentimentHistory) -> HashMap<String, ReliabilitySnapshot> {
    aggregate_from_history(history)
        .into_iter()
        .map(|(id, metrics)| (id, metrics.snapshot()))
        .collect()
}
