//! # Retention store
//!
//! The persisted history is one JSON document: newest-first data points plus
//! a per-source status list. Every append prunes points older than the
//! retention window, so the file never grows past seven days of hourly
//! points. Writes go through a tmp file and a rename; a failed write leaves
//! the previous document intact.

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SourceType;
use crate::types::{FetchStatus, SentimentDataPoint};

pub const ENV_DATA_PATH: &str = "ZORG_DATA_PATH";
pub const DEFAULT_DATA_PATH: &str = "state/sentiment_history.json";

pub const HISTORY_VERSION: &str = "1.0.0";
pub const DEFAULT_RETENTION_DAYS: u32 = 7;
/// History counts as stale when the newest point is older than this.
pub const STALE_AFTER_HOURS: i64 = 24;

/// Last known fetch state per configured source, carried inside the history
/// document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    pub id: String,
    pub name: String,
    pub source_type: SourceType,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fetch_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<FetchStatus>,
}

/// The whole persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentHistory {
    pub version: String,
    pub last_updated: DateTime<Utc>,
    /// Newest first.
    pub data_points: Vec<SentimentDataPoint>,
    pub retention_days: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceStatus>,
}

impl SentimentHistory {
    pub fn empty() -> Self {
        Self {
            version: HISTORY_VERSION.to_string(),
            last_updated: Utc::now(),
            data_points: Vec::new(),
            retention_days: DEFAULT_RETENTION_DAYS,
            sources: Vec::new(),
        }
    }

    /// Newest stored point, if any.
    pub fn current_data_point(&self) -> Option<&SentimentDataPoint> {
        self.data_points.first()
    }

    /// Points with `from <= timestamp <= to`, in stored (newest first) order.
    pub fn data_points_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<&SentimentDataPoint> {
        self.data_points
            .iter()
            .filter(|p| p.timestamp >= from && p.timestamp <= to)
            .collect()
    }

    /// True when there is no data, or the newest point is older than
    /// [`STALE_AFTER_HOURS`].
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.current_data_point() {
            Some(point) => now - point.timestamp > Duration::hours(STALE_AFTER_HOURS),
            None => true,
        }
    }
}

/// Storage backend for the history document. One read at cycle start, one
/// write at cycle end; the API side only reads.
pub trait HistoryStore: Send + Sync {
    fn get_history(&self) -> Result<SentimentHistory>;
    fn put_history(&self, history: &SentimentHistory) -> Result<()>;
}

/// Prepend a fresh point, prune expired ones, refresh source statuses, and
/// persist. The retention cutoff is anchored at the new point's timestamp.
/// Storage failure here is fatal for the cycle.
pub fn append_data_point(
    store: &dyn HistoryStore,
    point: SentimentDataPoint,
) -> Result<SentimentHistory> {
    let mut history = store.get_history()?;

    update_source_statuses(&mut history.sources, &point);
    let cutoff = point.timestamp - Duration::days(i64::from(history.retention_days));
    history.data_points.insert(0, point);
    history.data_points.retain(|p| p.timestamp >= cutoff);
    history.version = HISTORY_VERSION.to_string();
    history.last_updated = Utc::now();

    store.put_history(&history)?;
    Ok(history)
}

fn update_source_statuses(sources: &mut Vec<SourceStatus>, point: &SentimentDataPoint) {
    for contribution in &point.source_contributions {
        match sources.iter_mut().find(|s| s.id == contribution.source_id) {
            Some(status) => {
                status.name = contribution.source_name.clone();
                status.source_type = contribution.source_type;
                status.last_fetch_at = Some(contribution.fetched_at);
                status.last_status = Some(contribution.status);
            }
            None => sources.push(SourceStatus {
                id: contribution.source_id.clone(),
                name: contribution.source_name.clone(),
                source_type: contribution.source_type,
                active: true,
                last_fetch_at: Some(contribution.fetched_at),
                last_status: Some(contribution.status),
            }),
        }
    }
}

/// History document persisted as a single JSON file on local disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path from `ZORG_DATA_PATH`, falling back to `state/sentiment_history.json`.
    pub fn from_env() -> Self {
        let path = std::env::var(ENV_DATA_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_PATH));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonFileStore {
    fn get_history(&self) -> Result<SentimentHistory> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("parsing history file {}", self.path.display())),
            // first run: no file yet
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(SentimentHistory::empty()),
            Err(e) => {
                Err(e).with_context(|| format!("reading history file {}", self.path.display()))
            }
        }
    }

    fn put_history(&self, history: &SentimentHistory) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating history dir {}", parent.display()))?;
            }
        }

        let json = serde_json::to_vec_pretty(history).context("serializing history")?;
        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp)
            .with_context(|| format!("creating tmp history file {}", tmp.display()))?;
        file.write_all(&json).context("writing history")?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing history file {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory backend for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Option<SentimentHistory>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: SentimentHistory) -> Self {
        Self {
            inner: Mutex::new(Some(history)),
        }
    }
}

impl HistoryStore for MemoryStore {
    fn get_history(&self) -> Result<SentimentHistory> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("history mutex poisoned"))?;
        Ok(guard.clone().unwrap_or_else(SentimentHistory::empty))
    }

    fn put_history(&self, history: &SentimentHistory) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("history mutex poisoned"))?;
        *guard = Some(history.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MoodType, SentimentBreakdown, SourceContribution};
    use chrono::TimeZone;

    fn point_at(ts: DateTime<Utc>) -> SentimentDataPoint {
        SentimentDataPoint {
            timestamp: ts,
            collection_duration_ms: 100,
            mood_classification: MoodType::Neutral,
            breakdown: SentimentBreakdown::neutral(),
            summary: "😐 test".to_string(),
            articles_analyzed: 0,
            source: "none".to_string(),
            confidence: Some(0.0),
            errors: None,
            source_contributions: Vec::new(),
            source_diversity: None,
            articles: None,
        }
    }

    fn contribution(id: &str, status: FetchStatus) -> SourceContribution {
        SourceContribution {
            source_id: id.to_string(),
            source_name: id.to_uppercase(),
            source_type: SourceType::Rss,
            articles_collected: 1,
            sentiment_breakdown: SentimentBreakdown::neutral(),
            fetched_at: Utc::now(),
            fetch_duration_ms: 5,
            status,
            error: None,
            engagement_stats: None,
        }
    }

    #[test]
    fn append_prepends_and_prunes_expired_points() {
        let now = Utc.with_ymd_and_hms(2025, 8, 19, 12, 0, 0).unwrap();
        let mut seeded = SentimentHistory::empty();
        seeded.data_points = vec![
            point_at(now - Duration::hours(1)),
            // eight days old, must fall off
            point_at(now - Duration::days(8)),
        ];
        let store = MemoryStore::with_history(seeded);

        let history = append_data_point(&store, point_at(now)).unwrap();

        assert_eq!(history.data_points.len(), 2);
        assert_eq!(history.data_points[0].timestamp, now);
        assert_eq!(history.data_points[1].timestamp, now - Duration::hours(1));
        assert_eq!(store.get_history().unwrap(), history);
    }

    #[test]
    fn append_upserts_source_statuses() {
        let now = Utc.with_ymd_and_hms(2025, 8, 19, 12, 0, 0).unwrap();
        let store = MemoryStore::new();

        let mut first = point_at(now - Duration::hours(1));
        first.source_contributions = vec![contribution("nu-nl", FetchStatus::Success)];
        append_data_point(&store, first).unwrap();

        let mut second = point_at(now);
        second.source_contributions = vec![
            contribution("nu-nl", FetchStatus::Failed),
            contribution("reddit", FetchStatus::Success),
        ];
        let history = append_data_point(&store, second).unwrap();

        assert_eq!(history.sources.len(), 2);
        let nu = history.sources.iter().find(|s| s.id == "nu-nl").unwrap();
        assert_eq!(nu.last_status, Some(FetchStatus::Failed));
        let reddit = history.sources.iter().find(|s| s.id == "reddit").unwrap();
        assert_eq!(reddit.last_status, Some(FetchStatus::Success));
    }

    #[test]
    fn staleness_cutoff_is_twenty_four_hours() {
        let now = Utc.with_ymd_and_hms(2025, 8, 19, 12, 0, 0).unwrap();
        let mut history = SentimentHistory::empty();
        assert!(history.is_stale(now));

        history.data_points = vec![point_at(now - Duration::hours(23))];
        assert!(!history.is_stale(now));

        history.data_points = vec![point_at(now - Duration::hours(25))];
        assert!(history.is_stale(now));
    }

    #[test]
    fn range_filter_is_inclusive() {
        let now = Utc.with_ymd_and_hms(2025, 8, 19, 12, 0, 0).unwrap();
        let mut history = SentimentHistory::empty();
        history.data_points = vec![
            point_at(now),
            point_at(now - Duration::hours(2)),
            point_at(now - Duration::hours(4)),
        ];

        let hits = history.data_points_in_range(now - Duration::hours(2), now);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].timestamp, now);
    }

    #[test]
    fn file_store_round_trips_and_seeds_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("history.json"));

        let seeded = store.get_history().unwrap();
        assert!(seeded.data_points.is_empty());
        assert_eq!(seeded.retention_days, DEFAULT_RETENTION_DAYS);

        let now = Utc.with_ymd_and_hms(2025, 8, 19, 12, 0, 0).unwrap();
        append_data_point(&store, point_at(now)).unwrap();

        let read_back = store.get_history().unwrap();
        assert_eq!(read_back.data_points.len(), 1);
        assert_eq!(read_back.data_points[0].timestamp, now);
        assert_eq!(read_back.version, HISTORY_VERSION);
        // no tmp leftovers after the rename
        assert!(!dir.path().join("history.json.tmp").exists());
    }

    #[test]
    fn file_store_rejects_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::new(path);
        assert!(store.get_history().is_err());
    }
}
