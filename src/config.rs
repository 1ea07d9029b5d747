//! # Source configuration
//!
//! Declarative list of collection sources, loaded from TOML.
//!
//! - Loads from `config/sources.toml` (override via `ZORG_SOURCES_PATH`).
//! - Falls back to a built-in `default_seed()` when no file exists.
//! - Reddit keyword filters live in `config/reddit_keywords.toml`
//!   (override via `ZORG_KEYWORDS_PATH`).
//! - Reliability snapshots are injected at runtime, never read from disk.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

// --- env names & defaults ---
pub const ENV_SOURCES_PATH: &str = "ZORG_SOURCES_PATH";
pub const DEFAULT_SOURCES_PATH: &str = "config/sources.toml";
pub const ENV_KEYWORDS_PATH: &str = "ZORG_KEYWORDS_PATH";
pub const DEFAULT_KEYWORDS_PATH: &str = "config/reddit_keywords.toml";

/// Closed set of supported source kinds. Adding a kind means adding an
/// adapter, so this stays an enum rather than a free-form string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    Rss,
    SocialReddit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceCategory {
    General,
    HealthcareSpecific,
}

/// Reddit listing time window, passed through to the listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Hour,
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Hour => "hour",
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
            TimeWindow::Month => "month",
            TimeWindow::Year => "year",
            TimeWindow::All => "all",
        }
    }
}

/// Rolling reliability figures for one source, computed from stored history
/// and handed to the analyzer as a weighting input for the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReliabilitySnapshot {
    /// 0-100, share of successful fetches over the retention window.
    pub success_rate: f64,
    pub avg_response_time_ms: f64,
    pub consecutive_failures: u32,
    pub is_healthy: bool,
    pub is_inactive: bool,
}

/// Reddit-specific fetch parameters. All fields have sane defaults so a TOML
/// entry only needs the subreddit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditParams {
    pub subreddit: String,
    #[serde(default = "default_time_window")]
    pub time_window: TimeWindow,
    /// Minimum post score (upvotes) for the quality filter.
    #[serde(default = "default_min_score")]
    pub min_score: u32,
    /// Minimum comment count for the quality filter.
    #[serde(default = "default_min_comments")]
    pub min_comments: u32,
    #[serde(default = "default_max_posts")]
    pub max_posts: u32,
    #[serde(default = "default_true")]
    pub include_comments: bool,
    #[serde(default = "default_top_comments_count")]
    pub top_comments_count: u32,
    #[serde(default = "default_min_upvote_ratio")]
    pub min_upvote_ratio: f64,
    /// Analysis text is truncated to this many characters.
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,
}

impl Default for RedditParams {
    fn default() -> Self {
        Self {
            subreddit: String::new(),
            time_window: default_time_window(),
            min_score: default_min_score(),
            min_comments: default_min_comments(),
            max_posts: default_max_posts(),
            include_comments: true,
            top_comments_count: default_top_comments_count(),
            min_upvote_ratio: default_min_upvote_ratio(),
            max_content_length: default_max_content_length(),
        }
    }
}

fn default_time_window() -> TimeWindow {
    TimeWindow::Day
}

fn default_min_score() -> u32 {
    10
}

fn default_min_comments() -> u32 {
    5
}

fn default_max_posts() -> u32 {
    25
}

fn default_top_comments_count() -> u32 {
    5
}

fn default_min_upvote_ratio() -> f64 {
    0.4
}

fn default_max_content_length() -> usize {
    2000
}

/// One configured source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: SourceType,
    #[serde(default = "default_category")]
    pub category: SourceCategory,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Hard cap on articles taken from this source per cycle, applied before
    /// deduplication.
    #[serde(default = "default_max_articles")]
    pub max_articles: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub reddit: Option<RedditParams>,
    /// Runtime-only; populated from stored history before each cycle.
    #[serde(skip)]
    pub reliability: Option<ReliabilitySnapshot>,
}

fn default_category() -> SourceCategory {
    SourceCategory::General
}

fn default_true() -> bool {
    true
}

fn default_priority() -> u32 {
    1
}

fn default_max_articles() -> u32 {
    30
}

fn default_timeout_secs() -> u64 {
    10
}

/// Root of `config/sources.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub sources: Vec<SourceConfig>,
}

impl SourcesConfig {
    /// Resolve the configured path and load, falling back to the seed list
    /// when the file is missing or malformed.
    pub fn load() -> Self {
        let path = std::env::var(ENV_SOURCES_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SOURCES_PATH));
        Self::load_from_file(&path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(s) => match toml::from_str::<Self>(&s) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        path = %path.display(),
                        "invalid sources config, using built-in seed"
                    );
                    Self::default_seed()
                }
            },
            Err(_) => {
                tracing::debug!(
                    path = %path.display(),
                    "no sources config file, using built-in seed"
                );
                Self::default_seed()
            }
        }
    }

    /// Built-in seed: one Dutch health-news feed and one Dutch subreddit.
    pub(crate) fn default_seed() -> Self {
        Self {
            sources: vec![
                SourceConfig {
                    id: "nu-nl-gezondheid".to_string(),
                    name: "NU.nl Gezondheid".to_string(),
                    url: "https://www.nu.nl/rss/Gezondheid".to_string(),
                    kind: SourceType::Rss,
                    category: SourceCategory::General,
                    active: true,
                    priority: 1,
                    max_articles: 30,
                    timeout_secs: 10,
                    reddit: None,
                    reliability: None,
                },
                SourceConfig {
                    id: "reddit-thenetherlands".to_string(),
                    name: "r/thenetherlands".to_string(),
                    url: "https://oauth.reddit.com/r/thenetherlands".to_string(),
                    kind: SourceType::SocialReddit,
                    category: SourceCategory::General,
                    active: true,
                    priority: 2,
                    max_articles: 25,
                    timeout_secs: 15,
                    reddit: Some(RedditParams {
                        subreddit: "thenetherlands".to_string(),
                        ..RedditParams::default()
                    }),
                    reliability: None,
                },
            ],
        }
    }

    /// Sources that take part in a collection cycle, in configuration order.
    pub fn active(&self) -> Vec<SourceConfig> {
        self.sources.iter().filter(|s| s.active).cloned().collect()
    }
}

/// Keyword lists driving the Reddit relevance filter.
///
/// A post is relevant when its weighted keyword score reaches `min_score`:
/// primary terms count 3, insurer names 2, secondary terms 1. With the
/// default threshold of 3 a single primary hit is enough on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditKeywords {
    #[serde(default)]
    pub primary: Vec<String>,
    #[serde(default)]
    pub secondary: Vec<String>,
    #[serde(default)]
    pub insurers: Vec<String>,
    #[serde(default = "default_min_keyword_score")]
    pub min_score: u32,
}

fn default_min_keyword_score() -> u32 {
    3
}

impl RedditKeywords {
    pub fn load() -> Self {
        let path = std::env::var(ENV_KEYWORDS_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_KEYWORDS_PATH));
        Self::load_from_file(&path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(path.as_ref()) {
            Ok(s) => toml::from_str(&s).unwrap_or_else(|e| {
                tracing::warn!(
                    error = %e,
                    path = %path.as_ref().display(),
                    "invalid keyword config, using built-in seed"
                );
                Self::default_seed()
            }),
            Err(_) => Self::default_seed(),
        }
    }

    pub(crate) fn default_seed() -> Self {
        Self {
            primary: [
                "zorgverzekering",
                "zorgverzekeraar",
                "zorgpremie",
                "eigen risico",
                "basisverzekering",
                "aanvullende verzekering",
                "zorgtoeslag",
                "premieverhoging",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            secondary: [
                "premie",
                "verzekering",
                "zorg",
                "zorgkosten",
                "huisarts",
                "ziekenhuis",
                "apotheek",
                "medicijn",
                "tandarts",
                "fysiotherapie",
                "vergoeding",
                "declaratie",
                "polis",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            insurers: [
                "cz",
                "vgz",
                "menzis",
                "zilveren kruis",
                "achmea",
                "dsw",
                "asr",
                "ohra",
                "anderzorg",
                "unive",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_score: default_min_keyword_score(),
        }
    }

    /// Weighted keyword score over the lowercased text.
    pub fn relevance_score(&self, text: &str) -> u32 {
        let t = text.to_lowercase();
        let mut score = 0u32;
        for k in &self.primary {
            if t.contains(k.as_str()) {
                score += 3;
            }
        }
        for k in &self.insurers {
            if t.contains(k.as_str()) {
                score += 2;
            }
        }
        for k in &self.secondary {
            if t.contains(k.as_str()) {
                score += 1;
            }
        }
        score
    }

    pub fn is_relevant(&self, text: &str) -> bool {
        self.relevance_score(text) >= self.min_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> SourcesConfig {
        SourcesConfig::default_seed()
    }

    #[test]
    fn seed_contains_rss_and_reddit() {
        let cfg = seed();
        assert_eq!(cfg.sources.len(), 2);
        assert_eq!(cfg.sources[0].kind, SourceType::Rss);
        assert_eq!(cfg.sources[1].kind, SourceType::SocialReddit);
        assert!(cfg.sources[1].reddit.is_some());
    }

    #[test]
    fn active_filters_disabled_sources() {
        let mut cfg = seed();
        cfg.sources[1].active = false;
        let active = cfg.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "nu-nl-gezondheid");
    }

    #[test]
    fn parses_minimal_toml_entry_with_defaults() {
        let toml_str = r#"
            [[sources]]
            id = "test-feed"
            name = "Test Feed"
            url = "https://example.com/rss"
            type = "RSS"
        "#;
        let cfg: SourcesConfig = toml::from_str(toml_str).unwrap();
        let s = &cfg.sources[0];
        assert!(s.active);
        assert_eq!(s.max_articles, 30);
        assert_eq!(s.timeout_secs, 10);
        assert_eq!(s.priority, 1);
        assert_eq!(s.category, SourceCategory::General);
        assert!(s.reliability.is_none());
    }

    #[test]
    fn parses_reddit_entry_with_partial_params() {
        let toml_str = r#"
            [[sources]]
            id = "reddit-test"
            name = "r/test"
            url = "https://oauth.reddit.com/r/test"
            type = "SOCIAL_REDDIT"

            [sources.reddit]
            subreddit = "test"
            min_score = 25
        "#;
        let cfg: SourcesConfig = toml::from_str(toml_str).unwrap();
        let reddit = cfg.sources[0].reddit.as_ref().unwrap();
        assert_eq!(reddit.subreddit, "test");
        assert_eq!(reddit.min_score, 25);
        assert_eq!(reddit.time_window, TimeWindow::Day);
        assert_eq!(reddit.max_content_length, 2000);
        assert!((reddit.min_upvote_ratio - 0.4).abs() < 1e-9);
    }

    #[test]
    fn source_type_serializes_screaming_snake() {
        assert_eq!(serde_json::to_string(&SourceType::Rss).unwrap(), "\"RSS\"");
        assert_eq!(
            serde_json::to_string(&SourceType::SocialReddit).unwrap(),
            "\"SOCIAL_REDDIT\""
        );
    }

    #[test]
    fn keyword_score_weighs_primary_over_secondary() {
        let kw = RedditKeywords::default_seed();
        // one primary hit is enough
        assert!(kw.is_relevant("Het eigen risico gaat volgend jaar omhoog"));
        // insurer + secondary also clears the threshold
        assert!(kw.is_relevant("CZ heeft mijn declaratie afgewezen"));
        // a single secondary hit does not
        assert!(!kw.is_relevant("De premie speelt geen rol hier"));
        // unrelated text scores zero
        assert_eq!(kw.relevance_score("Het weer is mooi vandaag"), 0);
    }

    #[test]
    fn missing_file_falls_back_to_seed() {
        let cfg = SourcesConfig::load_from_file("does/not/exist.toml");
        assert_eq!(cfg, seed());
    }
}
