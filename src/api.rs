//! # Read API
//!
//! Thin read-only surface over the history store. Nothing here mutates
//! state; collection happens on the scheduler. Stored points are returned
//! without their article lists except on the drill-down endpoint, which is
//! the one place the full scored articles go out.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::analyzer::SentimentAnalyzer;
use crate::config::{SourceCategory, SourceConfig, SourceType};
use crate::reliability::{self, SourceMetrics};
use crate::store::{HistoryStore, SourceStatus};
use crate::summary;
use crate::trend::{self, DataGap, SentimentSwing};
use crate::types::{
    FetchStatus, MoodType, ScoredArticle, SentimentDataPoint, SourceContribution, TrendPeriod,
};

/// Window for the `include=trend` block.
pub const TREND_WINDOW_HOURS: i64 = 24;
/// History endpoint page cap, one week of hourly points.
const MAX_HISTORY_LIMIT: usize = 168;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn HistoryStore>,
    analyzer: Arc<SentimentAnalyzer>,
    configs: Arc<Vec<SourceConfig>>,
}

impl AppState {
    pub fn new(store: Arc<dyn HistoryStore>, configs: Vec<SourceConfig>) -> Self {
        Self {
            store,
            analyzer: Arc::new(SentimentAnalyzer::new()),
            configs: Arc::new(configs),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sentiment", get(sentiment))
        .route("/api/sentiment/history", get(sentiment_history))
        .route("/api/sentiment/sources", get(sentiment_sources))
        .route("/api/sentiment/articles", get(sentiment_articles))
        .route("/api/analyze", post(analyze))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Error body `{ error, code }` with a matching HTTP status.
struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code,
            message: message.into(),
        }
    }

    fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code,
            message: message.into(),
        }
    }

    fn storage(e: anyhow::Error) -> Self {
        tracing::error!("history store error: {e:#}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "STORAGE_ERROR",
            message: "history store unavailable".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": self.message,
            "code": self.code,
        }));
        (self.status, body).into_response()
    }
}

/// Stored points carry their articles; everything except the drill-down
/// endpoint sends them without.
fn strip_articles(point: &SentimentDataPoint) -> SentimentDataPoint {
    let mut p = point.clone();
    p.articles = None;
    p
}

// --- GET /health ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_age_hours: Option<i64>,
    is_stale: bool,
    sources: Vec<SourceStatus>,
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let history = state.store.get_history().map_err(ApiError::storage)?;
    let now = Utc::now();

    let data_age_hours = history
        .current_data_point()
        .map(|p| (now - p.timestamp).num_hours());
    let is_stale = history.is_stale(now);

    let all_failed = !history.sources.is_empty()
        && history
            .sources
            .iter()
            .all(|s| s.last_status == Some(FetchStatus::Failed));
    let any_failed = history
        .sources
        .iter()
        .any(|s| s.last_status == Some(FetchStatus::Failed));
    let status = if all_failed {
        "unhealthy"
    } else if any_failed || is_stale {
        "degraded"
    } else {
        "healthy"
    };

    Ok(Json(HealthResponse {
        status,
        timestamp: now,
        data_age_hours,
        is_stale,
        sources: history.sources,
    }))
}

// --- GET /api/sentiment ---

#[derive(Deserialize)]
struct SentimentQuery {
    include: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TrendBlock {
    #[serde(flatten)]
    period: TrendPeriod,
    gaps: Vec<DataGap>,
    significant_swings: Vec<SentimentSwing>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryBlock {
    mood: MoodType,
    emoji: &'static str,
    text: String,
    detailed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SentimentResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    current: Option<SentimentDataPoint>,
    is_stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    trend: Option<TrendBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<SummaryBlock>,
}

async fn sentiment(
    State(state): State<AppState>,
    Query(q): Query<SentimentQuery>,
) -> Result<Json<SentimentResponse>, ApiError> {
    let history = state.store.get_history().map_err(ApiError::storage)?;
    let now = Utc::now();

    let include = q.include.as_deref().unwrap_or("");
    let want_trend = matches!(include, "trend" | "all");
    let want_summary = matches!(include, "summary" | "all");

    let current = history.current_data_point().map(strip_articles);
    let is_stale = history.is_stale(now);

    let trend = want_trend.then(|| {
        let mut period = trend::calculate(&history.data_points, TREND_WINDOW_HOURS, now);
        let gaps = trend::detect_gaps(&period.data_points, trend::GAP_TOLERANCE_MINUTES);
        let significant_swings = trend::detect_swings(&period.data_points, trend::SWING_THRESHOLD);
        period.data_points = period.data_points.iter().map(strip_articles).collect();
        TrendBlock {
            period,
            gaps,
            significant_swings,
        }
    });

    let summary = want_summary.then(|| match history.current_data_point() {
        Some(point) => {
            let mood = point.mood_classification;
            let age_hours = (now - point.timestamp).num_hours();
            SummaryBlock {
                mood,
                emoji: summary::emoji(mood),
                text: summary::summary_line(mood, point.timestamp),
                detailed: summary::detailed_line(mood, &point.breakdown, point.timestamp),
                notice: is_stale.then(|| summary::stale_line(age_hours)),
            }
        }
        None => SummaryBlock {
            mood: MoodType::Neutral,
            emoji: summary::emoji(MoodType::Neutral),
            text: summary::no_data_line(),
            detailed: summary::no_data_line(),
            notice: None,
        },
    });

    Ok(Json(SentimentResponse {
        current,
        is_stale,
        trend,
        summary,
    }))
}

// --- GET /api/sentiment/history ---

#[derive(Deserialize)]
struct HistoryQuery {
    from: Option<String>,
    to: Option<String>,
    limit: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    total_points: usize,
    retention_days: u32,
    data_points: Vec<SentimentDataPoint>,
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

async fn sentiment_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let now = Utc::now();

    let to = match q.to.as_deref() {
        Some(raw) => parse_timestamp(raw).ok_or_else(|| {
            ApiError::bad_request(
                "INVALID_TO_PARAMETER",
                format!("`to` is not an RFC 3339 timestamp: {raw}"),
            )
        })?,
        None => now,
    };
    let from = match q.from.as_deref() {
        Some(raw) => parse_timestamp(raw).ok_or_else(|| {
            ApiError::bad_request(
                "INVALID_FROM_PARAMETER",
                format!("`from` is not an RFC 3339 timestamp: {raw}"),
            )
        })?,
        None => to - Duration::days(7),
    };
    if from > to {
        return Err(ApiError::bad_request(
            "INVALID_DATE_RANGE",
            "`from` must not be after `to`",
        ));
    }
    let limit = match q.limit.as_deref() {
        Some(raw) => raw
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=MAX_HISTORY_LIMIT).contains(n))
            .ok_or_else(|| {
                ApiError::bad_request(
                    "INVALID_LIMIT_PARAMETER",
                    format!("`limit` must be an integer between 1 and {MAX_HISTORY_LIMIT}"),
                )
            })?,
        None => MAX_HISTORY_LIMIT,
    };

    let history = state.store.get_history().map_err(ApiError::storage)?;
    let data_points: Vec<SentimentDataPoint> = history
        .data_points_in_range(from, to)
        .into_iter()
        .take(limit)
        .map(strip_articles)
        .collect();

    Ok(Json(HistoryResponse {
        from,
        to,
        total_points: data_points.len(),
        retention_days: history.retention_days,
        data_points,
    }))
}

// --- GET /api/sentiment/sources ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceInfo {
    id: String,
    name: String,
    #[serde(rename = "type")]
    source_type: SourceType,
    category: SourceCategory,
    active: bool,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reliability: Option<SourceMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_contribution: Option<SourceContribution>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourcesResponse {
    timestamp: DateTime<Utc>,
    sources: Vec<SourceInfo>,
}

async fn sentiment_sources(
    State(state): State<AppState>,
) -> Result<Json<SourcesResponse>, ApiError> {
    let history = state.store.get_history().map_err(ApiError::storage)?;
    let mut metrics = reliability::aggregate_from_history(&history);
    let current = history.current_data_point();

    let sources = state
        .configs
        .iter()
        .map(|config| {
            let last_contribution = current
                .and_then(|p| {
                    p.source_contributions
                        .iter()
                        .find(|c| c.source_id == config.id)
                })
                .cloned();
            SourceInfo {
                id: config.id.clone(),
                name: config.name.clone(),
                source_type: config.kind,
                category: config.category,
                active: config.active,
                url: config.url.clone(),
                reliability: metrics.remove(&config.id),
                last_contribution,
            }
        })
        .collect();

    Ok(Json(SourcesResponse {
        timestamp: Utc::now(),
        sources,
    }))
}

// --- GET /api/sentiment/articles ---

#[derive(Deserialize)]
struct ArticlesQuery {
    source: Option<String>,
    limit: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArticlesResponse {
    timestamp: DateTime<Utc>,
    total_articles: usize,
    articles: Vec<ScoredArticle>,
}

async fn sentiment_articles(
    State(state): State<AppState>,
    Query(q): Query<ArticlesQuery>,
) -> Result<Json<ArticlesResponse>, ApiError> {
    let limit = match q.limit.as_deref() {
        Some(raw) => Some(
            raw.parse::<usize>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| {
                    ApiError::bad_request(
                        "INVALID_LIMIT_PARAMETER",
                        "`limit` must be a positive integer",
                    )
                })?,
        ),
        None => None,
    };

    let history = state.store.get_history().map_err(ApiError::storage)?;
    let current = history.current_data_point().ok_or_else(|| {
        ApiError::not_found("NO_DATA_AVAILABLE", "no sentiment data collected yet")
    })?;

    let mut articles: Vec<ScoredArticle> = current
        .articles
        .clone()
        .unwrap_or_default()
        .into_iter()
        .filter(|a| {
            q.source
                .as_ref()
                .map_or(true, |wanted| &a.article.source_id == wanted)
        })
        .collect();
    if let Some(limit) = limit {
        articles.truncate(limit);
    }

    Ok(Json(ArticlesResponse {
        timestamp: current.timestamp,
        total_articles: articles.len(),
        articles,
    }))
}

// --- POST /api/analyze ---

#[derive(Deserialize)]
struct AnalyzeRequest {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    score: i32,
    comparative: f64,
    positive_words: Vec<String>,
    negative_words: Vec<String>,
}

async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequest>,
) -> Json<AnalyzeResponse> {
    let analysis = state.analyzer.analyze(&body.text);
    Json(AnalyzeResponse {
        score: analysis.score,
        comparative: analysis.comparative,
        positive_words: analysis.positive,
        negative_words: analysis.negative,
    })
}
