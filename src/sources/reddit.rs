//! Reddit adapter (client-credentials OAuth).
//!
//! Fetches top posts from a configured subreddit, keeps the ones that talk
//! about Dutch healthcare insurance, and enriches them with their top
//! comments. Posts pass four gates before scoring: keyword relevance,
//! engagement quality (score or comment count), upvote ratio, and a Dutch
//! language check. Rejection counts per gate are logged every cycle.
//!
//! Bearer tokens are cached and refreshed 60 seconds before expiry.
//! 401/403/404 are permanent errors; network failures, 5xx and 429 retry on
//! fixed 1s/2s/4s steps before the last error propagates.

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::{RedditKeywords, RedditParams, SourceConfig, SourceType};
use crate::dedup;
use crate::sources::{normalize_text, validate_common, SourceAdapter};
use crate::types::{Article, EngagementMetrics};

pub const ENV_REDDIT_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_REDDIT_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const ENV_REDDIT_USER_AGENT: &str = "REDDIT_USER_AGENT";

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const DEFAULT_USER_AGENT: &str = "zorg-sentiment-collector/0.1 (healthcare sentiment monitor)";
const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];
/// Refresh the cached token this long before Reddit expires it.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
/// Comments shorter than this carry too little signal to score.
const MIN_COMMENT_CHARS: usize = 50;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct Listing<T> {
    data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
struct ListingData<T> {
    children: Vec<Thing<T>>,
}

#[derive(Debug, Deserialize)]
struct Thing<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct PostData {
    id: String,
    title: Option<String>,
    selftext: Option<String>,
    author: Option<String>,
    permalink: Option<String>,
    created_utc: Option<f64>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: i64,
    upvote_ratio: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CommentData {
    body: Option<String>,
}

struct Credentials {
    client_id: String,
    client_secret: String,
    user_agent: String,
}

fn credentials() -> Result<Credentials> {
    let client_id = std::env::var(ENV_REDDIT_CLIENT_ID)
        .ok()
        .filter(|v| !v.is_empty())
        .context("REDDIT_CLIENT_ID not set")?;
    let client_secret = std::env::var(ENV_REDDIT_CLIENT_SECRET)
        .ok()
        .filter(|v| !v.is_empty())
        .context("REDDIT_CLIENT_SECRET not set")?;
    let user_agent =
        std::env::var(ENV_REDDIT_USER_AGENT).unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());
    Ok(Credentials {
        client_id,
        client_secret,
        user_agent,
    })
}

struct BearerToken {
    access_token: String,
    expires_at: Instant,
}

impl BearerToken {
    fn valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Per-cycle rejection tally for the post filter gates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct FilterStats {
    relevance: u32,
    quality: u32,
    ratio: u32,
    language: u32,
}

impl FilterStats {
    fn total(&self) -> u32 {
        self.relevance + self.quality + self.ratio + self.language
    }
}

pub struct RedditAdapter {
    client: reqwest::Client,
    keywords: RedditKeywords,
    token: Mutex<Option<BearerToken>>,
}

impl RedditAdapter {
    pub fn new(keywords: RedditKeywords) -> Self {
        Self {
            client: reqwest::Client::new(),
            keywords,
            token: Mutex::new(None),
        }
    }

    /// Cached bearer token, exchanged anew when missing or near expiry.
    async fn bearer_token(&self, creds: &Credentials) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(tok) = guard.as_ref() {
            if tok.valid() {
                return Ok(tok.access_token.clone());
            }
        }

        let resp = self
            .client
            .post(TOKEN_URL)
            .header(reqwest::header::USER_AGENT, &creds.user_agent)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context("reddit token exchange request")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("reddit token exchange failed with status {}", status);
        }
        let token: TokenResponse = resp.json().await.context("parsing reddit token response")?;

        let lifetime = Duration::from_secs(token.expires_in)
            .saturating_sub(TOKEN_EXPIRY_MARGIN);
        let fresh = BearerToken {
            access_token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        };
        *guard = Some(fresh);
        Ok(token.access_token)
    }

    /// Authorized GET with the fixed retry ladder. 401/403/404 and other 4xx
    /// fail immediately; transient failures retry until the steps run out.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        token: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<T> {
        let mut last_err: Option<anyhow::Error> = None;

        // initial attempt plus one retry per delay step
        for attempt in 0..=RETRY_DELAYS.len() {
            if attempt > 0 {
                tokio::time::sleep(RETRY_DELAYS[attempt - 1]).await;
            }

            let resp = match self
                .client
                .get(url)
                .header(reqwest::header::AUTHORIZATION, format!("Bearer {token}"))
                .header(reqwest::header::USER_AGENT, user_agent)
                .query(query)
                .timeout(timeout)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = ?e, url, attempt, "reddit request failed");
                    counter!("collect_retry_total").increment(1);
                    last_err = Some(anyhow::Error::new(e).context("reddit request"));
                    continue;
                }
            };

            let status = resp.status();
            if status.is_success() {
                return resp.json::<T>().await.context("parsing reddit response");
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                tracing::warn!(url, attempt, "reddit rate limited");
                counter!("collect_retry_total").increment(1);
                last_err = Some(anyhow::anyhow!("reddit rate limited (429)"));
                continue;
            }
            if status.is_client_error() {
                // 401/403/404 and friends: auth or configuration problems
                bail!("reddit returned permanent error {}", status);
            }
            tracing::warn!(status = %status, url, attempt, "reddit server error");
            counter!("collect_retry_total").increment(1);
            last_err = Some(anyhow::anyhow!("reddit server error {}", status));
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("reddit request failed")))
    }

    /// Apply the four filter gates in order, tallying rejections per gate.
    fn filter_posts(&self, posts: Vec<PostData>, params: &RedditParams) -> (Vec<PostData>, FilterStats) {
        let mut stats = FilterStats::default();
        let mut kept = Vec::with_capacity(posts.len());

        for post in posts {
            let title = post.title.as_deref().unwrap_or_default();
            let body = post.selftext.as_deref().unwrap_or_default();
            let text = format!("{} {}", title, body);

            if !self.keywords.is_relevant(&text) {
                stats.relevance += 1;
                continue;
            }
            let score_ok = post.score >= params.min_score as i64;
            let comments_ok = post.num_comments >= params.min_comments as i64;
            if !score_ok && !comments_ok {
                stats.quality += 1;
                continue;
            }
            if post.upvote_ratio.unwrap_or(1.0) < params.min_upvote_ratio {
                stats.ratio += 1;
                continue;
            }
            if !is_dutch(&text) {
                stats.language += 1;
                continue;
            }
            kept.push(post);
        }

        (kept, stats)
    }

    /// Top-level comments for one post, filtered down to substantial ones.
    /// Comment failures degrade to an empty list; the post still counts.
    async fn top_comments(
        &self,
        base_url: &str,
        post_id: &str,
        params: &RedditParams,
        token: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Vec<String> {
        let url = format!("{}/comments/{}", base_url.trim_end_matches('/'), post_id);
        let query = [
            ("sort", "top".to_string()),
            ("depth", "1".to_string()),
            ("limit", (params.top_comments_count * 2).to_string()),
        ];

        // the comments endpoint answers [post listing, comment listing]
        let parsed: Result<(serde_json::Value, Listing<CommentData>)> = self
            .get_json(&url, &query, token, user_agent, timeout)
            .await;

        match parsed {
            Ok((_, comments)) => comments
                .data
                .children
                .into_iter()
                .filter_map(|c| c.data.body)
                .filter(|b| {
                    b.chars().count() >= MIN_COMMENT_CHARS
                        && b != "[deleted]"
                        && b != "[removed]"
                })
                .take(params.top_comments_count as usize)
                .map(|b| normalize_text(&b))
                .collect(),
            Err(e) => {
                tracing::warn!(error = ?e, post_id, "comment fetch failed, continuing without");
                Vec::new()
            }
        }
    }

    fn build_article(
        &self,
        post: PostData,
        comments: Vec<String>,
        params: &RedditParams,
        source_id: &str,
        now: DateTime<Utc>,
    ) -> Option<Article> {
        let title = normalize_text(post.title.as_deref().unwrap_or_default());
        if title.is_empty() {
            return None;
        }
        let body = normalize_text(post.selftext.as_deref().unwrap_or_default());
        // link posts have no selftext; fall back to the title as the body
        let body = if body.is_empty() { title.clone() } else { body };

        let mut parts = vec![title.clone()];
        if body != title {
            parts.push(body.clone());
        }
        parts.extend(comments);
        let content = truncate_chars(&parts.join(" "), params.max_content_length);

        let post_url = post
            .permalink
            .as_deref()
            .map(|p| format!("https://www.reddit.com{}", p));
        let pub_date = post
            .created_utc
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts as i64, 0))
            .unwrap_or(now);

        Some(Article {
            description: truncate_chars(&body, 300),
            deduplication_hash: dedup::fingerprint(&title, &content),
            link: post_url.clone().unwrap_or_default(),
            pub_date,
            source_id: source_id.to_string(),
            author_handle: post.author.map(|a| format!("u/{}", a)),
            post_url,
            engagement_metrics: Some(EngagementMetrics {
                likes: Some(post.score.max(0) as u64),
                shares: None,
                comments: Some(post.num_comments.max(0) as u64),
                upvote_ratio: post.upvote_ratio,
            }),
            title,
            content,
        })
    }
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    async fn fetch_articles(&self, source: &SourceConfig) -> Result<Vec<Article>> {
        self.validate_config(source)?;
        let params = source
            .reddit
            .as_ref()
            .context("reddit source without reddit params")?;
        let creds = credentials()?;
        let token = self.bearer_token(&creds).await?;
        let timeout = Duration::from_secs(source.timeout_secs);
        let now = Utc::now();

        let listing_url = format!("{}/top", source.url.trim_end_matches('/'));
        let query = [
            ("t", params.time_window.as_str().to_string()),
            ("limit", params.max_posts.to_string()),
        ];
        let listing: Listing<PostData> = self
            .get_json(&listing_url, &query, &token, &creds.user_agent, timeout)
            .await?;

        let posts: Vec<PostData> = listing.data.children.into_iter().map(|t| t.data).collect();
        let fetched = posts.len();
        let (kept, stats) = self.filter_posts(posts, params);

        tracing::info!(
            source = %source.id,
            subreddit = %params.subreddit,
            fetched,
            kept = kept.len(),
            rejected_relevance = stats.relevance,
            rejected_quality = stats.quality,
            rejected_ratio = stats.ratio,
            rejected_language = stats.language,
            "reddit posts filtered"
        );
        counter!("collect_posts_rejected_total").increment(stats.total() as u64);

        let mut articles = Vec::with_capacity(kept.len());
        for post in kept {
            let comments = if params.include_comments {
                self.top_comments(
                    &source.url,
                    &post.id,
                    params,
                    &token,
                    &creds.user_agent,
                    timeout,
                )
                .await
            } else {
                Vec::new()
            };
            if let Some(article) = self.build_article(post, comments, params, &source.id, now) {
                articles.push(article);
            }
        }

        articles.truncate(source.max_articles as usize);
        counter!("collect_articles_total").increment(articles.len() as u64);
        Ok(articles)
    }

    fn validate_config(&self, source: &SourceConfig) -> Result<()> {
        validate_common(source, SourceType::SocialReddit)?;
        let Some(params) = source.reddit.as_ref() else {
            bail!("source `{}` is missing the [sources.reddit] table", source.id);
        };
        if params.subreddit.trim().is_empty() {
            bail!("source `{}` has an empty subreddit", source.id);
        }
        if params.max_posts == 0 || params.max_posts > 100 {
            bail!(
                "source `{}` max_posts must be within 1-100, got {}",
                source.id,
                params.max_posts
            );
        }
        Ok(())
    }

    fn supports(&self, kind: SourceType) -> bool {
        kind == SourceType::SocialReddit
    }

    fn name(&self) -> &'static str {
        "reddit"
    }
}

/// Character-safe truncation with a trailing ellipsis marker.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars).collect();
    format!("{}...", cut)
}

/// Cheap Dutch detection: at least three distinct Dutch function words.
/// Good enough to drop English threads about the same keywords.
fn is_dutch(text: &str) -> bool {
    const DUTCH_FUNCTION_WORDS: &[&str] = &[
        "de", "het", "een", "en", "van", "ik", "je", "dat", "is", "niet", "zijn", "op", "te",
        "met", "voor", "maar", "ze", "er", "naar", "ook", "bij", "dan", "nog", "wat", "mijn",
        "deze", "dit", "wordt", "heeft", "omdat",
    ];
    let mut seen = std::collections::HashSet::new();
    for tok in crate::lexicon::tokenize(text) {
        if DUTCH_FUNCTION_WORDS.contains(&tok.as_str()) {
            seen.insert(tok);
            if seen.len() >= 3 {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: &str, selftext: &str, score: i64, comments: i64, ratio: f64) -> PostData {
        PostData {
            id: "abc123".to_string(),
            title: Some(title.to_string()),
            selftext: Some(selftext.to_string()),
            author: Some("tester".to_string()),
            permalink: Some("/r/thenetherlands/comments/abc123/post/".to_string()),
            created_utc: Some(1_755_561_600.0),
            score,
            num_comments: comments,
            upvote_ratio: Some(ratio),
        }
    }

    fn adapter() -> RedditAdapter {
        RedditAdapter::new(RedditKeywords::default_seed())
    }

    #[test]
    fn dutch_detection_requires_three_function_words() {
        assert!(is_dutch(
            "Mijn zorgverzekering is te duur geworden dit jaar"
        ));
        assert!(!is_dutch("My health insurance is too expensive"));
        assert!(!is_dutch("zorgverzekering premium increase"));
    }

    #[test]
    fn filter_rejects_per_gate() {
        let a = adapter();
        let params = RedditParams {
            subreddit: "thenetherlands".to_string(),
            ..RedditParams::default()
        };
        let posts = vec![
            // passes every gate
            post(
                "Zorgverzekering opzeggen",
                "Mijn premie is veel te hoog geworden, wat kan ik doen? Ik ben niet tevreden.",
                50,
                20,
                0.9,
            ),
            // irrelevant
            post(
                "Beste fietsroutes",
                "Ik zoek een mooie route door de duinen",
                100,
                50,
                0.95,
            ),
            // relevant but no engagement
            post(
                "Vraag over mijn zorgverzekering",
                "Weet iemand of dit wordt vergoed? Het is niet duidelijk.",
                2,
                1,
                0.9,
            ),
            // relevant, engaged, but heavily downvoted
            post(
                "Zorgverzekering is oplichting",
                "De premie is een schande, niemand zou dit moeten betalen",
                40,
                30,
                0.2,
            ),
            // relevant and engaged, but English
            post(
                "Question about zorgverzekering",
                "Can someone explain how the eigen risico works?",
                80,
                40,
                0.9,
            ),
        ];

        let (kept, stats) = a.filter_posts(posts, &params);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title.as_deref(), Some("Zorgverzekering opzeggen"));
        assert_eq!(
            stats,
            FilterStats {
                relevance: 1,
                quality: 1,
                ratio: 1,
                language: 1,
            }
        );
    }

    #[test]
    fn quality_gate_passes_on_comments_alone() {
        let a = adapter();
        let params = RedditParams {
            subreddit: "thenetherlands".to_string(),
            ..RedditParams::default()
        };
        // score below minimum, comment count above it
        let posts = vec![post(
            "Eigen risico vraag",
            "Moet ik dit zelf betalen? Mijn verzekeraar zegt van wel maar dat klopt niet.",
            1,
            12,
            0.8,
        )];
        let (kept, stats) = a.filter_posts(posts, &params);
        assert_eq!(kept.len(), 1);
        assert_eq!(stats.total(), 0);
    }

    #[test]
    fn build_article_assembles_content_and_engagement() {
        let a = adapter();
        let params = RedditParams {
            subreddit: "thenetherlands".to_string(),
            ..RedditParams::default()
        };
        let now = Utc::now();
        let article = a
            .build_article(
                post(
                    "Zorgverzekering opzeggen",
                    "Mijn premie is te hoog.",
                    50,
                    20,
                    0.9,
                ),
                vec!["Zelfde probleem hier, ik ben overgestapt.".to_string()],
                &params,
                "reddit-thenetherlands",
                now,
            )
            .unwrap();

        assert_eq!(article.title, "Zorgverzekering opzeggen");
        assert_eq!(article.description, "Mijn premie is te hoog.");
        assert!(article.content.contains("Zelfde probleem hier"));
        assert_eq!(article.source_id, "reddit-thenetherlands");
        assert_eq!(article.author_handle.as_deref(), Some("u/tester"));
        assert_eq!(
            article.post_url.as_deref(),
            Some("https://www.reddit.com/r/thenetherlands/comments/abc123/post/")
        );
        let engagement = article.engagement_metrics.unwrap();
        assert_eq!(engagement.likes, Some(50));
        assert_eq!(engagement.comments, Some(20));
        assert_eq!(article.pub_date.timestamp(), 1_755_561_600);
    }

    #[test]
    fn link_posts_fall_back_to_title_as_body() {
        let a = adapter();
        let params = RedditParams {
            subreddit: "thenetherlands".to_string(),
            ..RedditParams::default()
        };
        let article = a
            .build_article(
                post("Premie stijgt weer", "", 50, 20, 0.9),
                Vec::new(),
                &params,
                "reddit-thenetherlands",
                Utc::now(),
            )
            .unwrap();
        assert_eq!(article.description, "Premie stijgt weer");
        assert_eq!(article.content, "Premie stijgt weer");
    }

    #[test]
    fn content_is_truncated_with_marker() {
        let long = "premie ".repeat(500);
        let out = truncate_chars(&long, 100);
        assert_eq!(out.chars().count(), 103);
        assert!(out.ends_with("..."));
        // under the limit stays untouched
        assert_eq!(truncate_chars("kort", 100), "kort");
    }

    #[test]
    fn comment_listing_shape_deserializes() {
        let raw = r#"[
            {"data": {"children": [{"data": {"id": "abc", "title": "t"}}]}},
            {"data": {"children": [
                {"data": {"body": "Een reactie"}},
                {"data": {"count": 3, "children": ["x"]}}
            ]}}
        ]"#;
        let parsed: (serde_json::Value, Listing<CommentData>) =
            serde_json::from_str(raw).unwrap();
        let bodies: Vec<_> = parsed
            .1
            .data
            .children
            .into_iter()
            .filter_map(|c| c.data.body)
            .collect();
        assert_eq!(bodies, vec!["Een reactie"]);
    }
}
