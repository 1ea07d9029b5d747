//! RSS feed adapter.
//!
//! Fetches a feed with per-source timeout, retries transient failures
//! (network errors, 5xx, 429 honouring Retry-After) and gives up into an
//! empty result so the cycle records a degraded source instead of failing.
//! Other 4xx statuses are configuration problems and fail immediately.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::config::{SourceConfig, SourceType};
use crate::dedup;
use crate::sources::{normalize_text, validate_common, SourceAdapter};
use crate::types::Article;

const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 1000;
const USER_AGENT: &str = "zorg-sentiment-collector/0.1";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

pub struct RssAdapter {
    client: reqwest::Client,
}

impl RssAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for RssAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for RssAdapter {
    async fn fetch_articles(&self, source: &SourceConfig) -> Result<Vec<Article>> {
        self.validate_config(source)?;
        let timeout = Duration::from_secs(source.timeout_secs);

        for attempt in 0..MAX_RETRIES {
            let backoff = Duration::from_millis(RETRY_BASE_DELAY_MS * (attempt as u64 + 1));
            let retries_left = attempt + 1 < MAX_RETRIES;

            let resp = match self
                .client
                .get(&source.url)
                .header(reqwest::header::USER_AGENT, USER_AGENT)
                .timeout(timeout)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = ?e, source = %source.id, attempt, "feed request failed");
                    counter!("collect_retry_total").increment(1);
                    if retries_left {
                        tokio::time::sleep(backoff).await;
                    }
                    continue;
                }
            };

            let status = resp.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let wait = retry_after(&resp).unwrap_or(backoff);
                tracing::warn!(source = %source.id, attempt, wait_ms = wait.as_millis() as u64, "feed rate limited");
                counter!("collect_retry_total").increment(1);
                if retries_left {
                    tokio::time::sleep(wait).await;
                }
                continue;
            }
            if status.is_server_error() {
                tracing::warn!(source = %source.id, status = %status, attempt, "feed server error");
                counter!("collect_retry_total").increment(1);
                if retries_left {
                    tokio::time::sleep(backoff).await;
                }
                continue;
            }
            if !status.is_success() {
                // remaining 4xx are configuration problems, not worth retrying
                bail!("feed `{}` returned {}", source.id, status);
            }

            let body = resp
                .text()
                .await
                .with_context(|| format!("reading feed body for `{}`", source.id))?;
            let mut articles = parse_feed(&body, &source.id)?;
            articles.truncate(source.max_articles as usize);
            counter!("collect_articles_total").increment(articles.len() as u64);
            return Ok(articles);
        }

        tracing::warn!(source = %source.id, "feed unavailable after retries, degrading to empty");
        Ok(Vec::new())
    }

    fn validate_config(&self, source: &SourceConfig) -> Result<()> {
        validate_common(source, SourceType::Rss)
    }

    fn supports(&self, kind: SourceType) -> bool {
        kind == SourceType::Rss
    }

    fn name(&self) -> &'static str {
        "rss"
    }
}

/// Parse an RSS document into articles. Separate from the transport so
/// fixture tests exercise the exact production path. Items without both a
/// title and a description are dropped.
pub fn parse_feed(xml: &str, source_id: &str) -> Result<Vec<Article>> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;
    let now = Utc::now();

    let mut out = Vec::with_capacity(rss.channel.items.len());
    for it in rss.channel.items {
        let title = normalize_text(it.title.as_deref().unwrap_or_default());
        let description = normalize_text(it.description.as_deref().unwrap_or_default());
        if title.is_empty() || description.is_empty() {
            continue;
        }
        let deduplication_hash = dedup::fingerprint(&title, &description);
        let pub_date = parse_pub_date(it.pub_date.as_deref(), now);

        out.push(Article {
            content: format!("{} {}", title, description),
            link: it.link.unwrap_or_default(),
            pub_date,
            source_id: source_id.to_string(),
            deduplication_hash,
            title,
            description,
            author_handle: None,
            post_url: None,
            engagement_metrics: None,
        });
    }

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("collect_parse_ms").record(ms);
    Ok(out)
}

/// RFC 2822 pub dates (`Tue, 19 Aug 2025 09:30:00 +0200`); anything
/// unparseable falls back to the collection instant.
fn parse_pub_date(raw: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    raw.and_then(|ts| OffsetDateTime::parse(ts, &Rfc2822).ok())
        .map(|dt| dt.to_offset(UtcOffset::UTC))
        .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), 0))
        .unwrap_or(now)
}

fn retry_after(resp: &reqwest::Response) -> Option<Duration> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Dutch feeds mix HTML entities into the XML body, which quick-xml rejects.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
        .replace("&euro;", "€")
}
