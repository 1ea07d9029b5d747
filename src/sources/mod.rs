// src/sources/mod.rs
pub mod reddit;
pub mod rss;

use anyhow::{bail, Result};

use crate::config::{RedditKeywords, SourceConfig, SourceType};
use crate::types::Article;

pub use reddit::RedditAdapter;
pub use rss::RssAdapter;

/// One fetchable source kind. Implementations convert provider payloads into
/// the unified `Article` shape and keep all transport concerns (retries,
/// auth, timeouts) behind this boundary.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch_articles(&self, source: &SourceConfig) -> Result<Vec<Article>>;
    /// Cheap static validation, run before any I/O.
    fn validate_config(&self, source: &SourceConfig) -> Result<()>;
    fn supports(&self, kind: SourceType) -> bool;
    fn name(&self) -> &'static str;
}

/// Closed, explicit adapter set. Source types map to adapters here and
/// nowhere else; adding a kind means adding a construction line.
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new(keywords: RedditKeywords) -> Self {
        Self {
            adapters: vec![
                Box::new(RssAdapter::new()),
                Box::new(RedditAdapter::new(keywords)),
            ],
        }
    }

    /// Registry with explicit adapters, for tests.
    pub fn with_adapters(adapters: Vec<Box<dyn SourceAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn adapter_for(&self, kind: SourceType) -> Option<&dyn SourceAdapter> {
        self.adapters
            .iter()
            .find(|a| a.supports(kind))
            .map(|a| a.as_ref())
    }
}

/// Normalize feed/provider text: decode HTML entities, strip tags, fold
/// typographic quotes to ASCII, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Validation shared by all adapters. Runs before any network call so a
/// misconfigured source fails fast and permanently.
pub(crate) fn validate_common(source: &SourceConfig, expected: SourceType) -> Result<()> {
    if source.id.trim().is_empty() {
        bail!("source id must not be empty");
    }
    if source.name.trim().is_empty() {
        bail!("source `{}` has an empty name", source.id);
    }
    if source.kind != expected {
        bail!(
            "source `{}` has type {:?}, adapter expects {:?}",
            source.id,
            source.kind,
            expected
        );
    }
    if !source.url.starts_with("http://") && !source.url.starts_with("https://") {
        bail!("source `{}` url must be http(s): {}", source.id, source.url);
    }
    if source.max_articles == 0 || source.max_articles > 100 {
        bail!(
            "source `{}` max_articles must be within 1-100, got {}",
            source.id,
            source.max_articles
        );
    }
    if source.timeout_secs == 0 || source.timeout_secs > 30 {
        bail!(
            "source `{}` timeout_secs must be within 1-30, got {}",
            source.id,
            source.timeout_secs
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourcesConfig;

    #[test]
    fn normalize_text_decodes_strips_and_collapses() {
        let s = "  <p>De premie&nbsp;stijgt <b>fors</b></p>\n\t volgend jaar  ";
        assert_eq!(normalize_text(s), "De premie stijgt fors volgend jaar");
    }

    #[test]
    fn normalize_text_folds_smart_quotes() {
        let s = "\u{201C}Onbetaalbaar\u{201D}, zegt de \u{2018}expert\u{2019}";
        assert_eq!(normalize_text(s), "\"Onbetaalbaar\", zegt de 'expert'");
    }

    #[test]
    fn validate_common_accepts_seed_sources() {
        let cfg = SourcesConfig::default_seed();
        assert!(validate_common(&cfg.sources[0], SourceType::Rss).is_ok());
        assert!(validate_common(&cfg.sources[1], SourceType::SocialReddit).is_ok());
    }

    #[test]
    fn validate_common_rejects_bad_fields() {
        let base = SourcesConfig::default_seed().sources[0].clone();

        let mut s = base.clone();
        s.id = "  ".to_string();
        assert!(validate_common(&s, SourceType::Rss).is_err());

        let mut s = base.clone();
        s.url = "ftp://example.com/feed".to_string();
        assert!(validate_common(&s, SourceType::Rss).is_err());

        let mut s = base.clone();
        s.max_articles = 0;
        assert!(validate_common(&s, SourceType::Rss).is_err());

        let mut s = base.clone();
        s.max_articles = 101;
        assert!(validate_common(&s, SourceType::Rss).is_err());

        let mut s = base.clone();
        s.timeout_secs = 31;
        assert!(validate_common(&s, SourceType::Rss).is_err());

        // type mismatch
        let s = base;
        assert!(validate_common(&s, SourceType::SocialReddit).is_err());
    }

    #[test]
    fn registry_maps_types_to_adapters() {
        let registry = AdapterRegistry::new(RedditKeywords::default_seed());
        assert_eq!(registry.adapter_for(SourceType::Rss).unwrap().name(), "rss");
        assert_eq!(
            registry.adapter_for(SourceType::SocialReddit).unwrap().name(),
            "reddit"
        );
    }
}
