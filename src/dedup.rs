//! Cross-source duplicate detection.
//!
//! The same story often arrives from several outlets with slightly reworded
//! headlines. Detection runs in two stages: an exact fingerprint match, then
//! a fuzzy title comparison that only falls back to full-text similarity for
//! the ambiguous middle band. Candidates are compared against already
//! accepted articles only, so the first occurrence in configuration order
//! always survives.

use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::types::Article;

/// Similarity at or above this marks a duplicate.
const SIMILARITY_THRESHOLD: f64 = 0.8;
/// Title similarity below this skips the candidate pair entirely.
const TITLE_SKIP_THRESHOLD: f64 = 0.5;
/// Combined texts whose lengths differ by more than this fraction are
/// assumed distinct without an edit-distance pass.
const LENGTH_DIFF_SKIP: f64 = 0.5;

/// SHA-256 hex over the lowercased, trimmed `"title content"` pair.
pub fn fingerprint(title: &str, content: &str) -> String {
    let text = format!("{} {}", title, content).to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Normalized Levenshtein similarity over trimmed, lowercased input.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    strsim::normalized_levenshtein(&a, &b)
}

fn fuzzy_match(candidate: &Article, kept: &Article) -> bool {
    let title_sim = similarity(&candidate.title, &kept.title);
    if title_sim < TITLE_SKIP_THRESHOLD {
        return false;
    }
    if title_sim >= SIMILARITY_THRESHOLD {
        return true;
    }

    // Middle band: decide on title+description, unless the lengths already
    // rule the pair out.
    let a = format!("{} {}", candidate.title, candidate.description);
    let b = format!("{} {}", kept.title, kept.description);
    let (la, lb) = (a.chars().count() as f64, b.chars().count() as f64);
    let longest = la.max(lb);
    if longest > 0.0 && (la - lb).abs() / longest > LENGTH_DIFF_SKIP {
        return false;
    }
    similarity(&a, &b) >= SIMILARITY_THRESHOLD
}

fn find_duplicate<'a>(candidate: &Article, accepted: &'a [Article]) -> Option<&'a Article> {
    accepted.iter().find(|kept| {
        kept.deduplication_hash == candidate.deduplication_hash || fuzzy_match(candidate, kept)
    })
}

/// True when the candidate duplicates any already accepted article. Matching
/// fingerprints always win, even for pairs the title stage would skip.
pub fn is_duplicate(candidate: &Article, accepted: &[Article]) -> bool {
    find_duplicate(candidate, accepted).is_some()
}

/// Outcome of deduplicating one merged batch.
#[derive(Debug, Default)]
pub struct DedupOutcome {
    /// Survivors, in input order.
    pub unique: Vec<Article>,
    pub duplicates_removed: u32,
    /// Fingerprints of survivors that absorbed at least one duplicate.
    pub absorbed: HashSet<String>,
}

/// Deduplicate a merged batch, first occurrence wins.
pub fn dedup_articles(articles: Vec<Article>) -> DedupOutcome {
    let mut out = DedupOutcome::default();
    for candidate in articles {
        if let Some(kept) = find_duplicate(&candidate, &out.unique) {
            let hash = kept.deduplication_hash.clone();
            out.duplicates_removed += 1;
            out.absorbed.insert(hash);
        } else {
            out.unique.push(candidate);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn article(source_id: &str, title: &str, description: &str) -> Article {
        Article {
            title: title.to_string(),
            description: description.to_string(),
            content: format!("{} {}", title, description),
            link: format!("https://example.com/{}", source_id),
            pub_date: Utc::now(),
            source_id: source_id.to_string(),
            deduplication_hash: fingerprint(title, description),
            author_handle: None,
            post_url: None,
            engagement_metrics: None,
        }
    }

    #[test]
    fn fingerprint_is_case_insensitive_hex() {
        assert_eq!(
            fingerprint("Premie Stijgt", "meer nieuws"),
            fingerprint("premie stijgt", "meer nieuws")
        );
        assert_eq!(fingerprint("a", "b").len(), 64);
    }

    #[test]
    fn article_duplicates_itself() {
        let a = article("nu", "Zorgpremie stijgt volgend jaar fors", "De premie gaat omhoog.");
        assert!(is_duplicate(&a, &[a.clone()]));
    }

    #[test]
    fn identical_fingerprints_beat_the_title_skip() {
        let a = article("nu", "Kabinet presenteert nieuwe zorgplannen", "x");
        let mut b = article("rtl", "Restaurant in Utrecht wint prijs", "y");
        b.deduplication_hash = a.deduplication_hash.clone();
        assert!(is_duplicate(&b, &[a]));
    }

    #[test]
    fn reworded_headline_is_a_duplicate() {
        let a = article(
            "nu",
            "Zorgpremie stijgt volgend jaar fors",
            "De premie van de basisverzekering gaat omhoog.",
        );
        let b = article(
            "rtl",
            "Zorgpremie stijgt volgend jaar flink",
            "Verzekeraars kondigen hogere premies aan.",
        );
        assert!(is_duplicate(&b, &[a]));
    }

    #[test]
    fn unrelated_titles_are_kept() {
        let a = article("nu", "Kabinet presenteert nieuwe zorgplannen", "Politiek nieuws.");
        let b = article("rtl", "Restaurant in Utrecht wint prijs", "Culinair nieuws.");
        assert!(!is_duplicate(&b, &[a]));
    }

    #[test]
    fn midband_titles_fall_back_to_combined_text() {
        let desc = "De zorgverzekeraars maken de nieuwe premies bekend voor het komende jaar.";
        // title similarity ~0.76: falls between the skip and match thresholds
        let a = article("nu", "premieoverzicht abcde", desc);
        let b = article("rtl", "premieoverzicht vwxyz", desc);
        assert!(is_duplicate(&b, &[a]));
    }

    #[test]
    fn midband_titles_with_diverging_lengths_are_kept() {
        let a = article("nu", "premieoverzicht abcde", "Kort bericht over de premie.");
        let b = article(
            "rtl",
            "premieoverzicht vwxyz",
            "Een veel langer artikel dat uitgebreid ingaat op de premiestijging, de gevolgen \
             voor huishoudens, de reactie van de zorgverzekeraars en wat consumenten kunnen \
             doen om te besparen op hun zorgverzekering in het komende kalenderjaar.",
        );
        assert!(!is_duplicate(&b, &[a]));
    }

    #[test]
    fn first_occurrence_wins_and_absorption_is_tracked() {
        let a1 = article(
            "nu",
            "Zorgpremie stijgt volgend jaar fors",
            "De premie gaat omhoog.",
        );
        let a2 = article(
            "rtl",
            "Zorgpremie stijgt volgend jaar flink",
            "De premie gaat omhoog.",
        );
        let a3 = article("nos", "Nieuwe behandeling vergoed vanaf januari", "Goed nieuws.");
        let survivor_hash = a1.deduplication_hash.clone();

        let out = dedup_articles(vec![a1, a2, a3]);
        assert_eq!(out.unique.len(), 2);
        assert_eq!(out.duplicates_removed, 1);
        assert_eq!(out.unique[0].source_id, "nu");
        assert_eq!(out.unique[1].source_id, "nos");
        assert!(out.absorbed.contains(&survivor_hash));
    }

    #[test]
    fn similarity_normalizes_case_and_whitespace() {
        assert!((similarity("  Premie  ", "premie") - 1.0).abs() < 1e-9);
    }
}
