//! Dutch healthcare-insurance sentiment lexicon.
//!
//! The word list is embedded at compile time and parsed once. Polarities are
//! small integers; domain terms (premieverhoging, eigen-risico vocabulary)
//! sit alongside general Dutch sentiment words, with common adjective
//! inflections listed explicitly since lookup is exact-token.

use once_cell::sync::Lazy;
use std::collections::HashMap;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../lexicon_nl.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

/// Lexicon polarity for a (lowercased) token, 0 when unknown.
#[inline]
pub fn polarity(word: &str) -> i32 {
    *LEXICON.get(word).unwrap_or(&0)
}

pub fn lexicon_size() -> usize {
    LEXICON.len()
}

/// Dutch negation tokens. A negator inverts the polarity of the token that
/// immediately follows it.
pub fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "niet"
            | "geen"
            | "nooit"
            | "nergens"
            | "niemand"
            | "niets"
            | "nee"
            | "neen"
            | "noch"
            | "zonder"
    )
}

/// Alphanumeric tokens, lowercased. Unicode-aware so Dutch diacritics
/// (financiële, geïndexeerd) stay inside one token.
pub fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}
