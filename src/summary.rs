//! Dutch one-line mood summaries for stored data points and API responses.
//!
//! The phrase is picked from a per-mood table, seeded by the timestamp hour,
//! so re-building the same hourly point always yields the same text.

use chrono::{DateTime, Timelike, Utc};

use crate::types::{MoodType, SentimentBreakdown};

const POSITIVE_LINES: [&str; 4] = [
    "Nederlanders zijn vandaag overwegend positief over hun zorgverzekering",
    "De stemming rond zorgverzekeraars is vandaag opvallend zonnig",
    "Veel waardering voor zorgverzekeraars in de berichten van vandaag",
    "Positieve geluiden overheersen in het zorgverzekeringsnieuws",
];

const NEGATIVE_LINES: [&str; 4] = [
    "Veel onvrede over zorgverzekeraars in de berichten van vandaag",
    "De stemming rond zorgverzekeringen is vandaag somber",
    "Kritische geluiden over premies en vergoedingen voeren de boventoon",
    "Nederlanders uiten vandaag vooral klachten over hun zorgverzekering",
];

const NEUTRAL_LINES: [&str; 4] = [
    "De stemming rond zorgverzekeringen is vandaag neutraal",
    "Weinig uitgesproken meningen over zorgverzekeraars vandaag",
    "Het zorgverzekeringsnieuws is vandaag overwegend zakelijk van toon",
    "Geen duidelijke stemmingsuitslag in de berichten van vandaag",
];

const MIXED_LINES: [&str; 4] = [
    "De meningen over zorgverzekeraars zijn vandaag sterk verdeeld",
    "Zowel lof als kritiek voor zorgverzekeraars in de berichten van vandaag",
    "Wisselende gevoelens over premies en vergoedingen vandaag",
    "Positieve en negatieve geluiden houden elkaar vandaag in evenwicht",
];

pub fn emoji(mood: MoodType) -> &'static str {
    match mood {
        MoodType::Positive => "😊",
        MoodType::Negative => "😟",
        MoodType::Neutral => "😐",
        MoodType::Mixed => "😕",
    }
}

fn templates(mood: MoodType) -> &'static [&'static str] {
    match mood {
        MoodType::Positive => &POSITIVE_LINES,
        MoodType::Negative => &NEGATIVE_LINES,
        MoodType::Neutral => &NEUTRAL_LINES,
        MoodType::Mixed => &MIXED_LINES,
    }
}

/// Emoji plus a mood phrase, stable for a given mood and hour.
pub fn summary_line(mood: MoodType, timestamp: DateTime<Utc>) -> String {
    let lines = templates(mood);
    let phrase = lines[timestamp.hour() as usize % lines.len()];
    format!("{} {}", emoji(mood), phrase)
}

/// Summary line with the percentage breakdown appended.
pub fn detailed_line(
    mood: MoodType,
    breakdown: &SentimentBreakdown,
    timestamp: DateTime<Utc>,
) -> String {
    format!(
        "{} ({}% positief, {}% neutraal, {}% negatief)",
        summary_line(mood, timestamp),
        breakdown.positive,
        breakdown.neutral,
        breakdown.negative
    )
}

/// Shown while no collection cycle has produced a data point yet.
pub fn no_data_line() -> String {
    "😐 Nog geen sentimentgegevens verzameld over zorgverzekeringen".to_string()
}

/// Warns that the latest data point is older than the staleness cutoff.
pub fn stale_line(age_hours: i64) -> String {
    format!(
        "⚠️ De laatste meting is {age_hours} uur oud en mogelijk verouderd"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn line_is_deterministic_per_hour() {
        let at = Utc.with_ymd_and_hms(2025, 8, 19, 9, 0, 0).unwrap();
        let again = Utc.with_ymd_and_hms(2025, 8, 19, 9, 45, 12).unwrap();
        assert_eq!(
            summary_line(MoodType::Negative, at),
            summary_line(MoodType::Negative, again)
        );
        // 9 % 4 == 1
        assert_eq!(
            summary_line(MoodType::Negative, at),
            format!("😟 {}", NEGATIVE_LINES[1])
        );
    }

    #[test]
    fn neighbouring_hours_rotate_through_the_table() {
        let nine = Utc.with_ymd_and_hms(2025, 8, 19, 9, 0, 0).unwrap();
        let ten = Utc.with_ymd_and_hms(2025, 8, 19, 10, 0, 0).unwrap();
        assert_ne!(
            summary_line(MoodType::Positive, nine),
            summary_line(MoodType::Positive, ten)
        );
    }

    #[test]
    fn detailed_line_appends_breakdown() {
        let at = Utc.with_ymd_and_hms(2025, 8, 19, 12, 0, 0).unwrap();
        let breakdown = SentimentBreakdown {
            positive: 45,
            neutral: 40,
            negative: 15,
        };
        let line = detailed_line(MoodType::Mixed, &breakdown, at);
        assert!(line.starts_with("😕 "));
        assert!(line.ends_with("(45% positief, 40% neutraal, 15% negatief)"));
    }

    #[test]
    fn fallback_lines_mention_the_condition() {
        assert!(no_data_line().contains("geen"));
        assert!(stale_line(26).contains("26 uur"));
    }
}
