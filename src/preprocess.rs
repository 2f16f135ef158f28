use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::ingest::make_review_id;
use crate::metrics::{PipelineMetrics, Stage};
use crate::models::{RawReview, Review};

pub const DEFAULT_SOURCE: &str = "Google Play";

/// Remove exact-duplicate rows, keeping the first occurrence and preserving
/// input order. The key is the full raw tuple so distinct missing-field
/// patterns never collapse into each other.
pub fn dedup(rows: Vec<RawReview>, metrics: &mut PipelineMetrics) -> Vec<RawReview> {
    let before = rows.len();
    let mut seen: HashSet<(
        Option<String>,
        Option<u64>,
        Option<String>,
        Option<String>,
        Option<String>,
    )> = HashSet::new();

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let key = (
            row.review.clone(),
            row.rating.map(f64::to_bits),
            row.date.clone(),
            row.bank.clone(),
            row.source.clone(),
        );
        if seen.insert(key) {
            out.push(row);
        }
    }

    let removed = before - out.len();
    metrics.incr(Stage::Dedup, "removed", removed as u64);
    if removed > 0 {
        info!("Deduplication - removed={}, retained={}", removed, out.len());
    } else {
        debug!("Deduplication - no duplicates, retained={}", out.len());
    }
    out
}

/// Fill defaulted fields and drop rows missing the required grouping keys
/// (date and bank). Rows survive as fully-typed `Review` records.
pub fn repair(rows: Vec<RawReview>, metrics: &mut PipelineMetrics) -> Vec<Review> {
    let before = rows.len();
    let mut repaired = 0u64;
    let mut out = Vec::with_capacity(rows.len());

    for row in rows {
        let (date, bank) = match (row.date, row.bank) {
            (Some(d), Some(b)) => (d, b),
            _ => continue, // required keys, not defaultable
        };

        let mut touched = false;
        let text = match row.review {
            Some(t) => t,
            None => {
                touched = true;
                String::new()
            }
        };
        let rating = match row.rating {
            Some(r) => r as i64,
            None => {
                touched = true;
                0
            }
        };
        let source = match row.source {
            Some(s) => s,
            None => {
                touched = true;
                DEFAULT_SOURCE.to_string()
            }
        };
        if touched {
            repaired += 1;
        }

        let id = row
            .review_id
            .unwrap_or_else(|| make_review_id(&text, &bank, &date));

        out.push(Review {
            id,
            text,
            rating,
            date,
            bank,
            source,
            detected_language: String::new(),
            cleaned: String::new(),
            tokens: Vec::new(),
            themes: Default::default(),
            sentiment_label: row.sentiment_label,
            sentiment_score: row.sentiment_score,
        });
    }

    let dropped = (before - out.len()) as u64;
    metrics.incr(Stage::Repair, "repaired", repaired);
    metrics.incr(Stage::Repair, "dropped", dropped);
    info!(
        "Repair - repaired={}, dropped={}, retained={}",
        repaired,
        dropped,
        out.len()
    );
    out
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
];

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for fmt in DATE_FORMATS {
        if fmt.contains("%H") {
            if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, fmt) {
                return Some(dt.date());
            }
        } else if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    None
}

/// Canonicalize every review date to YYYY-MM-DD; rows whose date cannot be
/// parsed are dropped rather than failing the run.
pub fn normalize_dates(rows: Vec<Review>, metrics: &mut PipelineMetrics) -> Vec<Review> {
    let before = rows.len();
    let mut out = Vec::with_capacity(rows.len());

    for mut row in rows {
        match parse_date(&row.date) {
            Some(d) => {
                row.date = d.format("%Y-%m-%d").to_string();
                out.push(row);
            }
            None => {
                debug!("Dropping review {} - unparsable date {:?}", row.id, row.date);
            }
        }
    }

    let dropped = (before - out.len()) as u64;
    metrics.incr(Stage::DateNormalize, "dropped", dropped);
    if dropped > 0 {
        warn!("Date normalization - dropped={} rows with invalid dates", dropped);
    }
    info!("Date normalization - retained={}", out.len());
    out
}

/// Cap each bank's review count to a soft target. Over-target banks keep a
/// uniformly-random sample of exactly `target_count` rows (original relative
/// order preserved); under-target banks are kept whole with a warning. The
/// caller supplies the seeded RNG so runs are reproducible.
pub fn balance(
    rows: Vec<Review>,
    target_count: usize,
    rng: &mut StdRng,
    metrics: &mut PipelineMetrics,
) -> Vec<Review> {
    // bank -> row indices, in first-appearance order
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        groups
            .entry(row.bank.clone())
            .or_insert_with(|| {
                order.push(row.bank.clone());
                Vec::new()
            })
            .push(i);
    }

    let mut keep: HashSet<usize> = HashSet::new();
    for bank in &order {
        let idxs = &groups[bank];
        if idxs.len() > target_count {
            let mut picked: Vec<usize> =
                sample(rng, idxs.len(), target_count).into_iter().collect();
            picked.sort_unstable();
            keep.extend(picked.into_iter().map(|p| idxs[p]));
            metrics.incr(Stage::Balance, "sampled_out", (idxs.len() - target_count) as u64);
            info!(
                "Balance - bank={}, sampled {} of {}",
                bank,
                target_count,
                idxs.len()
            );
        } else {
            keep.extend(idxs.iter().copied());
            if idxs.len() < target_count {
                warn!(
                    "Balance - bank={} under target ({} < {}), keeping all",
                    bank,
                    idxs.len(),
                    target_count
                );
                metrics.incr(Stage::Balance, "under_target_banks", 1);
            }
        }
    }

    rows.into_iter()
        .enumerate()
        .filter(|(i, _)| keep.contains(i))
        .map(|(_, r)| r)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn raw(text: &str, rating: f64, date: &str, bank: &str, source: &str) -> RawReview {
        RawReview {
            review: Some(text.to_string()),
            rating: Some(rating),
            date: Some(date.to_string()),
            bank: Some(bank.to_string()),
            source: Some(source.to_string()),
            ..Default::default()
        }
    }

    fn review(text: &str, bank: &str, date: &str) -> Review {
        Review {
            id: format!("{}-{}", bank, text),
            text: text.to_string(),
            rating: 5,
            date: date.to_string(),
            bank: bank.to_string(),
            source: DEFAULT_SOURCE.to_string(),
            detected_language: String::new(),
            cleaned: String::new(),
            tokens: Vec::new(),
            themes: Default::default(),
            sentiment_label: None,
            sentiment_score: None,
        }
    }

    #[test]
    fn dedup_collapses_identical_tuples_to_first() {
        let mut m = PipelineMetrics::new();
        let rows = vec![
            raw("Love this app", 5.0, "2024-01-02", "A", "Play"),
            raw("Love this app", 5.0, "2024-01-02", "A", "Play"),
        ];
        let out = dedup(rows, &mut m);
        assert_eq!(out.len(), 1);
        assert_eq!(m.get(Stage::Dedup, "removed"), 1);
    }

    #[test]
    fn dedup_keeps_rows_differing_in_any_key_field() {
        let mut m = PipelineMetrics::new();
        let rows = vec![
            raw("ok", 3.0, "2024-01-02", "A", "Play"),
            raw("ok", 3.0, "2024-01-02", "B", "Play"),
            raw("ok", 4.0, "2024-01-02", "A", "Play"),
        ];
        let out = dedup(rows, &mut m);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn repair_defaults_text_rating_source() {
        let mut m = PipelineMetrics::new();
        let rows = vec![RawReview {
            date: Some("2024-01-02".into()),
            bank: Some("A".into()),
            rating: Some(4.7),
            ..Default::default()
        }];
        let out = repair(rows, &mut m);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "");
        assert_eq!(out[0].rating, 4); // fractional ratings truncate
        assert_eq!(out[0].source, DEFAULT_SOURCE);
        assert_eq!(m.get(Stage::Repair, "repaired"), 1);
    }

    #[test]
    fn repair_drops_rows_missing_date_or_bank() {
        let mut m = PipelineMetrics::new();
        let rows = vec![
            RawReview {
                review: Some("fine".into()),
                bank: Some("A".into()),
                ..Default::default()
            },
            RawReview {
                review: Some("fine".into()),
                date: Some("2024-01-02".into()),
                ..Default::default()
            },
        ];
        let out = repair(rows, &mut m);
        assert!(out.is_empty());
        assert_eq!(m.get(Stage::Repair, "dropped"), 2);
    }

    #[test]
    fn dates_canonicalize_across_accepted_formats() {
        for raw in [
            "2024-01-02",
            "2024-01-02 13:45:00",
            "2024-01-02T13:45:00",
            "02/01/2024",
            "2024/01/02",
        ] {
            assert_eq!(
                parse_date(raw).unwrap().format("%Y-%m-%d").to_string(),
                "2024-01-02",
                "format {:?}",
                raw
            );
        }
    }

    #[test]
    fn garbage_dates_drop_rows() {
        let mut m = PipelineMetrics::new();
        let rows = vec![review("a", "A", "not a date"), review("b", "A", "2024-01-02")];
        let out = normalize_dates(rows, &mut m);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].date, "2024-01-02");
        assert_eq!(m.get(Stage::DateNormalize, "dropped"), 1);
    }

    #[test]
    fn balance_caps_over_target_banks_exactly() {
        let mut m = PipelineMetrics::new();
        let rows: Vec<Review> = (0..10)
            .map(|i| review(&format!("r{}", i), "A", "2024-01-02"))
            .chain((0..3).map(|i| review(&format!("s{}", i), "B", "2024-01-02")))
            .collect();
        let mut rng = StdRng::seed_from_u64(7);
        let out = balance(rows, 5, &mut rng, &mut m);
        assert_eq!(out.iter().filter(|r| r.bank == "A").count(), 5);
        // under-target bank kept whole
        assert_eq!(out.iter().filter(|r| r.bank == "B").count(), 3);
        assert_eq!(m.get(Stage::Balance, "under_target_banks"), 1);
    }

    #[test]
    fn balance_is_deterministic_for_a_seed() {
        let rows: Vec<Review> = (0..20)
            .map(|i| review(&format!("r{}", i), "A", "2024-01-02"))
            .collect();
        let mut m1 = PipelineMetrics::new();
        let mut m2 = PipelineMetrics::new();
        let mut rng1 = StdRng::seed_from_u64(42);
        let mut rng2 = StdRng::seed_from_u64(42);
        let a: Vec<String> = balance(rows.clone(), 8, &mut rng1, &mut m1)
            .into_iter()
            .map(|r| r.text)
            .collect();
        let b: Vec<String> = balance(rows, 8, &mut rng2, &mut m2)
            .into_iter()
            .map(|r| r.text)
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn balance_preserves_original_relative_order() {
        let rows: Vec<Review> = (0..30)
            .map(|i| review(&format!("r{:02}", i), "A", "2024-01-02"))
            .collect();
        let mut m = PipelineMetrics::new();
        let mut rng = StdRng::seed_from_u64(1);
        let out = balance(rows, 10, &mut rng, &mut m);
        let texts: Vec<&str> = out.iter().map(|r| r.text.as_str()).collect();
        let mut sorted = texts.clone();
        sorted.sort();
        assert_eq!(texts, sorted); // r00..r29 sort lexicographically in order
    }
}
