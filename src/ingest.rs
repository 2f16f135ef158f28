use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_64;

use crate::models::RawReview;

/// Stable id for a review lacking an upstream one.
pub fn make_review_id(text: &str, bank: &str, date: &str) -> String {
    format!("{:016x}", xxh3_64(format!("{}|{}|{}", text, bank, date).as_bytes()))
}

/// Load the raw review collection from CSV. A missing or unreadable input
/// file is the one fatal error in the pipeline.
pub fn load_reviews(path: &Path) -> Result<Vec<RawReview>> {
    let start = std::time::Instant::now();
    debug!("Loading raw reviews from {}", path.display());

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening input file {}", path.display()))?;

    let mut rows = Vec::new();
    for (i, record) in reader.deserialize::<RawReview>().enumerate() {
        let row = record.with_context(|| {
            format!("decoding row {} of {}", i + 1, path.display())
        })?;
        rows.push(row);
    }

    info!(
        "Input loaded - file={}, rows={}, duration={:.2}s",
        path.display(),
        rows.len(),
        start.elapsed().as_secs_f32()
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_id_is_stable() {
        let a = make_review_id("great app", "CBE", "2024-01-02");
        let b = make_review_id("great app", "CBE", "2024-01-02");
        assert_eq!(a, b);
        assert_ne!(a, make_review_id("great app", "BoA", "2024-01-02"));
    }

    #[test]
    fn missing_input_is_fatal() {
        let err = load_reviews(Path::new("/definitely/not/here.csv"));
        assert!(err.is_err());
    }

    #[test]
    fn csv_rows_deserialize_with_optional_fields() {
        let dir = std::env::temp_dir().join("brt_ingest_test");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("rows.csv");
        std::fs::write(
            &file,
            "review,rating,date,bank,source\nLove it,5,2024-01-02,CBE,Google Play\n,,2024-01-03,BoA,\n",
        )
        .unwrap();

        let rows = load_reviews(&file).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].review.as_deref(), Some("Love it"));
        assert_eq!(rows[0].rating, Some(5.0));
        // empty CSV cells come through as empty-or-missing values
        assert!(rows[1].rating.is_none());
    }
}
