use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::models::{Keyword, Review};
use crate::themes::{themes_display, Theme};

/// Row of the processed dataset.
#[derive(Debug, Serialize)]
pub struct ProcessedRecord<'a> {
    pub review: &'a str,
    pub tokens: String,
    pub rating: i64,
    pub date: &'a str,
    pub bank: &'a str,
    pub source: &'a str,
    pub detected_language: &'a str,
}

/// Row of the thematic dataset handed to the persistence consumer.
#[derive(Debug, Serialize)]
pub struct ThematicRecord<'a> {
    pub review_id: &'a str,
    pub review: &'a str,
    pub sentiment_label: Option<&'a str>,
    pub sentiment_score: Option<f64>,
    pub rating: i64,
    pub date: &'a str,
    pub bank: &'a str,
    pub source: &'a str,
    pub themes: String,
}

pub fn write_processed_csv(path: &Path, reviews: &[Review]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for r in reviews {
        writer.serialize(ProcessedRecord {
            review: &r.cleaned,
            tokens: r.tokens.join(" "),
            rating: r.rating,
            date: &r.date,
            bank: &r.bank,
            source: &r.source,
            detected_language: &r.detected_language,
        })?;
    }
    writer.flush()?;
    debug!("Wrote {}", path.display());
    Ok(())
}

pub fn write_thematic_csv(path: &Path, reviews: &[Review]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for r in reviews {
        writer.serialize(ThematicRecord {
            review_id: &r.id,
            review: &r.cleaned,
            sentiment_label: r.sentiment_label.as_deref(),
            sentiment_score: r.sentiment_score,
            rating: r.rating,
            date: &r.date,
            bank: &r.bank,
            source: &r.source,
            themes: themes_display(r),
        })?;
    }
    writer.flush()?;
    debug!("Wrote {}", path.display());
    Ok(())
}

pub fn write_keywords_json(
    path: &Path,
    keywords: &[(String, Vec<Keyword>)],
) -> Result<()> {
    let map: BTreeMap<&str, &Vec<Keyword>> = keywords
        .iter()
        .map(|(bank, kws)| (bank.as_str(), kws))
        .collect();
    std::fs::write(path, serde_json::to_vec_pretty(&map)?)
        .with_context(|| format!("writing {}", path.display()))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

pub fn write_themes_json(
    path: &Path,
    theme_maps: &BTreeMap<String, BTreeMap<Theme, Vec<String>>>,
) -> Result<()> {
    // theme enum -> display names for the artifact
    let named: BTreeMap<&str, BTreeMap<&str, &Vec<String>>> = theme_maps
        .iter()
        .map(|(bank, tm)| {
            (
                bank.as_str(),
                tm.iter().map(|(t, kws)| (t.name(), kws)).collect(),
            )
        })
        .collect();
    std::fs::write(path, serde_json::to_vec_pretty(&named)?)
        .with_context(|| format!("writing {}", path.display()))?;
    debug!("Wrote {}", path.display());
    Ok(())
}
