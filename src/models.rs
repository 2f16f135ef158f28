use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::themes::Theme;

/// Raw record as emitted by the review collector. Every field the collector
/// may omit is optional; the Repairer decides what gets defaulted and what
/// gets dropped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReview {
    pub review: Option<String>,
    pub rating: Option<f64>,
    pub date: Option<String>,
    pub bank: Option<String>,
    pub source: Option<String>,
    /// Upstream id, when the sentiment stage already assigned one.
    #[serde(default)]
    pub review_id: Option<String>,
    /// Sentiment fields are computed by an external collaborator and pass
    /// through this pipeline unmodified.
    #[serde(default)]
    pub sentiment_label: Option<String>,
    #[serde(default)]
    pub sentiment_score: Option<f64>,
}

/// Working record flowing through the pipeline after repair. Required fields
/// are no longer optional; derived fields start empty and are filled in by
/// the translation, cleaning, and theme stages.
#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: String,
    pub text: String,
    pub rating: i64,
    pub date: String, // canonical YYYY-MM-DD after date normalization
    pub bank: String,
    pub source: String,
    pub detected_language: String,
    pub cleaned: String,
    pub tokens: Vec<String>,
    pub themes: BTreeSet<Theme>,
    pub sentiment_label: Option<String>,
    pub sentiment_score: Option<f64>,
}

/// A ranked term scoped to one bank's corpus; recomputed each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    pub term: String,
    pub weight: f64,
}
