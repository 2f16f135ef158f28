use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::metrics::{PipelineMetrics, Stage};
use crate::models::Review;

/// Sentinel emitted for reviews matching no theme.
pub const NO_THEME: &str = "No Theme";

/// Fixed theme taxonomy. Variant order is the clustering priority order and
/// the serialization order of a review's theme set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Theme {
    AccountAccess,
    TransactionPerformance,
    InterfaceExperience,
    CustomerSupport,
}

impl Theme {
    pub const ALL: [Theme; 4] = [
        Theme::AccountAccess,
        Theme::TransactionPerformance,
        Theme::InterfaceExperience,
        Theme::CustomerSupport,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Theme::AccountAccess => "Account Access Issues",
            Theme::TransactionPerformance => "Transaction Performance",
            Theme::InterfaceExperience => "User Interface & Experience",
            Theme::CustomerSupport => "Customer Support",
        }
    }

    fn triggers(self) -> &'static [&'static str] {
        match self {
            Theme::AccountAccess => {
                &["login", "access", "password", "authentication", "account", "error"]
            }
            Theme::TransactionPerformance => {
                &["transfer", "payment", "transaction", "slow", "delay", "failed"]
            }
            Theme::InterfaceExperience => {
                &["interface", "ui", "design", "easy", "navigation", "app"]
            }
            Theme::CustomerSupport => &["support", "service", "help", "response", "customer"],
        }
    }
}

/// Assign each keyword to the first theme with a matching trigger substring.
/// Assignment is mutually exclusive; unmatched keywords are dropped and
/// themes left empty are omitted from the map.
pub fn cluster_keywords(keywords: &[String]) -> BTreeMap<Theme, Vec<String>> {
    let mut themes: BTreeMap<Theme, Vec<String>> = BTreeMap::new();
    for kw in keywords {
        let lower = kw.to_lowercase();
        for theme in Theme::ALL {
            if theme.triggers().iter().any(|t| lower.contains(t)) {
                themes.entry(theme).or_default().push(kw.clone());
                break;
            }
        }
    }
    themes
}

fn theme_pattern(keywords: &[String]) -> Option<Regex> {
    if keywords.is_empty() {
        return None;
    }
    let alternation = keywords
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    match Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)) {
        Ok(re) => Some(re),
        Err(e) => {
            // one bad pattern must not abort the other themes
            warn!("Skipping theme pattern: {}", e);
            None
        }
    }
}

/// Tag every review in one bank with each theme whose keyword pattern matches
/// the review's cleaned text.
pub fn tag_reviews(
    reviews: &mut [Review],
    bank: &str,
    theme_map: &BTreeMap<Theme, Vec<String>>,
    metrics: &mut PipelineMetrics,
) {
    let patterns: Vec<(Theme, Regex)> = theme_map
        .iter()
        .filter_map(|(theme, kws)| theme_pattern(kws).map(|re| (*theme, re)))
        .collect();

    let mut tagged = 0u64;
    for review in reviews.iter_mut().filter(|r| r.bank == bank) {
        for (theme, re) in &patterns {
            if re.is_match(&review.cleaned) {
                review.themes.insert(*theme);
            }
        }
        if !review.themes.is_empty() {
            tagged += 1;
        }
    }
    metrics.incr(Stage::Themes, "tagged", tagged);
    debug!("Theme tagging - bank={}, tagged={}", bank, tagged);
}

/// Display form of a review's theme set: semicolon-joined names, or the
/// sentinel when nothing matched.
pub fn themes_display(review: &Review) -> String {
    if review.themes.is_empty() {
        NO_THEME.to_string()
    } else {
        review
            .themes
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Cluster and tag per bank. Keyword lists arrive per bank from the
/// extractor; the resulting theme maps are returned for the artifact output.
pub fn classify(
    reviews: &mut [Review],
    bank_keywords: &[(String, Vec<String>)],
    metrics: &mut PipelineMetrics,
) -> BTreeMap<String, BTreeMap<Theme, Vec<String>>> {
    let mut all_maps = BTreeMap::new();
    for (bank, keywords) in bank_keywords {
        let theme_map = cluster_keywords(keywords);
        info!(
            "Themes for {} - {:?}",
            bank,
            theme_map
                .iter()
                .map(|(t, kws)| (t.name(), kws.len()))
                .collect::<Vec<_>>()
        );
        tag_reviews(reviews, bank, &theme_map, metrics);
        all_maps.insert(bank.clone(), theme_map);
    }
    all_maps
}
