use deunicode::deunicode;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use std::collections::HashSet;
use tracing::info;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::metrics::{PipelineMetrics, Stage};
use crate::models::Review;

// Loaded once, read-only for the rest of the process.
static STOPWORDS: Lazy<HashSet<String>> = Lazy::new(|| {
    stop_words::get(stop_words::LANGUAGE::English)
        .into_iter()
        .collect()
});

static EMOJI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{Emoji_Presentation}\p{Extended_Pictographic}]").expect("emoji pattern")
});

/// Tokenize a review into lowercase alphabetic tokens with stopwords and
/// diacritics removed. Deterministic and stateless per review; a review that
/// is all noise legitimately tokenizes to nothing.
pub fn tokenize(text: &str) -> Vec<String> {
    let no_emoji = EMOJI_RE.replace_all(text, " ");

    // NFKD, drop combining marks, then transliterate what is left to ASCII.
    let decomposed: String = no_emoji.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let ascii = deunicode(&decomposed);

    let spaced: String = ascii
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    spaced
        .split_whitespace()
        .filter(|t| t.chars().all(|c| c.is_ascii_alphabetic()))
        .filter(|t| !STOPWORDS.contains(*t))
        .map(str::to_string)
        .collect()
}

/// Cleaned form of a review: its tokens re-joined with single spaces.
pub fn clean_text(text: &str) -> String {
    tokenize(text).join(" ")
}

/// Fill `cleaned` and `tokens` on every review. Each review is independent,
/// so this runs in parallel.
pub fn clean_reviews(reviews: &mut [Review], metrics: &mut PipelineMetrics) {
    reviews.par_iter_mut().for_each(|r| {
        r.tokens = tokenize(&r.text);
        r.cleaned = r.tokens.join(" ");
    });

    let empty = reviews.iter().filter(|r| r.cleaned.is_empty()).count();
    metrics.incr(Stage::Clean, "cleaned", reviews.len() as u64);
    metrics.incr(Stage::Clean, "emptied", empty as u64);
    info!("Cleaning - reviews={}, emptied={}", reviews.len(), empty);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_emoji_and_punctuation() {
        assert_eq!(clean_text("Love it! 😍🔥"), "love");
    }

    #[test]
    fn strips_diacritics() {
        assert_eq!(clean_text("résumé café"), "resume cafe");
    }

    #[test]
    fn removes_stopwords_and_numbers() {
        let tokens = tokenize("the app is slow 100 times");
        assert!(!tokens.contains(&"the".to_string()));
        assert!(!tokens.contains(&"is".to_string()));
        assert!(!tokens.iter().any(|t| t.chars().any(|c| c.is_ascii_digit())));
        assert!(tokens.contains(&"slow".to_string()));
    }

    #[test]
    fn cleaning_is_idempotent() {
        let once = clean_text("Transfers FAIL constantly... 😡 très mauvais!!");
        let twice = clean_text(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn pure_noise_cleans_to_empty() {
        assert_eq!(clean_text("!!! ... 🤷"), "");
        assert_eq!(tokenize("the a an of"), Vec::<String>::new());
    }
}
