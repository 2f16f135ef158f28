use itertools::Itertools;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::KeywordConfig;
use crate::models::Keyword;

/// Minimum documents a bank needs before term weighting says anything.
pub const MIN_GROUP_SIZE: usize = 2;

fn ngrams(tokens: &[String], min_n: usize, max_n: usize) -> Vec<String> {
    let mut out = Vec::new();
    for n in min_n..=max_n {
        if n == 0 || tokens.len() < n {
            continue;
        }
        for window in tokens.windows(n) {
            out.push(window.join(" "));
        }
    }
    out
}

/// Rank one bank's cleaned review texts by mean TF-IDF weight.
///
/// Mirrors the usual vectorizer conventions: vocabulary capped to the
/// `max_features` most frequent terms, smoothed IDF `ln((1+n)/(1+df)) + 1`,
/// per-document L2 normalization, then the document-mean weight. Ties sort
/// alphabetically because the feature ordering is alphabetical. Banks with
/// fewer than two documents get an empty list.
pub fn extract_keywords(docs: &[&str], cfg: &KeywordConfig) -> Vec<Keyword> {
    if docs.len() < MIN_GROUP_SIZE {
        return Vec::new();
    }

    let tokenized: Vec<Vec<String>> = docs
        .iter()
        .map(|d| d.split_whitespace().map(str::to_string).collect())
        .collect();

    let doc_grams: Vec<Vec<String>> = tokenized
        .iter()
        .map(|t| ngrams(t, cfg.ngram_min, cfg.ngram_max))
        .collect();

    // corpus frequency and document frequency per candidate term
    let mut corpus_freq: HashMap<&str, usize> = HashMap::new();
    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for grams in &doc_grams {
        for g in grams {
            *corpus_freq.entry(g).or_insert(0) += 1;
        }
        for g in grams.iter().unique() {
            *doc_freq.entry(g).or_insert(0) += 1;
        }
    }

    // vocabulary: top max_features by corpus frequency, then alphabetical
    let vocab: Vec<&str> = corpus_freq
        .iter()
        .sorted_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)))
        .take(cfg.max_features)
        .map(|(term, _)| *term)
        .sorted()
        .collect();
    let vocab_index: HashMap<&str, usize> = vocab
        .iter()
        .enumerate()
        .map(|(i, t)| (*t, i))
        .collect();

    let n_docs = docs.len() as f64;
    let idf: Vec<f64> = vocab
        .iter()
        .map(|t| {
            let df = doc_freq[*t] as f64;
            ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0
        })
        .collect();

    // mean of L2-normalized tf-idf vectors over documents
    let mut mean = vec![0.0f64; vocab.len()];
    for grams in &doc_grams {
        let mut tf = vec![0.0f64; vocab.len()];
        for g in grams {
            if let Some(&i) = vocab_index.get(g.as_str()) {
                tf[i] += 1.0;
            }
        }
        let mut weights: Vec<f64> = tf.iter().zip(&idf).map(|(t, i)| t * i).collect();
        let norm = weights.iter().map(|w| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for w in weights.iter_mut() {
                *w /= norm;
            }
        }
        for (m, w) in mean.iter_mut().zip(&weights) {
            *m += w / n_docs;
        }
    }

    // descending weight; stable sort keeps the alphabetical order on ties
    let ranked: Vec<Keyword> = vocab
        .iter()
        .zip(&mean)
        .sorted_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal))
        .take(cfg.top_k)
        .map(|(term, weight)| Keyword {
            term: term.to_string(),
            weight: *weight,
        })
        .collect();

    debug!(
        "Keyword ranking - docs={}, vocabulary={}, returned={}",
        docs.len(),
        vocab.len(),
        ranked.len()
    );
    ranked
}

/// Per-bank keyword extraction over cleaned texts. Banks are independent, so
/// extraction runs in parallel; a failure for one bank never aborts another.
pub fn extract_per_bank(
    banks: &[(String, Vec<&str>)],
    cfg: &KeywordConfig,
) -> Vec<(String, Vec<Keyword>)> {
    use rayon::prelude::*;

    let out: Vec<(String, Vec<Keyword>)> = banks
        .par_iter()
        .map(|(bank, docs)| {
            if docs.len() < MIN_GROUP_SIZE {
                info!("Skipping bank {} - insufficient reviews ({})", bank, docs.len());
                return (bank.clone(), Vec::new());
            }
            (bank.clone(), extract_keywords(docs, cfg))
        })
        .collect();

    for (bank, kws) in &out {
        let head: Vec<&str> = kws.iter().take(10).map(|k| k.term.as_str()).collect();
        info!("Keywords for {} - top={:?}", bank, head);
    }
    out
}
