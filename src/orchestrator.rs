use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::Client;
use std::path::Path;
use tracing::{debug, info};

use crate::clean::clean_reviews;
use crate::config::PipelineConfig;
use crate::ingest::load_reviews;
use crate::keywords::extract_per_bank;
use crate::metrics::PipelineMetrics;
use crate::models::Review;
use crate::output::{
    write_keywords_json, write_processed_csv, write_thematic_csv, write_themes_json,
};
use crate::preprocess::{balance, dedup, normalize_dates, repair};
use crate::render::render_summary;
use crate::themes::classify;
use crate::translate::{translate_reviews, HttpTranslator};

/// Banks in first-appearance order, with each bank's cleaned texts.
fn group_docs(reviews: &[Review]) -> Vec<(String, Vec<&str>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<&str>> =
        std::collections::HashMap::new();
    for r in reviews {
        groups
            .entry(r.bank.clone())
            .or_insert_with(|| {
                order.push(r.bank.clone());
                Vec::new()
            })
            .push(r.cleaned.as_str());
    }
    order
        .into_iter()
        .map(|bank| {
            let docs = groups.remove(&bank).unwrap_or_default();
            (bank, docs)
        })
        .collect()
}

pub async fn run_pipeline(
    cfg: &PipelineConfig,
    input: &Path,
    output_dir: &Path,
    run_date: &str,
) -> Result<()> {
    let pipeline_start = std::time::Instant::now();
    info!("Pipeline started - input={}", input.display());

    let mut metrics = PipelineMetrics::new();

    // 1) ingest (the only fatal failure)
    let raw = load_reviews(input)?;

    // 2) preprocessing: dedup -> repair -> dates -> balance
    let rows = dedup(raw, &mut metrics);
    let rows = repair(rows, &mut metrics);
    let rows = normalize_dates(rows, &mut metrics);
    let mut rng = StdRng::seed_from_u64(cfg.balance.seed);
    let mut reviews = balance(rows, cfg.balance.target_count, &mut rng, &mut metrics);
    info!("Preprocessing completed - reviews={}", reviews.len());

    // 3) language detection + conditional translation, strictly in order
    let translate_start = std::time::Instant::now();
    let translator = cfg.translation.endpoint.as_ref().map(|endpoint| {
        HttpTranslator::new(Client::new(), endpoint.clone())
    });
    translate_reviews(
        &mut reviews,
        translator.as_ref(),
        &cfg.translation,
        &mut metrics,
    )
    .await;
    info!(
        "Translation completed - duration={:.2}s",
        translate_start.elapsed().as_secs_f32()
    );

    // 4) cleaning and tokenization (parallel per review)
    clean_reviews(&mut reviews, &mut metrics);

    // 5) per-bank keyword extraction
    let keyword_start = std::time::Instant::now();
    let banks = group_docs(&reviews);
    let bank_keywords = extract_per_bank(&banks, &cfg.keywords);
    info!(
        "Keyword extraction completed - duration={:.2}s, banks={}",
        keyword_start.elapsed().as_secs_f32(),
        bank_keywords.len()
    );

    // 6) theme clustering and review tagging
    let terms: Vec<(String, Vec<String>)> = bank_keywords
        .iter()
        .map(|(bank, kws)| {
            (
                bank.clone(),
                kws.iter().map(|k| k.term.clone()).collect(),
            )
        })
        .collect();
    let theme_maps = classify(&mut reviews, &terms, &mut metrics);

    // 7) persist to a date-scoped directory
    let date_dir = output_dir.join(run_date);
    std::fs::create_dir_all(&date_dir)
        .with_context(|| format!("creating output directory {}", date_dir.display()))?;
    debug!("Output directory: {}", date_dir.display());

    write_processed_csv(&date_dir.join("reviews_processed.csv"), &reviews)?;
    write_thematic_csv(&date_dir.join("reviews_thematic.csv"), &reviews)?;
    write_keywords_json(&date_dir.join("keywords.json"), &bank_keywords)?;
    write_themes_json(&date_dir.join("themes.json"), &theme_maps)?;
    std::fs::write(
        date_dir.join("metrics.json"),
        serde_json::to_vec_pretty(&metrics)?,
    )?;
    std::fs::write(
        date_dir.join("summary.md"),
        render_summary(&reviews, &metrics),
    )?;

    info!(
        "Pipeline completed - total_duration={:.2}s, reviews={}, banks={}, output={}",
        pipeline_start.elapsed().as_secs_f32(),
        reviews.len(),
        theme_maps.len(),
        date_dir.display()
    );
    Ok(())
}
