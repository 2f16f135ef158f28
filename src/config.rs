use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Top-level pipeline configuration, loaded from YAML. Every knob has a
/// default so an empty file (or no file) is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub balance: BalanceConfig,
    pub translation: TranslationConfig,
    pub keywords: KeywordConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// Soft per-bank sample target; under-target banks are kept whole.
    pub target_count: usize,
    /// Seed for the balancer's RNG so runs are reproducible.
    pub seed: u64,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            target_count: 400,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Translation service endpoint (LibreTranslate-style JSON API). When
    /// unset, detection still runs but no network calls are made and Amharic
    /// reviews keep their original text.
    pub endpoint: Option<String>,
    pub source_lang: String,
    pub target_lang: String,
    pub max_attempts: u32,
    pub backoff_secs: f64,
    /// Inter-request spacing honoring the service's rate limit.
    pub pacing_secs: f64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            source_lang: "am".to_string(),
            target_lang: "en".to_string(),
            max_attempts: 3,
            backoff_secs: 1.0,
            pacing_secs: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub ngram_min: usize,
    pub ngram_max: usize,
    pub max_features: usize,
    pub top_k: usize,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            ngram_min: 1,
            ngram_max: 2,
            max_features: 100,
            top_k: 20,
        }
    }
}

/// Load config from a YAML file, or fall back to defaults when no path is
/// given.
pub fn load_config(path: Option<&str>) -> Result<PipelineConfig> {
    match path {
        Some(p) => {
            debug!("Loading config from {}", p);
            let raw = std::fs::read_to_string(Path::new(p))
                .with_context(|| format!("reading config file {}", p))?;
            let cfg: PipelineConfig =
                serde_yaml::from_str(&raw).with_context(|| format!("parsing config file {}", p))?;
            Ok(cfg)
        }
        None => {
            debug!("No config file given, using defaults");
            Ok(PipelineConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behavior() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.balance.target_count, 400);
        assert_eq!(cfg.translation.max_attempts, 3);
        assert_eq!(cfg.keywords.ngram_max, 2);
        assert_eq!(cfg.keywords.top_k, 20);
    }

    #[test]
    fn partial_yaml_overlayers_defaults() {
        let cfg: PipelineConfig =
            serde_yaml::from_str("balance:\n  target_count: 50\n").unwrap();
        assert_eq!(cfg.balance.target_count, 50);
        assert_eq!(cfg.balance.seed, 42);
        assert_eq!(cfg.keywords.max_features, 100);
    }
}
