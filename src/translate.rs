use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::TranslationConfig;
use crate::metrics::{PipelineMetrics, Stage};
use crate::models::Review;

pub const UNKNOWN_LANG: &str = "unknown";
pub const AMHARIC: &str = "amh";

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("translation service returned an empty result")]
    EmptyResult,
}

/// External translation collaborator: (text, source, target) -> translated
/// text, or an error on transient failure.
#[allow(async_fn_in_trait)]
pub trait Translate {
    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, TranslateError>;
}

/// LibreTranslate-style JSON endpoint client.
pub struct HttpTranslator {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

impl HttpTranslator {
    pub fn new(client: Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

impl Translate for HttpTranslator {
    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, TranslateError> {
        let start = std::time::Instant::now();
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "q": text,
                "source": source,
                "target": target,
                "format": "text",
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: TranslateResponse = resp.json().await?;
        if body.translated_text.trim().is_empty() {
            return Err(TranslateError::EmptyResult);
        }
        debug!(
            "Translation call completed - duration={:.2}s, chars={}",
            start.elapsed().as_secs_f32(),
            text.chars().count()
        );
        Ok(body.translated_text)
    }
}

/// Bounded retry around a single review's translation attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

/// Terminal state of one review's pass through the translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationOutcome {
    /// Not in the source language; text untouched.
    PassThrough,
    /// Service call succeeded; text replaced.
    Translated,
    /// Retries exhausted (or no endpoint configured); original text kept.
    FallbackOriginal,
}

/// True when the text carries any code point in the Ethiopic block; script
/// evidence overrides statistical detection.
pub fn contains_ethiopic(text: &str) -> bool {
    text.chars().any(|c| ('\u{1200}'..='\u{137F}').contains(&c))
}

/// Two-step language classification: script heuristic first, then whatlang.
/// Detection failure degrades to "unknown", never an error.
pub fn detect_language(text: &str) -> String {
    if contains_ethiopic(text) {
        return AMHARIC.to_string();
    }
    match whatlang::detect(text) {
        Some(info) => info.lang().code().to_string(),
        None => UNKNOWN_LANG.to_string(),
    }
}

/// Translate with bounded retry and fixed backoff. Exhaustion falls back to
/// the original text; translation failure never drops a review.
pub async fn translate_with_retry<T: Translate>(
    translator: &T,
    text: &str,
    source: &str,
    target: &str,
    policy: RetryPolicy,
) -> (String, TranslationOutcome) {
    for attempt in 1..=policy.max_attempts {
        match translator.translate(text, source, target).await {
            Ok(translated) => {
                debug!("Translated on attempt {}/{}", attempt, policy.max_attempts);
                return (translated, TranslationOutcome::Translated);
            }
            Err(e) => {
                warn!(
                    "Translation attempt {}/{} failed: {}",
                    attempt, policy.max_attempts, e
                );
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }
    (text.to_string(), TranslationOutcome::FallbackOriginal)
}

/// Run detection and conditional translation over every review, strictly in
/// order, with a fixed inter-request delay honoring the service rate limit.
pub async fn translate_reviews<T: Translate>(
    reviews: &mut [Review],
    translator: Option<&T>,
    cfg: &TranslationConfig,
    metrics: &mut PipelineMetrics,
) {
    let policy = RetryPolicy {
        max_attempts: cfg.max_attempts,
        backoff: Duration::from_secs_f64(cfg.backoff_secs),
    };
    let pacing = Duration::from_secs_f64(cfg.pacing_secs);
    let total = reviews.len();

    for (i, review) in reviews.iter_mut().enumerate() {
        review.detected_language = detect_language(&review.text);

        let outcome = if review.detected_language == AMHARIC {
            match translator {
                Some(t) => {
                    let (text, outcome) = translate_with_retry(
                        t,
                        &review.text,
                        &cfg.source_lang,
                        &cfg.target_lang,
                        policy,
                    )
                    .await;
                    review.text = text;
                    outcome
                }
                None => TranslationOutcome::FallbackOriginal,
            }
        } else {
            TranslationOutcome::PassThrough
        };

        let counter = match outcome {
            TranslationOutcome::PassThrough => "pass_through",
            TranslationOutcome::Translated => "translated",
            TranslationOutcome::FallbackOriginal => "fallback_original",
        };
        metrics.incr(Stage::Translate, counter, 1);

        if translator.is_some() && i + 1 < total {
            tokio::time::sleep(pacing).await;
        }
    }

    info!(
        "Translation - pass_through={}, translated={}, fallback_original={}",
        metrics.get(Stage::Translate, "pass_through"),
        metrics.get(Stage::Translate, "translated"),
        metrics.get(Stage::Translate, "fallback_original")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AlwaysFails {
        calls: AtomicU32,
    }

    impl Translate for AlwaysFails {
        async fn translate(
            &self,
            _text: &str,
            _source: &str,
            _target: &str,
        ) -> Result<String, TranslateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(TranslateError::EmptyResult)
        }
    }

    struct SucceedsOnThird {
        calls: AtomicU32,
    }

    impl Translate for SucceedsOnThird {
        async fn translate(
            &self,
            _text: &str,
            _source: &str,
            _target: &str,
        ) -> Result<String, TranslateError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(TranslateError::EmptyResult)
            } else {
                Ok("translated text".to_string())
            }
        }
    }

    fn sample_review(text: &str) -> Review {
        Review {
            id: "t1".into(),
            text: text.to_string(),
            rating: 4,
            date: "2024-01-02".into(),
            bank: "CBE".into(),
            source: "Google Play".into(),
            detected_language: String::new(),
            cleaned: String::new(),
            tokens: Vec::new(),
            themes: Default::default(),
            sentiment_label: None,
            sentiment_score: None,
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn ethiopic_script_forces_amharic() {
        assert_eq!(detect_language("ጥሩ መተግበሪያ"), AMHARIC);
        // even a single Ethiopic code point inside Latin text
        assert_eq!(detect_language("good app ጥ"), AMHARIC);
    }

    #[test]
    fn detection_degrades_to_unknown() {
        assert_eq!(detect_language(""), UNKNOWN_LANG);
    }

    #[tokio::test]
    async fn exhausted_retries_fall_back_to_original_after_three_attempts() {
        let t = AlwaysFails {
            calls: AtomicU32::new(0),
        };
        let (text, outcome) =
            translate_with_retry(&t, "ሰላም", "am", "en", fast_policy()).await;
        assert_eq!(text, "ሰላም");
        assert_eq!(outcome, TranslationOutcome::FallbackOriginal);
        assert_eq!(t.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn late_success_still_translates() {
        let t = SucceedsOnThird {
            calls: AtomicU32::new(0),
        };
        let (text, outcome) =
            translate_with_retry(&t, "ሰላም", "am", "en", fast_policy()).await;
        assert_eq!(text, "translated text");
        assert_eq!(outcome, TranslationOutcome::Translated);
        assert_eq!(t.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_amharic_reviews_pass_through_untouched() {
        let mut metrics = PipelineMetrics::new();
        let mut reviews =
            vec![sample_review("this application is great and i love using it every single day")];
        let cfg = TranslationConfig {
            backoff_secs: 0.001,
            pacing_secs: 0.001,
            ..Default::default()
        };
        let t = AlwaysFails {
            calls: AtomicU32::new(0),
        };
        translate_reviews(&mut reviews, Some(&t), &cfg, &mut metrics).await;
        assert_eq!(
            reviews[0].text,
            "this application is great and i love using it every single day"
        );
        assert_eq!(reviews[0].detected_language, "eng");
        assert_eq!(t.calls.load(Ordering::SeqCst), 0);
        assert_eq!(metrics.get(Stage::Translate, "pass_through"), 1);
    }

    #[tokio::test]
    async fn missing_endpoint_keeps_amharic_text_without_calls() {
        let mut metrics = PipelineMetrics::new();
        let mut reviews = vec![sample_review("ጥሩ መተግበሪያ ነው")];
        let cfg = TranslationConfig::default();
        translate_reviews::<HttpTranslator>(&mut reviews, None, &cfg, &mut metrics).await;
        assert_eq!(reviews[0].text, "ጥሩ መተግበሪያ ነው");
        assert_eq!(reviews[0].detected_language, AMHARIC);
        assert_eq!(metrics.get(Stage::Translate, "fallback_original"), 1);
    }
}
