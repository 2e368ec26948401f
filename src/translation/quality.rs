/*!
 * Automated quality scoring of translated segments.
 *
 * Scoring is advisory. A segment whose score cannot be obtained simply has
 * no score; only a valid score below the threshold marks it for review.
 */

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::ScoringConfig;
use crate::errors::ProviderError;
use crate::providers::ScoringBackend;
use crate::translation::segmenter::Segment;

const MIN_SCORE: f64 = 1.0;
const MAX_SCORE: f64 = 5.0;

/// Score returned by a scoring backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub overall: f64,
    pub fluency: f64,
    pub accuracy: f64,
    #[serde(default)]
    pub flags: Vec<String>,
}

fn numeric_field(value: &Value, field: &str) -> Result<f64, ProviderError> {
    match value.get(field) {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ProviderError::ParseError(format!("'{}' is not a finite number", field))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ProviderError::ParseError(format!("'{}' is not numeric: {}", field, s))),
        Some(other) => Err(ProviderError::ParseError(format!("'{}' has unexpected value {}", field, other))),
        None => Err(ProviderError::ParseError(format!("missing '{}'", field))),
    }
}

impl QualityScore {
    /// Build a score from the scorer's JSON answer.
    ///
    /// Numbers given as numeric strings are accepted. Missing, null or
    /// non-numeric fields are parse errors.
    pub fn from_json(value: &Value) -> Result<Self, ProviderError> {
        if !value.is_object() {
            return Err(ProviderError::ParseError("score is not a JSON object".to_string()));
        }

        let flags = match value.get("flags") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            overall: numeric_field(value, "overall")?,
            fluency: numeric_field(value, "fluency")?,
            accuracy: numeric_field(value, "accuracy")?,
            flags,
        })
    }

    /// Every dimension is finite and within 1-5
    pub fn is_valid(&self) -> bool {
        [self.overall, self.fluency, self.accuracy]
            .iter()
            .all(|v| v.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(v))
    }

    pub fn needs_review(&self, threshold: f64) -> bool {
        self.overall < threshold
    }
}

/// Score recorded for one segment of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentScore {
    pub index: usize,
    pub overall: f64,
    pub fluency: f64,
    pub accuracy: f64,
    pub flags: Vec<String>,
    pub needs_review: bool,
}

/// Scores translated segments through a scoring backend
#[derive(Clone)]
pub struct QualityScorer {
    backend: Option<Arc<dyn ScoringBackend>>,
    threshold: f64,
    max_retries: u32,
    timeout: Duration,
}

impl std::fmt::Debug for QualityScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityScorer")
            .field("enabled", &self.is_enabled())
            .field("threshold", &self.threshold)
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl QualityScorer {
    pub fn new(backend: Arc<dyn ScoringBackend>, config: &ScoringConfig) -> Self {
        Self {
            backend: if config.enabled { Some(backend) } else { None },
            threshold: config.threshold,
            max_retries: config.max_retries,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// A scorer that never produces scores
    pub fn disabled() -> Self {
        Self {
            backend: None,
            threshold: 3.0,
            max_retries: 0,
            timeout: Duration::from_secs(30),
        }
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.is_available())
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score one translation. `None` when no valid score could be obtained.
    pub async fn score_segment(&self, original: &str, translated: &str, target_language: &str) -> Option<QualityScore> {
        let backend = self.backend.as_ref().filter(|b| b.is_available())?;

        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(
                self.timeout,
                backend.score(original, translated, target_language),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.timeout.as_secs())),
            };

            match result {
                Ok(score) if score.is_valid() => return Some(score),
                Ok(score) => {
                    warn!(
                        "Quality scoring returned out-of-range values ({}, {}, {}) for {}",
                        score.overall, score.fluency, score.accuracy, target_language
                    );
                    return None;
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    debug!("Quality scoring attempt {} failed ({}), retrying", attempt, e);
                }
                Err(e) => {
                    warn!("Quality scoring failed for translation to {}: {}", target_language, e);
                    return None;
                }
            }
        }
    }

    /// Score every translated segment not already flagged by translation.
    ///
    /// Segments scoring below the threshold are marked `needs_review`.
    pub async fn score_segments(&self, segments: &mut [Segment], target_language: &str) -> Vec<SegmentScore> {
        let mut scores = Vec::new();
        if !self.is_enabled() {
            debug!("Quality scoring disabled, skipping {} segments", segments.len());
            return scores;
        }

        for segment in segments.iter_mut() {
            if segment.needs_review {
                continue;
            }
            let Some(translated) = segment.translated.clone() else {
                continue;
            };

            if let Some(score) = self.score_segment(&segment.text, &translated, target_language).await {
                let needs_review = score.needs_review(self.threshold);
                if needs_review {
                    segment.needs_review = true;
                }
                scores.push(SegmentScore {
                    index: segment.index,
                    overall: score.overall,
                    fluency: score.fluency,
                    accuracy: score.accuracy,
                    flags: score.flags,
                    needs_review,
                });
            }
        }

        scores
    }
}
