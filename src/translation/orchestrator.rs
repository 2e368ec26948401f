/*!
 * Translation orchestration.
 *
 * Segments are translated in fixed-size batches through the backend that
 * the language catalogue routes the target to. Backend trouble never
 * escapes a batch: after the retry budget the batch is returned with the
 * source text and flagged for review.
 */

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::TranslationConfig;
use crate::errors::{ProviderError, TranslationError};
use crate::language_utils::{Route, route_for, supported_codes};
use crate::providers::TranslationBackend;
use crate::translation::segmenter::Segment;

/// Outcome counts of one translation stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslationSummary {
    /// Batches sent (or degraded)
    pub batches: usize,
    /// Segments that received a machine translation
    pub translated: usize,
    /// Segments left untranslated and flagged
    pub flagged: usize,
}

/// Routes segment batches to the primary or secondary backend
#[derive(Debug, Clone)]
pub struct Translator {
    primary: Arc<dyn TranslationBackend>,
    secondary: Arc<dyn TranslationBackend>,
    batch_size: usize,
    max_retries: u32,
    timeout: Duration,
}

impl Translator {
    pub fn new(
        primary: Arc<dyn TranslationBackend>,
        secondary: Arc<dyn TranslationBackend>,
        config: &TranslationConfig,
    ) -> Self {
        Self {
            primary,
            secondary,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            timeout: config.timeout(),
        }
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn backend_for(&self, route: Route) -> Option<&Arc<dyn TranslationBackend>> {
        let backend = match route {
            Route::Primary => &self.primary,
            Route::Secondary => &self.secondary,
            Route::Degrade => return None,
        };
        if backend.is_available() { Some(backend) } else { None }
    }

    /// Translate every segment in place.
    ///
    /// Fails only when the target language is unsupported.
    pub async fn translate_segments(
        &self,
        segments: &mut [Segment],
        source_language: &str,
        target_language: &str,
    ) -> Result<TranslationSummary, TranslationError> {
        let route = route_for(target_language).ok_or_else(|| TranslationError::UnsupportedLanguage {
            code: target_language.to_string(),
            supported: supported_codes(),
        })?;

        let mut summary = TranslationSummary::default();
        if segments.is_empty() {
            return Ok(summary);
        }

        let backend = self.backend_for(route);
        match backend {
            Some(b) => info!(
                "Translating {} segments to '{}' via {} ({} route)",
                segments.len(),
                target_language,
                b.name(),
                route
            ),
            None => warn!(
                "No backend available for '{}' ({} route); segments will be flagged for review",
                target_language, route
            ),
        }

        for (batch_index, batch) in segments.chunks_mut(self.batch_size).enumerate() {
            summary.batches += 1;

            let Some(backend) = backend else {
                flag_batch(batch);
                summary.flagged += batch.len();
                continue;
            };

            match self
                .translate_batch(backend.as_ref(), batch, source_language, target_language)
                .await
            {
                Ok(translations) => {
                    for (segment, translation) in batch.iter_mut().zip(translations) {
                        segment.translated = Some(translation);
                    }
                    summary.translated += batch.len();
                    debug!("Batch {} translated ({} segments)", batch_index + 1, batch.len());
                }
                Err(e) => {
                    warn!(
                        "Batch {} of {} segments flagged for review: {}",
                        batch_index + 1,
                        batch.len(),
                        e
                    );
                    flag_batch(batch);
                    summary.flagged += batch.len();
                }
            }
        }

        Ok(summary)
    }

    /// One batch with retries. Errors mean the batch must be degraded.
    async fn translate_batch(
        &self,
        backend: &dyn TranslationBackend,
        batch: &[Segment],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let texts: Vec<String> = batch.iter().map(|s| s.text.clone()).collect();
        let mut attempt = 0;

        loop {
            let result = match tokio::time::timeout(
                self.timeout,
                backend.translate(&texts, source_language, target_language),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.timeout.as_secs())),
            };

            match result {
                Ok(translations) if translations.len() == texts.len() => return Ok(translations),
                Ok(translations) => {
                    return Err(ProviderError::ParseError(format!(
                        "expected {} translations, got {}",
                        texts.len(),
                        translations.len()
                    )));
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "{} attempt {} failed ({}), retrying",
                        backend.name(),
                        attempt,
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn flag_batch(batch: &mut [Segment]) {
    for segment in batch.iter_mut() {
        segment.flag_untranslated();
    }
}
