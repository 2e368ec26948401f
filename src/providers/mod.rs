/*!
 * Provider implementations for the external translation and scoring services.
 *
 * This module contains client implementations for:
 * - Anthropic: primary translation backend and quality scorer
 * - Google Cloud Translation: secondary backend for limited languages
 * - Mock: scripted backends for tests
 */

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Debug;

use crate::errors::ProviderError;
use crate::translation::quality::QualityScore;

/// Machine translation of one batch of segment texts
///
/// Implementations must answer with exactly one translation per input text,
/// in the same order. Anything else is treated as malformed output.
#[async_trait]
pub trait TranslationBackend: Send + Sync + Debug {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Whether the backend can be called at all (e.g. a credential is set)
    fn is_available(&self) -> bool {
        true
    }

    /// Translate a batch of texts
    ///
    /// # Arguments
    /// * `texts` - Segment texts in order
    /// * `source_language` - ISO 639-1 source code
    /// * `target_language` - ISO 639-1 target code
    async fn translate(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>, ProviderError>;
}

/// Automated quality evaluation of one translated segment
#[async_trait]
pub trait ScoringBackend: Send + Sync + Debug {
    /// Whether the backend can be called at all
    fn is_available(&self) -> bool {
        true
    }

    /// Score a translation of `original` into `target_language`
    async fn score(
        &self,
        original: &str,
        translated: &str,
        target_language: &str,
    ) -> Result<QualityScore, ProviderError>;
}

/// Fenced code block, optionally tagged `json`
static FENCED_BLOCK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:json)?\s*([\s\S]*?)```").unwrap()
});

/// Extract a JSON object from an LLM answer.
///
/// Accepts bare JSON, fenced code blocks, or the span between the first `{`
/// and the last `}`.
pub fn extract_json(response: &str) -> Result<String, ProviderError> {
    let trimmed = response.trim();

    if trimmed.starts_with('{') {
        return Ok(trimmed.to_string());
    }

    if let Some(block) = FENCED_BLOCK_REGEX.captures(trimmed).and_then(|c| c.get(1)) {
        let json = block.as_str().trim();
        if json.starts_with('{') {
            return Ok(json.to_string());
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            return Ok(trimmed[start..=end].to_string());
        }
    }

    Err(ProviderError::ParseError(
        "Could not extract JSON from response".to_string(),
    ))
}

pub mod anthropic;
pub mod google;
pub mod mock;
