/*!
 * Mock backend implementations for testing.
 *
 * This module provides mock backends that simulate different behaviors:
 * - `MockBackend::working()` - Always succeeds with one translation per text
 * - `MockBackend::wrong_length()` - Returns one translation too few
 * - `MockBackend::failing()` - Always fails with a transient server error
 * - `MockScorer` - Returns fixed, malformed or slow scores
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::ProviderError;
use crate::providers::{ScoringBackend, TranslationBackend};
use crate::translation::quality::QualityScore;

/// Behavior mode for the mock translation backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with `[target] text` per input
    Working,
    /// Succeeds with one translation fewer than requested
    WrongLength,
    /// Answers with output that cannot be parsed
    Malformed,
    /// Always fails with a 500
    Failing,
    /// Fails the first N requests with a 503, then works
    FailFirst { failures: usize },
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
    /// Reports itself unavailable (no credential)
    Unavailable,
}

/// Mock backend for testing translation behavior
#[derive(Debug, Clone)]
pub struct MockBackend {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter, shared between clones
    request_count: Arc<AtomicUsize>,
    /// Every batch received, shared between clones
    received: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockBackend {
    /// Create a new mock backend with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a working mock backend that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock returning one translation too few
    pub fn wrong_length() -> Self {
        Self::new(MockBehavior::WrongLength)
    }

    /// Create a failing mock backend that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create an unavailable mock backend
    pub fn unavailable() -> Self {
        Self::new(MockBehavior::Unavailable)
    }

    /// Number of translate calls made so far
    pub fn call_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Batches received so far
    pub fn received_batches(&self) -> Vec<Vec<String>> {
        self.received.lock().clone()
    }

    /// Translation produced by the working behavior
    pub fn translation_of(text: &str, target_language: &str) -> String {
        format!("[{}] {}", target_language, text)
    }

    fn translate_all(texts: &[String], target_language: &str) -> Vec<String> {
        texts.iter().map(|t| Self::translation_of(t, target_language)).collect()
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn is_available(&self) -> bool {
        self.behavior != MockBehavior::Unavailable
    }

    async fn translate(
        &self,
        texts: &[String],
        _source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.received.lock().push(texts.to_vec());

        match self.behavior {
            MockBehavior::Working => Ok(Self::translate_all(texts, target_language)),

            MockBehavior::WrongLength => {
                let mut translations = Self::translate_all(texts, target_language);
                translations.pop();
                Ok(translations)
            }

            MockBehavior::Malformed => Err(ProviderError::ParseError(
                "Simulated unparsable response".to_string(),
            )),

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::FailFirst { failures } => {
                if count < failures {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(Self::translate_all(texts, target_language))
                }
            }

            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(Self::translate_all(texts, target_language))
                }
            }

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Ok(Self::translate_all(texts, target_language))
            }

            MockBehavior::Unavailable => Err(ProviderError::Unavailable(
                "Simulated missing credential".to_string(),
            )),
        }
    }
}

/// Behavior mode for the mock scorer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockScoreBehavior {
    /// Always returns the given score
    Fixed { overall: f64, fluency: f64, accuracy: f64 },
    /// Answers with output that cannot be parsed
    Malformed,
    /// Always fails with a 503
    Failing,
    /// Sleeps before answering a passing score
    Slow { delay_ms: u64 },
}

/// Mock scoring backend
#[derive(Debug, Clone)]
pub struct MockScorer {
    behavior: MockScoreBehavior,
    request_count: Arc<AtomicUsize>,
}

impl MockScorer {
    pub fn new(behavior: MockScoreBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A scorer that passes everything with 4/5
    pub fn passing() -> Self {
        Self::new(MockScoreBehavior::Fixed { overall: 4.0, fluency: 4.0, accuracy: 4.0 })
    }

    pub fn call_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoringBackend for MockScorer {
    async fn score(
        &self,
        _original: &str,
        _translated: &str,
        _target_language: &str,
    ) -> Result<QualityScore, ProviderError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            MockScoreBehavior::Fixed { overall, fluency, accuracy } => Ok(QualityScore {
                overall,
                fluency,
                accuracy,
                flags: Vec::new(),
            }),
            MockScoreBehavior::Malformed => Err(ProviderError::ParseError(
                "Simulated invalid score output".to_string(),
            )),
            MockScoreBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated scorer failure".to_string(),
                status_code: 503,
            }),
            MockScoreBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Ok(QualityScore {
                    overall: 4.0,
                    fluency: 4.0,
                    accuracy: 4.0,
                    flags: Vec::new(),
                })
            }
        }
    }
}
