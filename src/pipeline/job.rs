/*!
 * Translation job model and lifecycle state machine.
 *
 * A job moves `queued → translating → machine_translated → scoring` and
 * then to `complete` (instant tier) or `in_review`. Human review moves it
 * on to `reviewed` or `complete`. `failed` is reachable from every
 * in-progress state, and `translating` may be re-entered to retry.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::JobError;
use crate::language_utils::language_pair;
use crate::translation::quality::SegmentScore;

/// Job status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a worker
    Queued,
    /// Segmenting and translating
    Translating,
    /// Machine draft stored
    MachineTranslated,
    /// Quality scoring in progress
    Scoring,
    /// Handed off to a human reviewer
    InReview,
    /// Approved by a reviewer (reviewed tier)
    Reviewed,
    /// Finished
    Complete,
    /// Pipeline run failed
    Failed,
}

impl JobStatus {
    /// Complete, reviewed or failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Reviewed | JobStatus::Failed)
    }

    /// States a pipeline re-invocation must leave untouched
    pub fn is_settled(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Reviewed | JobStatus::InReview)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match next {
            Translating => matches!(self, Queued | Translating | MachineTranslated | Scoring | Failed),
            MachineTranslated => *self == Translating,
            Scoring => *self == MachineTranslated,
            InReview => *self == Scoring,
            Complete => matches!(self, Scoring | InReview),
            Reviewed => *self == InReview,
            Failed => matches!(self, Queued | Translating | MachineTranslated | Scoring),
            Queued => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Translating => write!(f, "translating"),
            JobStatus::MachineTranslated => write!(f, "machine_translated"),
            JobStatus::Scoring => write!(f, "scoring"),
            JobStatus::InReview => write!(f, "in_review"),
            JobStatus::Reviewed => write!(f, "reviewed"),
            JobStatus::Complete => write!(f, "complete"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "translating" => Ok(JobStatus::Translating),
            "machine_translated" => Ok(JobStatus::MachineTranslated),
            "scoring" => Ok(JobStatus::Scoring),
            "in_review" => Ok(JobStatus::InReview),
            "reviewed" => Ok(JobStatus::Reviewed),
            "complete" => Ok(JobStatus::Complete),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Service tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Machine translation only
    #[default]
    Instant,
    /// Machine draft plus human review
    Reviewed,
    /// Reviewed and certified
    Certified,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Instant => write!(f, "instant"),
            Tier::Reviewed => write!(f, "reviewed"),
            Tier::Certified => write!(f, "certified"),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "instant" => Ok(Tier::Instant),
            "reviewed" => Ok(Tier::Reviewed),
            "certified" => Ok(Tier::Certified),
            _ => Err(anyhow::anyhow!("Invalid tier: {}", s)),
        }
    }
}

/// Kind of content submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Article,
    Broadcast,
    Social,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::Article => write!(f, "article"),
            ContentType::Broadcast => write!(f, "broadcast"),
            ContentType::Social => write!(f, "social"),
        }
    }
}

impl std::str::FromStr for ContentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "article" => Ok(ContentType::Article),
            "broadcast" => Ok(ContentType::Broadcast),
            "social" => Ok(ContentType::Social),
            _ => Err(anyhow::anyhow!("Invalid content type: {}", s)),
        }
    }
}

/// Maximum content length accepted for a job, in characters
pub const MAX_CONTENT_CHARS: usize = 50_000;

/// A translation job
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationJob {
    pub id: String,
    pub org_id: Option<String>,
    pub source_language: String,
    pub target_language: String,
    pub tier: Tier,
    /// Source HTML
    pub content: String,
    pub content_type: ContentType,
    /// Caller metadata, carried through untouched
    pub metadata: Option<serde_json::Value>,
    /// Reassembled translated HTML
    pub translated_content: Option<String>,
    /// Source words after glossary substitution
    pub word_count: Option<usize>,
    pub quality_scores: Option<Vec<SegmentScore>>,
    /// Indices of segments needing review
    pub flagged_segments: Vec<usize>,
    pub callback_url: Option<String>,
    pub glossary_id: Option<String>,
    pub error_message: Option<String>,
    pub status: JobStatus,
    /// 0-based index of the latest pipeline run
    pub attempt: u32,
    /// When a failed job is due for its next automatic run
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TranslationJob {
    /// Create a queued job with a fresh id
    pub fn new(
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        tier: Tier,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            org_id: None,
            source_language: source_language.into(),
            target_language: target_language.into(),
            tier,
            content: content.into(),
            content_type: ContentType::default(),
            metadata: None,
            translated_content: None,
            word_count: None,
            quality_scores: None,
            flagged_segments: Vec::new(),
            callback_url: None,
            glossary_id: None,
            error_message: None,
            status: JobStatus::Queued,
            attempt: 0,
            next_retry_at: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    pub fn with_glossary_id(mut self, glossary_id: impl Into<String>) -> Self {
        self.glossary_id = Some(glossary_id.into());
        self
    }

    pub fn with_org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Record that the failed run should be retried after `delay`
    pub fn schedule_retry(&mut self, delay: std::time::Duration) {
        let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
        self.next_retry_at = self.updated_at.checked_add_signed(delay);
    }

    /// Attempt index a due run should use: the next one after a failure
    pub fn next_attempt(&self) -> u32 {
        if self.status == JobStatus::Failed { self.attempt + 1 } else { self.attempt }
    }

    /// Reviewer language pair, e.g. `en-es`
    pub fn language_pair(&self) -> String {
        language_pair(&self.source_language, &self.target_language)
    }

    /// Move to `next`, enforcing the state machine.
    ///
    /// Entering `translating` discards the previous run's output. Terminal
    /// states stamp `completed_at`; every other state clears it. Any
    /// transition drops a pending retry.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), JobError> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::IllegalTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        let now = Utc::now();
        if next == JobStatus::Translating {
            self.translated_content = None;
            self.word_count = None;
            self.quality_scores = None;
            self.flagged_segments.clear();
            self.error_message = None;
        }
        self.completed_at = if next.is_terminal() { Some(now) } else { None };
        self.next_retry_at = None;
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}
