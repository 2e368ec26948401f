/*!
 * Pipeline controller.
 *
 * Drives one job through segmentation, glossary substitution, translation,
 * reassembly and scoring, committing the job after every status change.
 * Failures are recorded on the job and reported with the delay before the
 * next attempt, or as final once the retry budget is spent. The due time of
 * the next attempt is stored on the job so a restarted worker can pick the
 * retry up.
 */

use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::errors::JobError;
use crate::pipeline::job::{JobStatus, Tier, TranslationJob};
use crate::pipeline::retry::RetryPolicy;
use crate::pipeline::review::ReviewQueue;
use crate::pipeline::JobStore;
use crate::translation::glossary::{GlossaryApplier, count_words};
use crate::translation::orchestrator::Translator;
use crate::translation::quality::QualityScorer;
use crate::translation::segmenter::{Segment, reassemble_html, segment_html};
use crate::webhook::{JobNotification, WebhookQueue};

/// A failed pipeline run
#[derive(Debug, Error)]
#[error("Job {job_id} failed on attempt {attempt}: {error}")]
pub struct PipelineFailure {
    pub job_id: String,
    /// 0-based attempt that failed
    pub attempt: u32,
    #[source]
    pub error: JobError,
    /// Delay before the next attempt; `None` when the failure is final
    pub retry_after: Option<Duration>,
}

impl PipelineFailure {
    pub fn is_final(&self) -> bool {
        self.retry_after.is_none()
    }
}

/// Runs translation jobs through every stage
pub struct Pipeline {
    store: Arc<dyn JobStore>,
    reviews: Arc<dyn ReviewQueue>,
    webhooks: Arc<dyn WebhookQueue>,
    translator: Translator,
    scorer: QualityScorer,
    retry_policy: RetryPolicy,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        reviews: Arc<dyn ReviewQueue>,
        webhooks: Arc<dyn WebhookQueue>,
        translator: Translator,
        scorer: QualityScorer,
    ) -> Self {
        Self {
            store,
            reviews,
            webhooks,
            translator,
            scorer,
            retry_policy: RetryPolicy::pipeline_default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub(crate) fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Run the whole pipeline for a job. `attempt` is 0-based.
    ///
    /// Jobs that are complete, reviewed or awaiting review are returned
    /// untouched, so re-invocation is safe.
    pub async fn run_pipeline(&self, job_id: &str, attempt: u32) -> Result<JobStatus, PipelineFailure> {
        let mut job = match self.store.load_job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                let error = JobError::NotFound(job_id.to_string());
                error!("Pipeline failed for job {}: {}", job_id, error);
                return Err(self.failure(job_id, attempt, error));
            }
            Err(e) => {
                let error = JobError::persistence(e);
                error!("Pipeline failed to load job {}: {}", job_id, error);
                return Err(self.failure(job_id, attempt, error));
            }
        };

        if job.status.is_settled() {
            info!("Job {} is already {}, nothing to do", job.id, job.status);
            return Ok(job.status);
        }
        job.attempt = attempt;

        match self.execute(&mut job).await {
            Ok(status) => Ok(status),
            Err(error) => Err(self.handle_failure(&mut job, attempt, error).await),
        }
    }

    async fn execute(&self, job: &mut TranslationJob) -> Result<JobStatus, JobError> {
        job.transition(JobStatus::Translating)?;
        self.commit(job).await?;
        info!("Job {} translating {} -> {}", job.id, job.source_language, job.target_language);

        let mut segments = segment_html(&job.content)?;

        if let Some(glossary_id) = job.glossary_id.as_deref() {
            match self.store.load_glossary_terms(glossary_id).await.map_err(JobError::persistence)? {
                Some(terms) => GlossaryApplier::new(&terms).apply_to_segments(&mut segments),
                None => warn!("Glossary {} for job {} not found, continuing without it", glossary_id, job.id),
            }
        }
        let word_count = count_words(&segments);

        let summary = self
            .translator
            .translate_segments(&mut segments, &job.source_language, &job.target_language)
            .await?;
        info!(
            "Job {}: {} segments in {} batches, {} translated, {} flagged",
            job.id,
            segments.len(),
            summary.batches,
            summary.translated,
            summary.flagged
        );

        job.transition(JobStatus::MachineTranslated)?;
        job.translated_content = Some(reassemble_html(&job.content, &segments)?);
        job.word_count = Some(word_count);
        job.flagged_segments = flagged_indices(&segments);
        self.commit(job).await?;

        job.transition(JobStatus::Scoring)?;
        self.commit(job).await?;

        let scores = self.scorer.score_segments(&mut segments, &job.target_language).await;
        job.quality_scores = if scores.is_empty() { None } else { Some(scores) };
        job.flagged_segments = flagged_indices(&segments);

        let final_status = match job.tier {
            Tier::Instant => JobStatus::Complete,
            Tier::Reviewed | Tier::Certified => {
                let pair = job.language_pair();
                match self.reviews.assign(&job.id, &pair).await {
                    Ok(Some(reviewer_id)) => info!("Job {} assigned to reviewer {}", job.id, reviewer_id),
                    Ok(None) => warn!("No active reviewer for {}, job {} waits unassigned", pair, job.id),
                    Err(e) => return Err(JobError::ReviewQueue(format!("{:#}", e))),
                }
                JobStatus::InReview
            }
        };

        job.transition(final_status)?;
        self.commit(job).await?;
        info!("Job {} is {}", job.id, final_status);

        if final_status == JobStatus::Complete {
            let notification = JobNotification::completed(job);
            self.notify(job, &notification).await;
        }

        Ok(final_status)
    }

    async fn handle_failure(&self, job: &mut TranslationJob, attempt: u32, error: JobError) -> PipelineFailure {
        error!("Pipeline failed for job {} (attempt {}): {}", job.id, attempt + 1, error);
        let message = error.to_string();
        let failure = self.failure(&job.id, attempt, error);

        match job.transition(JobStatus::Failed) {
            Ok(()) => {
                job.error_message = Some(message.clone());
                if let Some(delay) = failure.retry_after {
                    job.schedule_retry(delay);
                }
                if let Err(e) = self.commit(job).await {
                    warn!("Failed to persist failure status for job {}: {}", job.id, e);
                }
            }
            Err(e) => warn!("Could not record failure for job {}: {}", job.id, e),
        }

        if failure.is_final() {
            let notification = JobNotification::failed(&job.id, message);
            self.notify(job, &notification).await;
        }
        failure
    }

    fn failure(&self, job_id: &str, attempt: u32, error: JobError) -> PipelineFailure {
        let retry_after = if error.is_retryable() {
            self.retry_policy.next_retry(attempt)
        } else {
            None
        };
        PipelineFailure {
            job_id: job_id.to_string(),
            attempt,
            error,
            retry_after,
        }
    }

    pub(crate) async fn commit(&self, job: &TranslationJob) -> Result<(), JobError> {
        self.store.commit_job(job).await.map_err(JobError::persistence)
    }

    /// Enqueue a notification when the job has a callback URL
    pub(crate) async fn notify(&self, job: &TranslationJob, notification: &JobNotification) {
        let Some(url) = job.callback_url.as_deref() else {
            return;
        };
        if let Err(e) = self.webhooks.enqueue(url, &job.id, notification).await {
            warn!("Failed to enqueue {} webhook for job {}: {:#}", notification.status, job.id, e);
        }
    }
}

fn flagged_indices(segments: &[Segment]) -> Vec<usize> {
    segments.iter().filter(|s| s.needs_review).map(|s| s.index).collect()
}
