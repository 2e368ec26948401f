/*!
 * Human review handoff.
 *
 * Reviewed and certified jobs stop in `in_review` after scoring. A reviewer
 * is assigned through the [`ReviewQueue`]; the edited translation comes back
 * through [`Pipeline::approve_review`].
 */

use async_trait::async_trait;
use log::info;

use crate::errors::JobError;
use crate::pipeline::controller::Pipeline;
use crate::pipeline::job::{JobStatus, Tier};
use crate::webhook::JobNotification;

/// Assigns jobs to human reviewers
#[async_trait]
pub trait ReviewQueue: Send + Sync {
    /// Assign a reviewer covering `language_pair` (e.g. `en-es`).
    ///
    /// Returns the reviewer id, or `None` when no active reviewer covers the
    /// pair. The job then waits in review unassigned.
    async fn assign(&self, job_id: &str, language_pair: &str) -> anyhow::Result<Option<String>>;
}

impl Pipeline {
    /// Accept a reviewer's edited translation for a job awaiting review.
    ///
    /// Reviewed-tier jobs end `reviewed`, certified jobs end `complete`.
    /// Both are terminal, so both send the completion webhook; a reviewed-tier
    /// caller would otherwise never hear back.
    pub async fn approve_review(&self, job_id: &str, edited_content: String) -> Result<JobStatus, JobError> {
        let mut job = self
            .store()
            .load_job(job_id)
            .await
            .map_err(JobError::persistence)?
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        if job.status != JobStatus::InReview {
            return Err(JobError::InvalidState(format!(
                "job {} is {}, expected {}",
                job.id,
                job.status,
                JobStatus::InReview
            )));
        }

        let next = match job.tier {
            Tier::Reviewed => JobStatus::Reviewed,
            Tier::Instant | Tier::Certified => JobStatus::Complete,
        };
        job.transition(next)?;
        job.translated_content = Some(edited_content);
        self.commit(&job).await?;
        info!("Review approved for job {}, now {}", job.id, next);

        let notification = JobNotification::completed(&job);
        self.notify(&job, &notification).await;
        Ok(next)
    }
}
