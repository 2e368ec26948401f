/*!
 * Job pipeline engine.
 *
 * - `job`: Job model and lifecycle state machine
 * - `retry`: Retry budgets and backoff schedules
 * - `controller`: Runs one job through every stage
 * - `review`: Reviewer handoff and the review approval callback
 * - `dispatcher`: Bounded worker pool with deferred retries
 */

use async_trait::async_trait;
use std::collections::HashMap;

pub mod controller;
pub mod dispatcher;
pub mod job;
pub mod retry;
pub mod review;

// Re-export main types
pub use controller::{Pipeline, PipelineFailure};
pub use dispatcher::Dispatcher;
pub use job::{ContentType, JobStatus, Tier, TranslationJob};
pub use retry::RetryPolicy;
pub use review::ReviewQueue;

/// A job ready to run and the attempt index to run it with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnableJob {
    pub job_id: String,
    pub attempt: u32,
}

/// Persistence the pipeline needs for jobs and glossaries
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch a job, `None` when it does not exist
    async fn load_job(&self, job_id: &str) -> anyhow::Result<Option<TranslationJob>>;

    /// Persist the job's current state atomically
    async fn commit_job(&self, job: &TranslationJob) -> anyhow::Result<()>;

    /// Term mapping of a glossary, `None` when it does not exist
    async fn load_glossary_terms(&self, glossary_id: &str) -> anyhow::Result<Option<HashMap<String, String>>>;

    /// Queued jobs and failed jobs whose retry is due, oldest first, up to `limit`
    async fn runnable_jobs(&self, limit: usize) -> anyhow::Result<Vec<RunnableJob>>;
}
