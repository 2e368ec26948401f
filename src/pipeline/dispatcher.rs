/*!
 * Bounded job dispatcher.
 *
 * Runs pipeline invocations on the tokio runtime with at most `concurrency`
 * jobs executing at once. A failed run that still has retry budget sleeps
 * for the backoff delay without holding a worker slot, then runs again.
 * Polling also resumes retries persisted by a previous process. A job id is
 * never run twice concurrently.
 */

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::errors::JobError;
use crate::pipeline::controller::{Pipeline, PipelineFailure};
use crate::pipeline::job::JobStatus;

/// Result of a dispatched job once all attempts are done
pub type JobOutcome = Result<JobStatus, PipelineFailure>;

/// Bounded pool of pipeline workers
#[derive(Clone)]
pub struct Dispatcher {
    pipeline: Arc<Pipeline>,
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    concurrency: usize,
}

/// Removes a job id from the in-flight set when the task ends
struct InFlightGuard {
    job_id: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.job_id);
    }
}

impl Dispatcher {
    pub fn new(pipeline: Arc<Pipeline>, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            pipeline,
            permits: Arc::new(Semaphore::new(concurrency)),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            concurrency,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Jobs currently running or waiting for a retry
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Spawn a job with its retries. Returns `None` when the job is
    /// already in flight.
    pub fn dispatch(&self, job_id: &str) -> Option<JoinHandle<JobOutcome>> {
        self.dispatch_from(job_id, 0)
    }

    /// Like [`Dispatcher::dispatch`], starting at a given attempt index
    pub fn dispatch_from(&self, job_id: &str, first_attempt: u32) -> Option<JoinHandle<JobOutcome>> {
        if !self.in_flight.lock().insert(job_id.to_string()) {
            debug!("Job {} is already in flight, not dispatching again", job_id);
            return None;
        }

        let guard = InFlightGuard {
            job_id: job_id.to_string(),
            in_flight: self.in_flight.clone(),
        };
        let dispatcher = self.clone();
        let job_id = job_id.to_string();

        Some(tokio::spawn(async move {
            let _guard = guard;
            dispatcher.run_with_retries(&job_id, first_attempt).await
        }))
    }

    /// Dispatch a job and wait for its final outcome
    pub async fn run_job(&self, job_id: &str) -> JobOutcome {
        match self.dispatch(job_id) {
            Some(handle) => handle.await.unwrap_or_else(|e| {
                Err(PipelineFailure {
                    job_id: job_id.to_string(),
                    attempt: 0,
                    error: JobError::InvalidState(format!("worker task failed: {}", e)),
                    retry_after: None,
                })
            }),
            None => Err(PipelineFailure {
                job_id: job_id.to_string(),
                attempt: 0,
                error: JobError::InvalidState(format!("job {} is already running", job_id)),
                retry_after: None,
            }),
        }
    }

    /// Dispatch up to `limit` queued jobs and due retries from the store
    pub async fn poll_once(&self, limit: usize) -> anyhow::Result<Vec<JoinHandle<JobOutcome>>> {
        let runnable = self.pipeline.store().runnable_jobs(limit).await?;
        let handles: Vec<_> = runnable
            .iter()
            .filter_map(|job| {
                let handle = self.dispatch_from(&job.job_id, job.attempt)?;
                if job.attempt > 0 {
                    info!("Resuming job {} at attempt {}", job.job_id, job.attempt + 1);
                }
                Some(handle)
            })
            .collect();
        if !handles.is_empty() {
            info!("Dispatched {} jobs", handles.len());
        }
        Ok(handles)
    }

    async fn run_with_retries(&self, job_id: &str, first_attempt: u32) -> JobOutcome {
        let mut attempt = first_attempt;
        loop {
            let permit = self.permits.clone().acquire_owned().await.map_err(|e| PipelineFailure {
                job_id: job_id.to_string(),
                attempt,
                error: JobError::InvalidState(format!("dispatcher closed: {}", e)),
                retry_after: None,
            })?;

            let result = self.pipeline.run_pipeline(job_id, attempt).await;
            drop(permit);

            match result {
                Ok(status) => return Ok(status),
                Err(failure) => match failure.retry_after {
                    Some(delay) => {
                        warn!(
                            "Job {} attempt {} failed, retrying in {:?}: {}",
                            job_id,
                            attempt + 1,
                            delay,
                            failure.error
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        error!("Job {} failed permanently: {}", job_id, failure.error);
                        return Err(failure);
                    }
                },
            }
        }
    }
}
