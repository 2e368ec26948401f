/*!
 * Webhook notification of job outcomes.
 *
 * The pipeline hands notifications to a [`WebhookQueue`]. Delivery is done
 * by [`WebhookDeliverer`], either in-process with sleeps between attempts
 * or one attempt at a time by the persisted [`worker::WebhookWorker`].
 * Undeliverable notifications are abandoned after the retry budget and
 * never raised to the caller.
 */

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::app_config::WebhookConfig;
use crate::pipeline::job::{JobStatus, TranslationJob};
use crate::pipeline::retry::RetryPolicy;
use crate::translation::quality::SegmentScore;

pub mod worker;

/// Payload posted to a job's callback URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobNotification {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_content: Option<String>,
    /// Present (possibly null) on success notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_scores: Option<Option<Vec<SegmentScore>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobNotification {
    /// Success notification carrying the translation and scores
    pub fn completed(job: &TranslationJob) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            translated_content: job.translated_content.clone(),
            quality_scores: Some(job.quality_scores.clone()),
            error: None,
        }
    }

    /// Final failure notification
    pub fn failed(job_id: &str, error: impl Into<String>) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: JobStatus::Failed,
            translated_content: None,
            quality_scores: None,
            error: Some(error.into()),
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "job_id": self.job_id }))
    }
}

/// Where the pipeline sends notifications
#[async_trait]
pub trait WebhookQueue: Send + Sync {
    /// Schedule delivery of `notification` to `url`
    async fn enqueue(&self, url: &str, job_id: &str, notification: &JobNotification) -> anyhow::Result<()>;
}

/// Result of a single delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The endpoint answered 2xx
    Delivered { status_code: u16 },
    /// The URL is not http(s); nothing was sent
    Skipped,
    /// Failed; try again after the delay
    RetryScheduled { after: Duration },
    /// Failed and the retry budget is spent
    Abandoned,
}

/// Posts notifications with bounded retries
#[derive(Debug, Clone)]
pub struct WebhookDeliverer {
    client: Client,
    policy: RetryPolicy,
}

/// Response code or transport error of a failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub status_code: Option<u16>,
    pub message: String,
}

impl WebhookDeliverer {
    pub fn new(config: &WebhookConfig) -> Self {
        Self::with_policy(config.retry_policy(), Duration::from_secs(config.timeout_secs))
    }

    pub fn with_policy(policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().unwrap_or_default(),
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Whether the URL uses a scheme we deliver to
    pub fn is_deliverable(url: &str) -> bool {
        url::Url::parse(url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false)
    }

    /// POST the payload once. Non-2xx answers are failures.
    pub async fn post(&self, url: &str, payload: &serde_json::Value) -> Result<u16, AttemptFailure> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| AttemptFailure { status_code: None, message: e.to_string() })?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(AttemptFailure {
                status_code: Some(status.as_u16()),
                message: format!("endpoint answered {}", status),
            })
        }
    }

    /// Classify a failed attempt against the retry budget
    pub fn outcome_after_failure(&self, job_id: &str, attempt: u32, failure: &AttemptFailure) -> DeliveryOutcome {
        match self.policy.next_retry(attempt) {
            Some(after) => {
                warn!(
                    "Webhook for job {} failed (attempt {}): {}; retrying in {}s",
                    job_id,
                    attempt + 1,
                    failure.message,
                    after.as_secs()
                );
                DeliveryOutcome::RetryScheduled { after }
            }
            None => {
                warn!(
                    "Webhook for job {} abandoned after {} attempts: {}",
                    job_id,
                    attempt + 1,
                    failure.message
                );
                DeliveryOutcome::Abandoned
            }
        }
    }

    /// One delivery attempt (`attempt` is 0-based)
    pub async fn attempt(&self, url: &str, job_id: &str, payload: &serde_json::Value, attempt: u32) -> DeliveryOutcome {
        if !Self::is_deliverable(url) {
            warn!("Skipping webhook for job {}: unsupported callback URL '{}'", job_id, url);
            return DeliveryOutcome::Skipped;
        }

        match self.post(url, payload).await {
            Ok(status_code) => {
                info!("Webhook delivered for job {} ({})", job_id, status_code);
                DeliveryOutcome::Delivered { status_code }
            }
            Err(failure) => self.outcome_after_failure(job_id, attempt, &failure),
        }
    }

    /// Deliver with retries in-process, sleeping between attempts
    pub async fn deliver_webhook(&self, url: &str, job_id: &str, payload: &serde_json::Value) -> DeliveryOutcome {
        let mut attempt = 0;
        loop {
            match self.attempt(url, job_id, payload, attempt).await {
                DeliveryOutcome::RetryScheduled { after } => {
                    debug!("Sleeping {:?} before webhook attempt {} for job {}", after, attempt + 2, job_id);
                    tokio::time::sleep(after).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }
}
