/*!
 * Persisted webhook delivery worker.
 *
 * Picks up due rows from `webhook_deliveries`, makes one attempt each and
 * records the outcome. Failed rows are rescheduled per the retry policy so
 * a restart never loses a pending notification.
 */

use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use log::{debug, warn};

use super::{DeliveryOutcome, WebhookDeliverer};
use crate::database::models::{format_timestamp, now_timestamp, DeliveryStatus, WebhookDeliveryRecord};
use crate::database::Repository;

/// Maximum deliveries attempted at once by one worker pass
const MAX_CONCURRENT_DELIVERIES: usize = 8;

/// Drives pending webhook deliveries stored in the database
#[derive(Clone)]
pub struct WebhookWorker {
    repo: Repository,
    deliverer: WebhookDeliverer,
}

impl WebhookWorker {
    pub fn new(repo: Repository, deliverer: WebhookDeliverer) -> Self {
        Self { repo, deliverer }
    }

    /// Attempt every delivery due now, up to `limit`. Returns the number of
    /// deliveries attempted.
    pub async fn process_due(&self, limit: usize) -> Result<usize> {
        let due = self.repo.due_webhook_deliveries(&now_timestamp(), limit).await?;
        if due.is_empty() {
            return Ok(0);
        }
        debug!("Processing {} due webhook deliveries", due.len());

        let results = stream::iter(due)
            .map(|record| async move { self.process_one(record).await })
            .buffer_unordered(MAX_CONCURRENT_DELIVERIES)
            .collect::<Vec<_>>()
            .await;

        let mut attempted = 0;
        for result in results {
            match result {
                Ok(()) => attempted += 1,
                Err(e) => warn!("Failed to record webhook attempt: {:#}", e),
            }
        }
        Ok(attempted)
    }

    async fn process_one(&self, mut record: WebhookDeliveryRecord) -> Result<()> {
        let attempt = record.attempt_count;
        let now = Utc::now();

        if !WebhookDeliverer::is_deliverable(&record.callback_url) {
            warn!(
                "Skipping webhook for job {}: unsupported callback URL '{}'",
                record.job_id, record.callback_url
            );
            record.status = DeliveryStatus::Skipped;
            record.next_attempt_at = None;
            return self.repo.update_webhook_delivery(&record).await;
        }

        let payload: serde_json::Value = match serde_json::from_str(&record.payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Abandoning webhook {} with unreadable payload: {}", record.id, e);
                record.status = DeliveryStatus::Abandoned;
                record.next_attempt_at = None;
                record.last_error = Some(e.to_string());
                return self.repo.update_webhook_delivery(&record).await;
            }
        };

        record.attempt_count = attempt + 1;
        record.last_attempt_at = Some(format_timestamp(now));

        match self.deliverer.post(&record.callback_url, &payload).await {
            Ok(status_code) => {
                debug!("Webhook delivered for job {} ({})", record.job_id, status_code);
                record.status = DeliveryStatus::Delivered;
                record.next_attempt_at = None;
                record.last_response_code = Some(status_code);
                record.last_error = None;
            }
            Err(failure) => {
                record.last_response_code = failure.status_code;
                record.last_error = Some(failure.message.clone());
                match self.deliverer.outcome_after_failure(&record.job_id, attempt, &failure) {
                    DeliveryOutcome::RetryScheduled { after } => {
                        let delay = chrono::Duration::from_std(after).unwrap_or(chrono::Duration::zero());
                        record.next_attempt_at = Some(format_timestamp(now + delay));
                    }
                    _ => {
                        record.status = DeliveryStatus::Abandoned;
                        record.next_attempt_at = None;
                    }
                }
            }
        }

        self.repo.update_webhook_delivery(&record).await
    }
}
