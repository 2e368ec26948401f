/*!
 * Dispatcher tests: bounded concurrency, deferred retries and polling
 */

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use hawk_translation::app_config::TranslationConfig;
use hawk_translation::errors::{JobError, ProviderError};
use hawk_translation::pipeline::job::{JobStatus, Tier, TranslationJob};
use hawk_translation::pipeline::{Dispatcher, Pipeline, RetryPolicy};
use hawk_translation::providers::TranslationBackend;
use hawk_translation::providers::mock::MockBackend;
use hawk_translation::translation::{QualityScorer, Translator};

use crate::common::{Harness, MemoryStore, RecordingReviewQueue, two_paragraph_job};

/// Backend that records how many calls overlap
#[derive(Debug, Default)]
struct ConcurrencyProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl TranslationBackend for ConcurrencyProbe {
    fn name(&self) -> &str {
        "probe"
    }

    async fn translate(
        &self,
        texts: &[String],
        _source_language: &str,
        _target_language: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(texts.to_vec())
    }
}

fn fast_retries() -> RetryPolicy {
    RetryPolicy::new(3, vec![Duration::from_millis(5)])
}

#[tokio::test]
async fn test_runJob_shouldReturnFinalStatus() {
    let harness = Harness::new();
    harness.store.insert(two_paragraph_job("d-1"));
    let dispatcher = Dispatcher::new(Arc::new(harness.pipeline()), 2);

    let status = dispatcher.run_job("d-1").await.unwrap();

    assert_eq!(status, JobStatus::Complete);
    assert_eq!(dispatcher.in_flight(), 0);
}

#[tokio::test]
async fn test_runJob_retryableFailure_shouldRetryUntilBudgetSpent() {
    let harness = Harness::new()
        .with_reviews(RecordingReviewQueue::failing())
        .with_retry_policy(fast_retries());
    harness.store.insert(
        TranslationJob::new("en", "es", Tier::Reviewed, "<p>Recount ordered.</p>")
            .with_id("d-2")
            .with_callback_url("https://newsroom.example.com/hook"),
    );
    let dispatcher = Dispatcher::new(Arc::new(harness.pipeline()), 1);

    let failure = dispatcher.run_job("d-2").await.unwrap_err();

    assert!(failure.is_final());
    assert_eq!(failure.attempt, 3);
    assert!(matches!(failure.error, JobError::ReviewQueue(_)));
    // First run plus three retries
    assert_eq!(harness.reviews.calls().len(), 4);
    assert_eq!(harness.primary.call_count(), 4);
    assert_eq!(harness.store.job("d-2").status, JobStatus::Failed);

    let notifications = harness.webhooks.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].status, JobStatus::Failed);
}

#[tokio::test]
async fn test_runJob_recoveringCollaborator_shouldSucceedOnRetry() {
    let harness = Harness::new().with_retry_policy(fast_retries());
    harness.store.insert(two_paragraph_job("d-3"));
    harness.store.set_fail_commits(true);
    let dispatcher = Dispatcher::new(Arc::new(harness.pipeline()), 1);

    let handle = dispatcher.dispatch("d-3").unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    harness.store.set_fail_commits(false);
    let status = handle.await.unwrap().unwrap();

    assert_eq!(status, JobStatus::Complete);
    assert_eq!(harness.store.job("d-3").status, JobStatus::Complete);
}

#[tokio::test]
async fn test_runJob_nonRetryableFailure_shouldNotRetry() {
    let harness = Harness::new().with_retry_policy(fast_retries());
    harness
        .store
        .insert(TranslationJob::new("en", "ja", Tier::Instant, "<p>Hello</p>").with_id("d-4"));
    let dispatcher = Dispatcher::new(Arc::new(harness.pipeline()), 1);

    let failure = dispatcher.run_job("d-4").await.unwrap_err();

    assert_eq!(failure.attempt, 0);
    assert_eq!(harness.store.committed_statuses("d-4"), vec![JobStatus::Translating, JobStatus::Failed]);
}

#[tokio::test]
async fn test_dispatch_sameJobTwice_shouldRunOnce() {
    let harness = Harness::new();
    harness.store.insert(two_paragraph_job("d-5"));
    let dispatcher = Dispatcher::new(Arc::new(harness.pipeline()), 4);

    let first = dispatcher.dispatch("d-5");
    let second = dispatcher.dispatch("d-5");

    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(dispatcher.in_flight(), 1);

    first.unwrap().await.unwrap().unwrap();
    assert_eq!(harness.primary.call_count(), 1);
    assert_eq!(dispatcher.in_flight(), 0);
    assert!(dispatcher.dispatch("d-5").is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dispatch_manyJobs_shouldRespectConcurrencyBound() {
    let harness = Harness::new();
    let probe = Arc::new(ConcurrencyProbe::default());
    let translator = Translator::new(
        probe.clone(),
        Arc::new(MockBackend::working()),
        &TranslationConfig::default(),
    );
    let pipeline = Pipeline::new(
        harness.store.clone(),
        harness.reviews.clone(),
        harness.webhooks.clone(),
        translator,
        QualityScorer::disabled(),
    );
    let dispatcher = Dispatcher::new(Arc::new(pipeline), 2);
    assert_eq!(dispatcher.concurrency(), 2);

    let mut handles = Vec::new();
    for i in 0..6 {
        let id = format!("c-{}", i);
        harness
            .store
            .insert(TranslationJob::new("en", "fr", Tier::Instant, "<p>Bonjour</p>").with_id(&id));
        handles.push(dispatcher.dispatch(&id).unwrap());
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), JobStatus::Complete);
    }

    let peak = probe.peak.load(Ordering::SeqCst);
    assert!(peak >= 1);
    assert!(peak <= 2, "peak concurrency was {}", peak);
}

#[tokio::test]
async fn test_dispatcher_withZeroConcurrency_shouldClampToOne() {
    let harness = Harness::new();
    let dispatcher = Dispatcher::new(Arc::new(harness.pipeline()), 0);
    assert_eq!(dispatcher.concurrency(), 1);
}

#[tokio::test]
async fn test_pollOnce_shouldDispatchQueuedJobsOnly() {
    let harness = Harness::new();
    for id in ["q-1", "q-2", "q-3"] {
        harness.store.insert(two_paragraph_job(id));
    }
    let mut done = two_paragraph_job("done");
    done.status = JobStatus::Complete;
    harness.store.insert(done);
    let dispatcher = Dispatcher::new(Arc::new(harness.pipeline()), 2);

    let handles = dispatcher.poll_once(10).await.unwrap();
    assert_eq!(handles.len(), 3);
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for id in ["q-1", "q-2", "q-3"] {
        assert_eq!(harness.store.job(id).status, JobStatus::Complete);
    }
    assert!(harness.store.committed_statuses("done").is_empty());
    assert!(dispatcher.poll_once(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pollOnce_shouldHonorLimit() {
    let harness = Harness::new();
    for id in ["l-1", "l-2", "l-3"] {
        harness.store.insert(two_paragraph_job(id));
    }
    let dispatcher = Dispatcher::new(Arc::new(harness.pipeline()), 1);

    let handles = dispatcher.poll_once(2).await.unwrap();

    assert_eq!(handles.len(), 2);
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
}

fn reviewed_job(id: &str) -> TranslationJob {
    TranslationJob::new("en", "es", Tier::Reviewed, "<p>Recount ordered.</p>")
        .with_id(id)
        .with_callback_url("https://newsroom.example.com/hook")
}

/// Wait until the job has failed with a retry scheduled
async fn wait_for_scheduled_retry(store: &MemoryStore, id: &str) {
    for _ in 0..500 {
        let job = store.job(id);
        if job.status == JobStatus::Failed && job.next_retry_at.is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("no retry was scheduled for {}", id);
}

#[tokio::test]
async fn test_pollOnce_afterWorkerStopsDuringBackoff_shouldResumeRetry() {
    let retries = RetryPolicy::new(3, vec![Duration::from_millis(200)]);
    let harness = Harness::new()
        .with_reviews(RecordingReviewQueue::failing())
        .with_retry_policy(retries.clone());
    harness.store.insert(reviewed_job("crash-1"));

    let handle = Dispatcher::new(Arc::new(harness.pipeline()), 1).dispatch("crash-1").unwrap();
    wait_for_scheduled_retry(&harness.store, "crash-1").await;
    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
    assert_eq!(harness.reviews.calls().len(), 1);

    // A new worker process sharing the same store
    let mut restarted = Harness::new().with_retry_policy(retries);
    restarted.store = harness.store.clone();
    let dispatcher = Dispatcher::new(Arc::new(restarted.pipeline()), 1);
    tokio::time::sleep(Duration::from_millis(250)).await;

    let handles = dispatcher.poll_once(10).await.unwrap();
    assert_eq!(handles.len(), 1);
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), JobStatus::InReview);
    }

    let job = restarted.store.job("crash-1");
    assert_eq!(job.status, JobStatus::InReview);
    assert_eq!(job.attempt, 1);
    assert!(job.next_retry_at.is_none());
    assert!(job.error_message.is_none());
    assert_eq!(restarted.reviews.calls(), vec![("crash-1".to_string(), "en-es".to_string())]);
}

#[tokio::test]
async fn test_pollOnce_resumedLastAttemptFailing_shouldSendFailureWebhook() {
    let retries = RetryPolicy::new(1, vec![Duration::from_millis(200)]);
    let harness = Harness::new()
        .with_reviews(RecordingReviewQueue::failing())
        .with_retry_policy(retries.clone());
    harness.store.insert(reviewed_job("crash-2"));

    let handle = Dispatcher::new(Arc::new(harness.pipeline()), 1).dispatch("crash-2").unwrap();
    wait_for_scheduled_retry(&harness.store, "crash-2").await;
    handle.abort();
    let _ = handle.await;
    assert!(harness.webhooks.notifications().is_empty());

    let mut restarted = Harness::new()
        .with_reviews(RecordingReviewQueue::failing())
        .with_retry_policy(retries);
    restarted.store = harness.store.clone();
    let dispatcher = Dispatcher::new(Arc::new(restarted.pipeline()), 1);
    tokio::time::sleep(Duration::from_millis(250)).await;

    let mut handles = dispatcher.poll_once(10).await.unwrap();
    assert_eq!(handles.len(), 1);
    let failure = handles.remove(0).await.unwrap().unwrap_err();

    assert!(failure.is_final());
    assert_eq!(failure.attempt, 1);
    let job = restarted.store.job("crash-2");
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.next_retry_at.is_none());
    assert!(dispatcher.poll_once(10).await.unwrap().is_empty());

    let notifications = restarted.webhooks.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].status, JobStatus::Failed);
    assert!(notifications[0].error.as_deref().unwrap_or_default().contains("review service unreachable"));
}

#[tokio::test]
async fn test_pollOnce_retryNotYetDue_shouldLeaveJobAlone() {
    let harness = Harness::new().with_reviews(RecordingReviewQueue::failing());
    harness.store.insert(reviewed_job("later-1"));

    let failure = harness.pipeline().run_pipeline("later-1", 0).await.unwrap_err();
    assert_eq!(failure.retry_after, Some(Duration::from_secs(30)));
    let job = harness.store.job("later-1");
    let due = job.next_retry_at.expect("retry scheduled");
    assert_eq!((due - job.updated_at).num_seconds(), 30);

    let dispatcher = Dispatcher::new(Arc::new(harness.pipeline()), 1);
    assert!(dispatcher.poll_once(10).await.unwrap().is_empty());
}
