/*!
 * Pipeline controller tests with in-memory collaborators
 */

use std::time::Duration;

use hawk_translation::errors::{JobError, TranslationError};
use hawk_translation::pipeline::job::{JobStatus, Tier, TranslationJob};
use hawk_translation::providers::mock::{MockBackend, MockScoreBehavior, MockScorer};

use crate::common::{Harness, RecordingReviewQueue, two_paragraph_job};

#[tokio::test]
async fn test_runPipeline_instantJob_shouldCompleteAndNotify() {
    let harness = Harness::new();
    harness.store.insert(two_paragraph_job("job-1"));

    let status = harness.pipeline().run_pipeline("job-1", 0).await.expect("pipeline should succeed");

    assert_eq!(status, JobStatus::Complete);
    let job = harness.store.job("job-1");
    assert_eq!(job.status, JobStatus::Complete);
    assert!(job.completed_at.is_some());
    assert_eq!(job.word_count, Some(7));
    assert!(job.flagged_segments.is_empty());
    assert_eq!(job.quality_scores.as_ref().map(|s| s.len()), Some(2));

    let content = job.translated_content.expect("translation stored");
    assert!(content.contains("<p>[es] The mayor spoke today.</p>"));
    assert!(content.contains("<p>[es] Residents gathered downtown.</p>"));

    assert_eq!(
        harness.store.committed_statuses("job-1"),
        vec![
            JobStatus::Translating,
            JobStatus::MachineTranslated,
            JobStatus::Scoring,
            JobStatus::Complete
        ]
    );

    let notifications = harness.webhooks.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].status, JobStatus::Complete);
    assert_eq!(notifications[0].job_id, "job-1");
    assert!(notifications[0].translated_content.is_some());
    assert_eq!(
        harness.webhooks.urls(),
        vec!["https://newsroom.example.com/hooks/translation".to_string()]
    );
    assert!(harness.reviews.calls().is_empty());
}

#[tokio::test]
async fn test_runPipeline_withoutCallbackUrl_shouldNotNotify() {
    let harness = Harness::new();
    harness
        .store
        .insert(TranslationJob::new("en", "fr", Tier::Instant, "<p>Bonjour</p>").with_id("job-quiet"));

    let status = harness.pipeline().run_pipeline("job-quiet", 0).await.unwrap();

    assert_eq!(status, JobStatus::Complete);
    assert!(harness.webhooks.notifications().is_empty());
}

#[tokio::test]
async fn test_runPipeline_reviewedTier_shouldHandOffWithoutWebhook() {
    let harness = Harness::new();
    let job = TranslationJob::new("en", "ht", Tier::Reviewed, "<p>Storm warning tonight.</p>")
        .with_id("job-2")
        .with_callback_url("https://newsroom.example.com/hook");
    harness.store.insert(job);

    let status = harness.pipeline().run_pipeline("job-2", 0).await.unwrap();

    assert_eq!(status, JobStatus::InReview);
    let job = harness.store.job("job-2");
    assert!(job.completed_at.is_none());
    assert_eq!(harness.reviews.calls(), vec![("job-2".to_string(), "en-ht".to_string())]);
    assert!(harness.webhooks.notifications().is_empty());
    // Haitian Creole goes to the secondary backend
    assert_eq!(harness.secondary.call_count(), 1);
    assert_eq!(harness.primary.call_count(), 0);
}

#[tokio::test]
async fn test_runPipeline_certifiedTierWithoutReviewer_shouldStillWaitInReview() {
    let harness = Harness::new().with_reviews(RecordingReviewQueue::default());
    harness
        .store
        .insert(TranslationJob::new("en", "es", Tier::Certified, "<p>Court ruling.</p>").with_id("job-3"));

    let status = harness.pipeline().run_pipeline("job-3", 0).await.unwrap();

    assert_eq!(status, JobStatus::InReview);
    assert_eq!(harness.reviews.calls().len(), 1);
}

#[tokio::test]
async fn test_runPipeline_backendReturnsOneFewer_shouldFlagBatchAndContinue() {
    let harness = Harness::new().with_primary(MockBackend::wrong_length());
    harness.store.insert(two_paragraph_job("job-4"));

    let status = harness.pipeline().run_pipeline("job-4", 0).await.unwrap();

    assert_eq!(status, JobStatus::Complete);
    let job = harness.store.job("job-4");
    assert_eq!(job.flagged_segments, vec![0, 1]);
    // Flagged segments are not scored
    assert!(job.quality_scores.is_none());
    assert_eq!(harness.scorer.call_count(), 0);
    let content = job.translated_content.unwrap();
    assert!(content.contains("<p>The mayor spoke today.</p>"));
    // Malformed output is not retried
    assert_eq!(harness.primary.call_count(), 1);
    assert!(!harness.store.committed_statuses("job-4").contains(&JobStatus::Failed));
}

#[tokio::test]
async fn test_runPipeline_secondaryUnavailable_shouldDegradeToFlagged() {
    let harness = Harness::new().with_secondary(MockBackend::unavailable());
    harness
        .store
        .insert(TranslationJob::new("en", "ur", Tier::Instant, "<p>Election results.</p>").with_id("job-5"));

    let status = harness.pipeline().run_pipeline("job-5", 0).await.unwrap();

    assert_eq!(status, JobStatus::Complete);
    let job = harness.store.job("job-5");
    assert_eq!(job.flagged_segments, vec![0]);
    assert_eq!(harness.secondary.call_count(), 0);
}

#[tokio::test]
async fn test_runPipeline_lowScore_shouldFlagSegment() {
    let harness = Harness::new().with_scorer(MockScorer::new(MockScoreBehavior::Fixed {
        overall: 2.0,
        fluency: 3.0,
        accuracy: 2.5,
    }));
    harness.store.insert(two_paragraph_job("job-6"));

    harness.pipeline().run_pipeline("job-6", 0).await.unwrap();

    let job = harness.store.job("job-6");
    assert_eq!(job.flagged_segments, vec![0, 1]);
    let scores = job.quality_scores.unwrap();
    assert!(scores.iter().all(|s| s.needs_review));
}

#[tokio::test]
async fn test_runPipeline_failingScorer_shouldCompleteWithoutScores() {
    let harness = Harness::new().with_scorer(MockScorer::new(MockScoreBehavior::Malformed));
    harness.store.insert(two_paragraph_job("job-7"));

    let status = harness.pipeline().run_pipeline("job-7", 0).await.unwrap();

    assert_eq!(status, JobStatus::Complete);
    let job = harness.store.job("job-7");
    assert!(job.quality_scores.is_none());
    assert!(job.flagged_segments.is_empty());
    let notification = &harness.webhooks.notifications()[0];
    assert_eq!(notification.quality_scores, Some(None));
}

#[tokio::test]
async fn test_runPipeline_withGlossary_shouldSubstituteBeforeTranslation() {
    let harness = Harness::new();
    harness.store.insert_glossary("g1", &[("city council", "concejo municipal")]);
    harness.store.insert(
        TranslationJob::new("en", "es", Tier::Instant, "<p>The City Council met.</p>")
            .with_id("job-8")
            .with_glossary_id("g1"),
    );

    harness.pipeline().run_pipeline("job-8", 0).await.unwrap();

    assert_eq!(
        harness.primary.received_batches(),
        vec![vec!["The concejo municipal met.".to_string()]]
    );
    let job = harness.store.job("job-8");
    assert_eq!(job.word_count, Some(4));
}

#[tokio::test]
async fn test_runPipeline_withMissingGlossary_shouldContinue() {
    let harness = Harness::new();
    harness.store.insert(two_paragraph_job("job-9").with_glossary_id("missing"));

    let status = harness.pipeline().run_pipeline("job-9", 0).await.unwrap();

    assert_eq!(status, JobStatus::Complete);
}

#[tokio::test]
async fn test_runPipeline_unsupportedLanguage_shouldFailWithoutRetry() {
    let harness = Harness::new();
    harness.store.insert(
        TranslationJob::new("en", "de", Tier::Instant, "<p>Hallo</p>")
            .with_id("job-10")
            .with_callback_url("https://newsroom.example.com/hook"),
    );

    let failure = harness.pipeline().run_pipeline("job-10", 0).await.unwrap_err();

    assert!(failure.is_final());
    assert!(matches!(
        failure.error,
        JobError::Translation(TranslationError::UnsupportedLanguage { .. })
    ));
    let job = harness.store.job("job-10");
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("'de'"));
    let notifications = harness.webhooks.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].status, JobStatus::Failed);
}

#[tokio::test]
async fn test_runPipeline_unknownJob_shouldReturnFinalNotFound() {
    let harness = Harness::new();

    let failure = harness.pipeline().run_pipeline("nope", 0).await.unwrap_err();

    assert!(failure.is_final());
    assert!(matches!(failure.error, JobError::NotFound(_)));
    assert!(harness.webhooks.notifications().is_empty());
}

#[tokio::test]
async fn test_runPipeline_retryCountdowns_shouldFollowSchedule() {
    let harness = Harness::new().with_reviews(RecordingReviewQueue::failing());
    harness.store.insert(
        TranslationJob::new("en", "es", Tier::Reviewed, "<p>Budget vote.</p>")
            .with_id("job-11")
            .with_callback_url("https://newsroom.example.com/hook"),
    );
    let pipeline = harness.pipeline();

    let expected = [30, 120, 600];
    for (attempt, secs) in expected.iter().enumerate() {
        let failure = pipeline.run_pipeline("job-11", attempt as u32).await.unwrap_err();
        assert_eq!(failure.retry_after, Some(Duration::from_secs(*secs)));
        assert!(matches!(failure.error, JobError::ReviewQueue(_)));
        assert_eq!(harness.store.job("job-11").status, JobStatus::Failed);
    }
    // Retries are silent; only the final failure notifies
    assert!(harness.webhooks.notifications().is_empty());
}

#[tokio::test]
async fn test_runPipeline_failureOnLastAttempt_shouldBeFinalAndNotify() {
    let harness = Harness::new().with_reviews(RecordingReviewQueue::failing());
    harness.store.insert(
        TranslationJob::new("en", "es", Tier::Reviewed, "<p>Budget vote.</p>")
            .with_id("job-12")
            .with_callback_url("https://newsroom.example.com/hook"),
    );

    let failure = harness.pipeline().run_pipeline("job-12", 3).await.unwrap_err();

    assert!(failure.is_final());
    assert_eq!(failure.attempt, 3);
    let job = harness.store.job("job-12");
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.completed_at.is_some());
    assert!(job.error_message.as_deref().is_some_and(|m| m.contains("review service unreachable")));

    let notifications = harness.webhooks.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].status, JobStatus::Failed);
    assert!(notifications[0].error.as_deref().is_some_and(|e| !e.is_empty()));
    assert!(notifications[0].translated_content.is_none());
}

#[tokio::test]
async fn test_runPipeline_afterFailure_shouldRerunAndClearError() {
    let harness = Harness::new();
    let mut job = two_paragraph_job("job-13");
    job.status = JobStatus::Failed;
    job.error_message = Some("earlier failure".to_string());
    harness.store.insert(job);

    let status = harness.pipeline().run_pipeline("job-13", 1).await.unwrap();

    assert_eq!(status, JobStatus::Complete);
    assert!(harness.store.job("job-13").error_message.is_none());
}

#[tokio::test]
async fn test_runPipeline_settledJob_shouldBeLeftUntouched() {
    let harness = Harness::new();
    for (id, status) in [
        ("done", JobStatus::Complete),
        ("waiting", JobStatus::InReview),
        ("approved", JobStatus::Reviewed),
    ] {
        let mut job = two_paragraph_job(id);
        job.status = status;
        harness.store.insert(job);
    }
    let pipeline = harness.pipeline();

    assert_eq!(pipeline.run_pipeline("done", 0).await.unwrap(), JobStatus::Complete);
    assert_eq!(pipeline.run_pipeline("waiting", 0).await.unwrap(), JobStatus::InReview);
    assert_eq!(pipeline.run_pipeline("approved", 0).await.unwrap(), JobStatus::Reviewed);
    assert_eq!(harness.primary.call_count(), 0);
    assert!(harness.webhooks.notifications().is_empty());
    assert!(harness.store.committed_statuses("done").is_empty());
}

#[tokio::test]
async fn test_runPipeline_commitFailure_shouldSurfaceOriginalError() {
    let harness = Harness::new();
    harness.store.insert(two_paragraph_job("job-14"));
    harness.store.set_fail_commits(true);

    let failure = harness.pipeline().run_pipeline("job-14", 0).await.unwrap_err();

    assert!(matches!(failure.error, JobError::Persistence(_)));
    assert_eq!(failure.retry_after, Some(Duration::from_secs(30)));
    assert_eq!(harness.primary.call_count(), 0);
}
