/*!
 * Review approval tests
 */

use hawk_translation::errors::JobError;
use hawk_translation::pipeline::job::{JobStatus, Tier, TranslationJob};

use crate::common::Harness;

fn review_job(id: &str, tier: Tier) -> TranslationJob {
    TranslationJob::new("en", "es", tier, "<p>The council voted.</p>")
        .with_id(id)
        .with_callback_url("https://newsroom.example.com/hook")
}

/// Drive a job to `in_review` through the pipeline
async fn job_in_review(harness: &Harness, id: &str, tier: Tier) {
    harness.store.insert(review_job(id, tier));
    let status = harness.pipeline().run_pipeline(id, 0).await.unwrap();
    assert_eq!(status, JobStatus::InReview);
}

#[tokio::test]
async fn test_approveReview_reviewedTier_shouldEndReviewed() {
    let harness = Harness::new();
    job_in_review(&harness, "rev-1", Tier::Reviewed).await;

    let status = harness
        .pipeline()
        .approve_review("rev-1", "<p>El concejo votó.</p>".to_string())
        .await
        .unwrap();

    assert_eq!(status, JobStatus::Reviewed);
    let job = harness.store.job("rev-1");
    assert_eq!(job.status, JobStatus::Reviewed);
    assert_eq!(job.translated_content.as_deref(), Some("<p>El concejo votó.</p>"));
    assert!(job.completed_at.is_some());

    let notifications = harness.webhooks.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].status, JobStatus::Reviewed);
    assert_eq!(notifications[0].translated_content.as_deref(), Some("<p>El concejo votó.</p>"));
}

#[tokio::test]
async fn test_approveReview_certifiedTier_shouldEndComplete() {
    let harness = Harness::new();
    job_in_review(&harness, "cert-1", Tier::Certified).await;

    let status = harness
        .pipeline()
        .approve_review("cert-1", "<p>Certificado.</p>".to_string())
        .await
        .unwrap();

    assert_eq!(status, JobStatus::Complete);
    assert_eq!(harness.store.job("cert-1").status, JobStatus::Complete);
    assert_eq!(harness.webhooks.notifications()[0].status, JobStatus::Complete);
}

#[tokio::test]
async fn test_approveReview_jobNotInReview_shouldBeRejected() {
    let harness = Harness::new();
    harness.store.insert(review_job("queued-1", Tier::Reviewed));

    let error = harness
        .pipeline()
        .approve_review("queued-1", "<p>x</p>".to_string())
        .await
        .unwrap_err();

    assert!(matches!(error, JobError::InvalidState(ref m) if m.contains("queued")));
    assert_eq!(harness.store.job("queued-1").status, JobStatus::Queued);
    assert!(harness.webhooks.notifications().is_empty());
}

#[tokio::test]
async fn test_approveReview_twice_shouldRejectSecondApproval() {
    let harness = Harness::new();
    job_in_review(&harness, "rev-2", Tier::Reviewed).await;
    let pipeline = harness.pipeline();

    pipeline.approve_review("rev-2", "<p>Uno</p>".to_string()).await.unwrap();
    let error = pipeline.approve_review("rev-2", "<p>Dos</p>".to_string()).await.unwrap_err();

    assert!(matches!(error, JobError::InvalidState(_)));
    assert_eq!(harness.store.job("rev-2").translated_content.as_deref(), Some("<p>Uno</p>"));
}

#[tokio::test]
async fn test_approveReview_unknownJob_shouldBeNotFound() {
    let harness = Harness::new();
    let error = harness
        .pipeline()
        .approve_review("missing", String::new())
        .await
        .unwrap_err();
    assert!(matches!(error, JobError::NotFound(_)));
}

#[tokio::test]
async fn test_approvedJob_rerunPipeline_shouldStaySettled() {
    let harness = Harness::new();
    job_in_review(&harness, "rev-3", Tier::Reviewed).await;
    let pipeline = harness.pipeline();
    pipeline.approve_review("rev-3", "<p>Final</p>".to_string()).await.unwrap();

    let status = pipeline.run_pipeline("rev-3", 0).await.unwrap();

    assert_eq!(status, JobStatus::Reviewed);
    assert_eq!(harness.store.job("rev-3").translated_content.as_deref(), Some("<p>Final</p>"));
}
