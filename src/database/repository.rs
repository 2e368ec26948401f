/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for all database operations,
 * abstracting away the SQL details and providing type-safe access. The
 * repository is also the production implementation of the pipeline's
 * job store, review queue and webhook queue.
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;

use super::connection::DatabaseConnection;
use super::models::{
    format_timestamp, now_timestamp, parse_timestamp, DeliveryStatus, GlossaryRecord,
    ReviewAssignmentRecord, ReviewerRecord, WebhookDeliveryRecord,
};
use crate::pipeline::job::TranslationJob;
use crate::pipeline::review::ReviewQueue;
use crate::pipeline::{JobStore, RunnableJob};
use crate::webhook::{JobNotification, WebhookQueue};

const JOB_COLUMNS: &str = "id, org_id, source_language, target_language, tier, content, content_type, \
     metadata, translated_content, word_count, quality_scores, flagged_segments, callback_url, \
     glossary_id, error_message, status, attempt, next_retry_at, created_at, updated_at, completed_at";

const DELIVERY_COLUMNS: &str = "id, job_id, callback_url, payload, attempt_count, status, next_attempt_at, \
     last_attempt_at, last_response_code, last_error, created_at";

/// Raw `translation_jobs` row before JSON and enum decoding
struct JobRow {
    id: String,
    org_id: Option<String>,
    source_language: String,
    target_language: String,
    tier: String,
    content: String,
    content_type: String,
    metadata: Option<String>,
    translated_content: Option<String>,
    word_count: Option<i64>,
    quality_scores: Option<String>,
    flagged_segments: String,
    callback_url: Option<String>,
    glossary_id: Option<String>,
    error_message: Option<String>,
    status: String,
    attempt: i64,
    next_retry_at: Option<String>,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            org_id: row.get(1)?,
            source_language: row.get(2)?,
            target_language: row.get(3)?,
            tier: row.get(4)?,
            content: row.get(5)?,
            content_type: row.get(6)?,
            metadata: row.get(7)?,
            translated_content: row.get(8)?,
            word_count: row.get(9)?,
            quality_scores: row.get(10)?,
            flagged_segments: row.get(11)?,
            callback_url: row.get(12)?,
            glossary_id: row.get(13)?,
            error_message: row.get(14)?,
            status: row.get(15)?,
            attempt: row.get(16)?,
            next_retry_at: row.get(17)?,
            created_at: row.get(18)?,
            updated_at: row.get(19)?,
            completed_at: row.get(20)?,
        })
    }

    fn into_job(self) -> Result<TranslationJob> {
        let context = |field: &str| format!("Invalid {} for job {}", field, self.id);

        Ok(TranslationJob {
            org_id: self.org_id,
            source_language: self.source_language,
            target_language: self.target_language,
            tier: self.tier.parse().with_context(|| context("tier"))?,
            content_type: self.content_type.parse().with_context(|| context("content_type"))?,
            metadata: self
                .metadata
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .with_context(|| context("metadata"))?,
            translated_content: self.translated_content,
            word_count: self.word_count.map(|n| n.max(0) as usize),
            quality_scores: self
                .quality_scores
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .with_context(|| context("quality_scores"))?,
            flagged_segments: serde_json::from_str(&self.flagged_segments)
                .with_context(|| context("flagged_segments"))?,
            callback_url: self.callback_url,
            glossary_id: self.glossary_id,
            error_message: self.error_message,
            status: self.status.parse().with_context(|| context("status"))?,
            attempt: self.attempt.max(0) as u32,
            next_retry_at: self.next_retry_at.as_deref().map(parse_timestamp).transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            completed_at: self.completed_at.as_deref().map(parse_timestamp).transpose()?,
            content: self.content,
            id: self.id,
        })
    }
}

fn parse_delivery_row(row: &rusqlite::Row) -> rusqlite::Result<WebhookDeliveryRecord> {
    Ok(WebhookDeliveryRecord {
        id: row.get(0)?,
        job_id: row.get(1)?,
        callback_url: row.get(2)?,
        payload: row.get(3)?,
        attempt_count: row.get::<_, i64>(4)?.max(0) as u32,
        status: row
            .get::<_, String>(5)?
            .parse()
            .unwrap_or(DeliveryStatus::Pending),
        next_attempt_at: row.get(6)?,
        last_attempt_at: row.get(7)?,
        last_response_code: row.get::<_, Option<i64>>(8)?.map(|c| c as u16),
        last_error: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn parse_reviewer_row(row: &rusqlite::Row) -> rusqlite::Result<(ReviewerRecord, String)> {
    Ok((
        ReviewerRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            language_pairs: Vec::new(),
            active: row.get::<_, i64>(4)? != 0,
            created_at: row.get(5)?,
        },
        row.get(3)?,
    ))
}

/// Reviewers ordered by creation, with their language pairs decoded
fn load_reviewers(conn: &Connection, active_only: bool) -> Result<Vec<ReviewerRecord>> {
    let sql = if active_only {
        "SELECT id, name, email, language_pairs, active, created_at FROM reviewers
         WHERE active = 1 ORDER BY created_at, id"
    } else {
        "SELECT id, name, email, language_pairs, active, created_at FROM reviewers
         ORDER BY created_at, id"
    };

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], parse_reviewer_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(mut reviewer, pairs)| {
            reviewer.language_pairs = serde_json::from_str(&pairs)
                .with_context(|| format!("Invalid language_pairs for reviewer {}", reviewer.id))?;
            Ok(reviewer)
        })
        .collect()
}

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // Job Operations
    // =========================================================================

    /// Insert a new job. Fails if the id already exists.
    pub async fn create_job(&self, job: &TranslationJob) -> Result<()> {
        let job = job.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO translation_jobs ({}) VALUES \
                         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
                        JOB_COLUMNS
                    ),
                    params_from_iter(Self::job_params(&job)?),
                )
                .with_context(|| format!("Failed to insert job {}", job.id))?;
                debug!("Created job {} ({})", job.id, job.status);
                Ok(())
            })
            .await
    }

    /// Insert or update a job in a single statement
    pub async fn save_job(&self, job: &TranslationJob) -> Result<()> {
        let job = job.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    &format!(
                        r#"
                        INSERT INTO translation_jobs ({}) VALUES
                            (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
                        ON CONFLICT(id) DO UPDATE SET
                            org_id = excluded.org_id,
                            source_language = excluded.source_language,
                            target_language = excluded.target_language,
                            tier = excluded.tier,
                            content = excluded.content,
                            content_type = excluded.content_type,
                            metadata = excluded.metadata,
                            translated_content = excluded.translated_content,
                            word_count = excluded.word_count,
                            quality_scores = excluded.quality_scores,
                            flagged_segments = excluded.flagged_segments,
                            callback_url = excluded.callback_url,
                            glossary_id = excluded.glossary_id,
                            error_message = excluded.error_message,
                            status = excluded.status,
                            attempt = excluded.attempt,
                            next_retry_at = excluded.next_retry_at,
                            updated_at = excluded.updated_at,
                            completed_at = excluded.completed_at
                        "#,
                        JOB_COLUMNS
                    ),
                    params_from_iter(Self::job_params(&job)?),
                )
                .with_context(|| format!("Failed to save job {}", job.id))?;
                Ok(())
            })
            .await
    }

    /// Get a job by id
    pub async fn get_job(&self, job_id: &str) -> Result<Option<TranslationJob>> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let row = conn
                    .query_row(
                        &format!("SELECT {} FROM translation_jobs WHERE id = ?1", JOB_COLUMNS),
                        [&job_id],
                        JobRow::from_row,
                    )
                    .optional()?;

                row.map(JobRow::into_job).transpose()
            })
            .await
    }

    /// Queued jobs plus failed jobs whose retry is due at `now`, oldest first
    pub async fn list_runnable_jobs(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<TranslationJob>> {
        let now = format_timestamp(now);

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM translation_jobs
                     WHERE status = 'queued'
                        OR (status = 'failed' AND next_retry_at IS NOT NULL AND next_retry_at <= ?1)
                     ORDER BY created_at, id LIMIT ?2",
                    JOB_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![now, limit as i64], JobRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                rows.into_iter().map(JobRow::into_job).collect()
            })
            .await
    }

    fn job_params(job: &TranslationJob) -> Result<Vec<Box<dyn rusqlite::ToSql>>> {
        let metadata = job.metadata.as_ref().map(serde_json::to_string).transpose()?;
        let quality_scores = job.quality_scores.as_ref().map(serde_json::to_string).transpose()?;
        let flagged_segments = serde_json::to_string(&job.flagged_segments)?;

        Ok(vec![
            Box::new(job.id.clone()),
            Box::new(job.org_id.clone()),
            Box::new(job.source_language.clone()),
            Box::new(job.target_language.clone()),
            Box::new(job.tier.to_string()),
            Box::new(job.content.clone()),
            Box::new(job.content_type.to_string()),
            Box::new(metadata),
            Box::new(job.translated_content.clone()),
            Box::new(job.word_count.map(|n| n as i64)),
            Box::new(quality_scores),
            Box::new(flagged_segments),
            Box::new(job.callback_url.clone()),
            Box::new(job.glossary_id.clone()),
            Box::new(job.error_message.clone()),
            Box::new(job.status.to_string()),
            Box::new(job.attempt as i64),
            Box::new(job.next_retry_at.map(format_timestamp)),
            Box::new(format_timestamp(job.created_at)),
            Box::new(format_timestamp(job.updated_at)),
            Box::new(job.completed_at.map(format_timestamp)),
        ])
    }

    // =========================================================================
    // Glossary Operations
    // =========================================================================

    pub async fn create_glossary(&self, glossary: &GlossaryRecord) -> Result<()> {
        let glossary = glossary.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO glossaries (id, name, language_pair, terms, org_id, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                    params![
                        glossary.id,
                        glossary.name,
                        glossary.language_pair,
                        serde_json::to_string(&glossary.terms)?,
                        glossary.org_id,
                        glossary.created_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get_glossary(&self, glossary_id: &str) -> Result<Option<GlossaryRecord>> {
        let glossary_id = glossary_id.to_string();

        self.db
            .execute_async(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT id, name, language_pair, terms, org_id, created_at FROM glossaries WHERE id = ?1",
                        [&glossary_id],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, String>(3)?,
                                row.get::<_, Option<String>>(4)?,
                                row.get::<_, String>(5)?,
                            ))
                        },
                    )
                    .optional()?;

                row.map(|(id, name, language_pair, terms, org_id, created_at)| {
                    let terms: HashMap<String, String> = serde_json::from_str(&terms)
                        .with_context(|| format!("Invalid terms for glossary {}", id))?;
                    Ok(GlossaryRecord {
                        id,
                        name,
                        language_pair,
                        terms,
                        org_id,
                        created_at,
                    })
                })
                .transpose()
            })
            .await
    }

    // =========================================================================
    // Reviewer Operations
    // =========================================================================

    pub async fn create_reviewer(&self, reviewer: &ReviewerRecord) -> Result<()> {
        let reviewer = reviewer.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO reviewers (id, name, email, language_pairs, active, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                    params![
                        reviewer.id,
                        reviewer.name,
                        reviewer.email,
                        serde_json::to_string(&reviewer.language_pairs)?,
                        reviewer.active as i64,
                        reviewer.created_at,
                    ],
                )
                .with_context(|| format!("Failed to insert reviewer {}", reviewer.email))?;
                Ok(())
            })
            .await
    }

    pub async fn list_reviewers(&self, active_only: bool) -> Result<Vec<ReviewerRecord>> {
        self.db
            .execute_async(move |conn| load_reviewers(conn, active_only))
            .await
    }

    /// Assign the first active reviewer covering `language_pair`.
    ///
    /// Runs in one transaction so the lookup and the assignment insert
    /// cannot interleave with another worker's.
    pub async fn assign_reviewer(&self, job_id: &str, language_pair: &str) -> Result<Option<ReviewAssignmentRecord>> {
        let job_id = job_id.to_string();
        let language_pair = language_pair.to_string();

        self.db
            .transaction_async(move |tx| {
                let reviewers = load_reviewers(tx, true)?;
                let Some(reviewer) = reviewers.into_iter().find(|r| r.covers(&language_pair)) else {
                    return Ok(None);
                };

                let assignment = ReviewAssignmentRecord {
                    id: uuid::Uuid::new_v4().to_string(),
                    job_id,
                    reviewer_id: reviewer.id,
                    role: "reviewer".to_string(),
                    assigned_at: now_timestamp(),
                    completed_at: None,
                };
                tx.execute(
                    r#"
                    INSERT INTO review_assignments (id, job_id, reviewer_id, role, assigned_at, completed_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                    params![
                        assignment.id,
                        assignment.job_id,
                        assignment.reviewer_id,
                        assignment.role,
                        assignment.assigned_at,
                        assignment.completed_at,
                    ],
                )
                .with_context(|| format!("Failed to assign reviewer for job {}", assignment.job_id))?;
                Ok(Some(assignment))
            })
            .await
    }

    pub async fn get_assignments(&self, job_id: &str) -> Result<Vec<ReviewAssignmentRecord>> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, job_id, reviewer_id, role, assigned_at, completed_at
                    FROM review_assignments WHERE job_id = ?1 ORDER BY assigned_at
                    "#,
                )?;
                let assignments = stmt
                    .query_map([&job_id], |row| {
                        Ok(ReviewAssignmentRecord {
                            id: row.get(0)?,
                            job_id: row.get(1)?,
                            reviewer_id: row.get(2)?,
                            role: row.get(3)?,
                            assigned_at: row.get(4)?,
                            completed_at: row.get(5)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(assignments)
            })
            .await
    }

    // =========================================================================
    // Webhook Delivery Operations
    // =========================================================================

    pub async fn insert_webhook_delivery(&self, record: &WebhookDeliveryRecord) -> Result<()> {
        let record = record.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO webhook_deliveries ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                        DELIVERY_COLUMNS
                    ),
                    params![
                        record.id,
                        record.job_id,
                        record.callback_url,
                        record.payload,
                        record.attempt_count,
                        record.status.to_string(),
                        record.next_attempt_at,
                        record.last_attempt_at,
                        record.last_response_code,
                        record.last_error,
                        record.created_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Pending deliveries due at or before `now`, oldest due first
    pub async fn due_webhook_deliveries(&self, now: &str, limit: usize) -> Result<Vec<WebhookDeliveryRecord>> {
        let now = now.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"
                    SELECT {} FROM webhook_deliveries
                    WHERE status = 'pending' AND next_attempt_at <= ?1
                    ORDER BY next_attempt_at, created_at
                    LIMIT ?2
                    "#,
                    DELIVERY_COLUMNS
                ))?;
                let records = stmt
                    .query_map(params![now, limit as i64], parse_delivery_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(records)
            })
            .await
    }

    /// Persist the state of a delivery after an attempt
    pub async fn update_webhook_delivery(&self, record: &WebhookDeliveryRecord) -> Result<()> {
        let record = record.clone();

        self.db
            .execute_async(move |conn| {
                let updated = conn.execute(
                    r#"
                    UPDATE webhook_deliveries
                    SET attempt_count = ?2, status = ?3, next_attempt_at = ?4,
                        last_attempt_at = ?5, last_response_code = ?6, last_error = ?7
                    WHERE id = ?1
                    "#,
                    params![
                        record.id,
                        record.attempt_count,
                        record.status.to_string(),
                        record.next_attempt_at,
                        record.last_attempt_at,
                        record.last_response_code,
                        record.last_error,
                    ],
                )?;
                if updated == 0 {
                    anyhow::bail!("Webhook delivery {} not found", record.id);
                }
                Ok(())
            })
            .await
    }

    pub async fn get_webhook_deliveries(&self, job_id: &str) -> Result<Vec<WebhookDeliveryRecord>> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM webhook_deliveries WHERE job_id = ?1 ORDER BY created_at",
                    DELIVERY_COLUMNS
                ))?;
                let records = stmt
                    .query_map([&job_id], parse_delivery_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(records)
            })
            .await
    }
}

#[async_trait]
impl JobStore for Repository {
    async fn load_job(&self, job_id: &str) -> Result<Option<TranslationJob>> {
        self.get_job(job_id).await
    }

    async fn commit_job(&self, job: &TranslationJob) -> Result<()> {
        self.save_job(job).await
    }

    async fn load_glossary_terms(&self, glossary_id: &str) -> Result<Option<HashMap<String, String>>> {
        Ok(self.get_glossary(glossary_id).await?.map(|g| g.terms))
    }

    async fn runnable_jobs(&self, limit: usize) -> Result<Vec<RunnableJob>> {
        let jobs = self.list_runnable_jobs(Utc::now(), limit).await?;
        Ok(jobs
            .into_iter()
            .map(|job| RunnableJob {
                attempt: job.next_attempt(),
                job_id: job.id,
            })
            .collect())
    }
}

#[async_trait]
impl ReviewQueue for Repository {
    async fn assign(&self, job_id: &str, language_pair: &str) -> Result<Option<String>> {
        Ok(self
            .assign_reviewer(job_id, language_pair)
            .await?
            .map(|assignment| assignment.reviewer_id))
    }
}

#[async_trait]
impl WebhookQueue for Repository {
    async fn enqueue(&self, url: &str, job_id: &str, notification: &JobNotification) -> Result<()> {
        let payload = serde_json::to_string(notification)?;
        let record = WebhookDeliveryRecord::new(job_id, url, payload);
        self.insert_webhook_delivery(&record).await?;
        info!("Queued {} webhook for job {}", notification.status, job_id);
        Ok(())
    }
}
