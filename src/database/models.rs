/*!
 * Database entity models.
 *
 * These structures map directly to database tables. The translation job
 * itself is modelled in `pipeline::job`; the repository converts it to and
 * from its row.
 */

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Fixed-width RFC 3339 timestamp so stored values sort chronologically
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time as a stored timestamp
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Parse a stored timestamp
pub fn parse_timestamp(value: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow::anyhow!("Invalid timestamp '{}': {}", value, e))
}

/// Webhook delivery status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Waiting for its next attempt
    Pending,
    /// Endpoint answered 2xx
    Delivered,
    /// URL scheme not deliverable
    Skipped,
    /// Retry budget spent
    Abandoned,
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Delivered => write!(f, "delivered"),
            DeliveryStatus::Skipped => write!(f, "skipped"),
            DeliveryStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DeliveryStatus::Pending),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "skipped" => Ok(DeliveryStatus::Skipped),
            "abandoned" => Ok(DeliveryStatus::Abandoned),
            _ => Err(anyhow::anyhow!("Invalid delivery status: {}", s)),
        }
    }
}

/// Organisation glossary record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossaryRecord {
    /// Unique glossary identifier (UUID)
    pub id: String,
    pub name: String,
    /// Language pair, e.g. `en-es`
    pub language_pair: String,
    /// Source term to mandated target term
    pub terms: HashMap<String, String>,
    pub org_id: Option<String>,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

impl GlossaryRecord {
    pub fn new(name: impl Into<String>, language_pair: impl Into<String>, terms: HashMap<String, String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            language_pair: language_pair.into(),
            terms,
            org_id: None,
            created_at: now_timestamp(),
        }
    }
}

/// Human reviewer record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Pairs the reviewer covers, e.g. `["en-es", "en-pt"]`
    pub language_pairs: Vec<String>,
    pub active: bool,
    pub created_at: String,
}

impl ReviewerRecord {
    pub fn new(name: impl Into<String>, email: impl Into<String>, language_pairs: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            email: email.into(),
            language_pairs,
            active: true,
            created_at: now_timestamp(),
        }
    }

    pub fn covers(&self, language_pair: &str) -> bool {
        self.language_pairs.iter().any(|p| p.eq_ignore_ascii_case(language_pair))
    }
}

/// Job to reviewer assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAssignmentRecord {
    pub id: String,
    pub job_id: String,
    pub reviewer_id: String,
    /// Assignment role, `reviewer` for pipeline handoffs
    pub role: String,
    pub assigned_at: String,
    pub completed_at: Option<String>,
}

/// Persisted webhook delivery state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookDeliveryRecord {
    pub id: String,
    pub job_id: String,
    pub callback_url: String,
    /// JSON payload as posted
    pub payload: String,
    /// Attempts made so far
    pub attempt_count: u32,
    pub status: DeliveryStatus,
    /// When the next attempt is due (RFC 3339), pending rows only
    pub next_attempt_at: Option<String>,
    pub last_attempt_at: Option<String>,
    pub last_response_code: Option<u16>,
    pub last_error: Option<String>,
    pub created_at: String,
}

impl WebhookDeliveryRecord {
    /// A pending delivery due immediately
    pub fn new(job_id: impl Into<String>, callback_url: impl Into<String>, payload: String) -> Self {
        let now = now_timestamp();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.into(),
            callback_url: callback_url.into(),
            payload,
            attempt_count: 0,
            status: DeliveryStatus::Pending,
            next_attempt_at: Some(now.clone()),
            last_attempt_at: None,
            last_response_code: None,
            last_error: None,
            created_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == DeliveryStatus::Pending
    }
}
