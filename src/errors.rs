/*!
 * Error types for the hawk translation pipeline.
 *
 * This module contains custom error types for different parts of the pipeline,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when working with translation and scoring backends
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The call did not finish within its time budget
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// The backend cannot be used at all (e.g. no credential configured)
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_)
            | Self::ConnectionError(_)
            | Self::RateLimitExceeded(_)
            | Self::RequestFailed(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::ParseError(_) | Self::AuthenticationError(_) | Self::Unavailable(_) => false,
        }
    }

    /// Whether the backend answered with output of the wrong shape.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::ParseError(_))
    }

    /// Map a reqwest transport error onto the provider taxonomy
    pub fn from_transport(error: &reqwest::Error, timeout_secs: u64) -> Self {
        if error.is_timeout() {
            Self::Timeout(timeout_secs)
        } else if error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }

    /// Map a non-success HTTP status onto the provider taxonomy
    pub fn from_status(status_code: u16, message: String) -> Self {
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError {
                status_code,
                message,
            },
        }
    }
}

/// Errors that can occur during translation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// Target language is outside the supported set; a client input error
    #[error("Unsupported target language: '{code}'. Supported: {supported}")]
    UnsupportedLanguage {
        /// The rejected language code
        code: String,
        /// Comma separated list of supported codes
        supported: String,
    },
}

/// Errors that can occur while segmenting HTML
#[derive(Error, Debug)]
pub enum SegmentError {
    /// The DOM could not be serialized back to markup
    #[error("Failed to serialize element <{tag}>: {message}")]
    Serialize {
        /// Tag name of the element
        tag: String,
        /// Underlying error
        message: String,
    },
}

/// Errors raised by a pipeline run for one job
#[derive(Error, Debug)]
pub enum JobError {
    /// No job with the given id exists
    #[error("Job {0} not found")]
    NotFound(String),

    /// Error from the translation stage
    #[error(transparent)]
    Translation(#[from] TranslationError),

    /// Error from the segmentation stage
    #[error(transparent)]
    Segmentation(#[from] SegmentError),

    /// Error from the persistence layer
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A status change the state machine does not allow
    #[error("Illegal status transition from {from} to {to}")]
    IllegalTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// The review queue collaborator failed
    #[error("Review queue error: {0}")]
    ReviewQueue(String),

    /// The job is not in a state that allows the requested operation
    #[error("Invalid job state: {0}")]
    InvalidState(String),
}

impl JobError {
    /// Whether a pipeline re-run may succeed where this run failed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::NotFound(_) | Self::Translation(TranslationError::UnsupportedLanguage { .. })
        )
    }

    /// Wrap a persistence-layer error
    pub fn persistence(error: anyhow::Error) -> Self {
        Self::Persistence(format!("{:#}", error))
    }
}
