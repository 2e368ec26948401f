use anyhow::{Context, Result, anyhow};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pipeline::retry::RetryPolicy;

/// Application configuration module
/// This module handles the pipeline configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// SQLite database file; defaults to the user's data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Quality scoring config
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Pipeline retry config
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Webhook delivery config
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Worker pool config
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Anthropic service configuration (primary translation backend and scorer)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnthropicConfig {
    /// Model name used for translation
    #[serde(default = "default_anthropic_model")]
    pub model: String,

    /// API key for the service
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Service endpoint URL (optional, for self-hosted gateways)
    #[serde(default = "default_anthropic_endpoint")]
    pub endpoint: String,

    /// Maximum number of tokens to generate per batch
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            model: default_anthropic_model(),
            api_key: String::new(),
            endpoint: default_anthropic_endpoint(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Google Cloud Translation configuration (secondary backend)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GoogleConfig {
    /// API key; when empty the secondary backend is unavailable
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Service endpoint URL
    #[serde(default = "default_google_endpoint")]
    pub endpoint: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_google_endpoint(),
        }
    }
}

/// Translation orchestrator configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Segments per backend call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Additional attempts after a transient backend failure
    #[serde(default = "default_translation_retries")]
    pub max_retries: u32,

    /// Per-call timeout in seconds
    #[serde(default = "default_translation_timeout_secs")]
    pub timeout_secs: u64,

    /// Primary backend
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Secondary backend
    #[serde(default)]
    pub google: GoogleConfig,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_translation_retries(),
            timeout_secs: default_translation_timeout_secs(),
            anthropic: AnthropicConfig::default(),
            google: GoogleConfig::default(),
        }
    }
}

impl TranslationConfig {
    /// Per-call timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Quality scoring configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScoringConfig {
    /// Whether segments are scored at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Overall score below which a segment needs review
    #[serde(default = "default_score_threshold")]
    pub threshold: f64,

    /// Additional attempts after a transient scoring failure
    #[serde(default = "default_scoring_retries")]
    pub max_retries: u32,

    /// Per-call timeout in seconds
    #[serde(default = "default_scoring_timeout_secs")]
    pub timeout_secs: u64,

    /// Characters of each text sent to the scorer
    #[serde(default = "default_scoring_max_chars")]
    pub max_chars: usize,

    /// Model used for scoring; reuses the translation credentials
    #[serde(default = "default_anthropic_model")]
    pub model: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: default_score_threshold(),
            max_retries: default_scoring_retries(),
            timeout_secs: default_scoring_timeout_secs(),
            max_chars: default_scoring_max_chars(),
            model: default_anthropic_model(),
        }
    }
}

/// Pipeline-level retry configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Re-runs allowed after the first attempt
    #[serde(default = "default_pipeline_retries")]
    pub max_retries: u32,

    /// Delay before each re-run, indexed by attempt
    #[serde(default = "default_pipeline_backoff_secs")]
    pub backoff_secs: Vec<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_pipeline_retries(),
            backoff_secs: default_pipeline_backoff_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(self.max_retries, &self.backoff_secs)
    }
}

/// Webhook delivery configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WebhookConfig {
    /// Redeliveries allowed after the first attempt
    #[serde(default = "default_webhook_retries")]
    pub max_retries: u32,

    /// Delay before each redelivery, indexed by attempt
    #[serde(default = "default_webhook_backoff_secs")]
    pub backoff_secs: Vec<u64>,

    /// Per-call timeout in seconds
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            max_retries: default_webhook_retries(),
            backoff_secs: default_webhook_backoff_secs(),
            timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

impl WebhookConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(self.max_retries, &self.backoff_secs)
    }
}

/// Worker pool configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Pipeline runs executing at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Seconds between polls for queued jobs and due webhooks
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Maximum rows picked up per poll
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_secs: default_poll_interval_secs(),
            batch_limit: default_batch_limit(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<&LogLevel> for log::LevelFilter {
    fn from(level: &LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_batch_size() -> usize {
    25
}

fn default_translation_retries() -> u32 {
    2
}

fn default_translation_timeout_secs() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_score_threshold() -> f64 {
    3.0
}

fn default_scoring_retries() -> u32 {
    1
}

fn default_scoring_timeout_secs() -> u64 {
    30
}

fn default_scoring_max_chars() -> usize {
    2000
}

fn default_pipeline_retries() -> u32 {
    3
}

fn default_pipeline_backoff_secs() -> Vec<u64> {
    vec![30, 120, 600]
}

fn default_webhook_retries() -> u32 {
    5
}

fn default_webhook_backoff_secs() -> Vec<u64> {
    vec![300, 1800, 7200, 28800, 57600]
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_batch_limit() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_google_endpoint() -> String {
    "https://translation.googleapis.com".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-haiku-latest".to_string()
}

impl Config {
    /// Load configuration from a JSON file, writing a default file when missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok(config);
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Credentials and the database path may come from the environment
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            if !key.is_empty() {
                self.translation.anthropic.api_key = key;
            }
        }
        if let Ok(key) = std::env::var("GOOGLE_TRANSLATE_API_KEY") {
            if !key.is_empty() {
                self.translation.google.api_key = key;
            }
        }
        if let Ok(path) = std::env::var("HAWK_DATABASE_PATH") {
            if !path.is_empty() {
                self.database_path = Some(PathBuf::from(path));
            }
        }
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.translation.batch_size == 0 {
            return Err(anyhow!("translation.batch_size must be at least 1"));
        }
        if self.translation.timeout_secs == 0 || self.scoring.timeout_secs == 0 {
            return Err(anyhow!("Backend timeouts must be at least one second"));
        }
        if self.webhook.timeout_secs == 0 {
            return Err(anyhow!("webhook.timeout_secs must be at least one second"));
        }
        if !(1.0..=5.0).contains(&self.scoring.threshold) {
            return Err(anyhow!(
                "scoring.threshold must be between 1 and 5, got {}",
                self.scoring.threshold
            ));
        }
        if self.pipeline.backoff_secs.is_empty() || self.webhook.backoff_secs.is_empty() {
            return Err(anyhow!("Backoff schedules must contain at least one delay"));
        }
        if self.worker.concurrency == 0 {
            return Err(anyhow!("worker.concurrency must be at least 1"));
        }
        if self.translation.anthropic.api_key.is_empty() {
            warn!("No Anthropic API key configured; primary-route segments will be flagged for review");
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: None,
            translation: TranslationConfig::default(),
            scoring: ScoringConfig::default(),
            pipeline: PipelineConfig::default(),
            webhook: WebhookConfig::default(),
            worker: WorkerConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
