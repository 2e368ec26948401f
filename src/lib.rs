/*!
 * # Hawk Translation - translation job pipeline engine
 *
 * Turns submitted HTML articles into translated HTML. Each job is split
 * into translatable segments, passed through an organisation glossary,
 * translated in batches by a language-routed backend, scored for quality
 * and either completed or handed off to a human reviewer. Callers are told
 * about the outcome through webhooks.
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `language_utils`: Supported target languages and their routes
 * - `translation`: Segmentation, glossary, batch translation and scoring:
 *   - `translation::segmenter`: HTML to segments and back
 *   - `translation::glossary`: Mandated term substitution
 *   - `translation::orchestrator`: Batched translation with fallback
 *   - `translation::quality`: Per-segment quality scoring
 *   - `translation::prompts`: Prompt construction and style rules
 * - `providers`: Translation and scoring backends:
 *   - `providers::anthropic`: Anthropic Messages API
 *   - `providers::google`: Google Cloud Translation v2
 *   - `providers::mock`: Scripted backends for tests and dry runs
 * - `pipeline`: Job lifecycle, pipeline controller, review handoff and
 *   the bounded dispatcher
 * - `webhook`: Outcome notifications with bounded retries
 * - `database`: SQLite persistence for jobs, glossaries, reviewers and
 *   webhook deliveries
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod database;
pub mod errors;
pub mod language_utils;
pub mod pipeline;
pub mod providers;
pub mod translation;
pub mod webhook;

// Re-export main types for easier usage
pub use app_config::Config;
pub use database::{DatabaseConnection, Repository};
pub use errors::{JobError, ProviderError, SegmentError, TranslationError};
pub use language_utils::{get_language_name, route_for, Route};
pub use pipeline::{Dispatcher, JobStatus, Pipeline, PipelineFailure, Tier, TranslationJob};
pub use webhook::{JobNotification, WebhookDeliverer};
