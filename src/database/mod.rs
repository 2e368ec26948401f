/*!
 * Database module for persistent storage of jobs and their collaborators.
 *
 * This module provides SQLite-based persistence for:
 * - Translation jobs and their lifecycle state
 * - Organisation glossaries
 * - Reviewers and review assignments
 * - Webhook deliveries awaiting retry
 */

pub mod schema;
pub mod connection;
pub mod repository;
pub mod models;

// Re-export main types
pub use connection::DatabaseConnection;
pub use repository::Repository;
