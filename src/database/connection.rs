/*!
 * SQLite handle shared by the job store.
 *
 * A single connection sits behind a mutex; every query from async code is
 * moved onto tokio's blocking pool so the runtime threads never wait on disk.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::schema;

const DB_FILENAME: &str = "hawk.db";
const DATA_DIRNAME: &str = "hawk-translation";

/// Cloneable handle to the job database.
#[derive(Clone)]
pub struct DatabaseConnection {
    /// `None` for in-memory databases
    file: Option<PathBuf>,
    connection: Arc<Mutex<Connection>>,
}

impl DatabaseConnection {
    /// Open `hawk.db` under the user's local data directory.
    pub fn new_default() -> Result<Self> {
        Self::new(default_database_path()?)
    }

    /// Open (or create) the database file at `db_path` and bring its schema up to date.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }

        info!("Opening job database at: {:?}", db_path);
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open database: {:?}", db_path))?;

        Self::with_schema(conn, Some(db_path))
    }

    /// In-memory database, used by tests and dry runs.
    pub fn new_in_memory() -> Result<Self> {
        debug!("Creating in-memory job database");
        let conn = Connection::open_in_memory().context("Failed to create in-memory database")?;
        Self::with_schema(conn, None)
    }

    fn with_schema(conn: Connection, file: Option<PathBuf>) -> Result<Self> {
        schema::initialize_schema(&conn)?;
        Ok(Self {
            file,
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    pub async fn execute_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = self.connection.clone();
        tokio::task::spawn_blocking(move || -> Result<T> {
            let conn = lock(&connection)?;
            f(&conn)
        })
            .await
            .context("Database task panicked")?
    }

    /// Run `f` inside a transaction; commits only when `f` returns `Ok`.
    pub async fn transaction_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = self.connection.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&connection)?;
            let tx = conn.transaction()?;
            let result = f(&tx)?;
            tx.commit()?;
            Ok(result)
        })
        .await
        .context("Database transaction task panicked")?
    }

    /// Job and webhook counts for the `stats` command.
    pub async fn stats(&self) -> Result<DatabaseStats> {
        let file_size_bytes = self
            .file
            .as_ref()
            .and_then(|path| std::fs::metadata(path).ok())
            .map_or(0, |meta| meta.len());

        self.execute_async(move |conn| {
            let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) };

            Ok(DatabaseStats {
                job_count: count("SELECT COUNT(*) FROM translation_jobs")?,
                queued_jobs: count("SELECT COUNT(*) FROM translation_jobs WHERE status = 'queued'")?,
                in_review_jobs: count("SELECT COUNT(*) FROM translation_jobs WHERE status = 'in_review'")?,
                pending_webhooks: count("SELECT COUNT(*) FROM webhook_deliveries WHERE status = 'pending'")?,
                file_size_bytes,
            })
        })
        .await
    }
}

fn lock(connection: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    connection
        .lock()
        .map_err(|e| anyhow::anyhow!("Failed to acquire database lock: {}", e))
}

fn default_database_path() -> Result<PathBuf> {
    let base_dir = dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

    Ok(base_dir.join(DATA_DIRNAME).join(DB_FILENAME))
}

/// Row counts reported by `hawk stats`.
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub job_count: i64,
    pub queued_jobs: i64,
    pub in_review_jobs: i64,
    pub pending_webhooks: i64,
    /// Zero for in-memory databases
    pub file_size_bytes: u64,
}

impl std::fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Jobs: {} ({} queued, {} in review), Pending webhooks: {}, Size: {} KB",
            self.job_count,
            self.queued_jobs,
            self.in_review_jobs,
            self.pending_webhooks,
            self.file_size_bytes / 1024
        )
    }
}
