/// SQLite-backed store of submitted sessions.
///
/// This is the local system of record: the submit phase appends one entry per
/// session before the upload starts, and the upload task flips `synced` once
/// the remote side confirms. Rows are only ever removed by the retention trim,
/// which keeps the newest `capacity` entries.
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use exitrack_core::{AggregateResult, SubmissionEntry, SubmissionMeta};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Entries kept before oldest-first eviction.
pub const DEFAULT_CAPACITY: usize = 50;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS submissions (
         seq            INTEGER PRIMARY KEY AUTOINCREMENT,
         submission_id  TEXT NOT NULL UNIQUE,
         extracted_data TEXT NOT NULL,
         meta           TEXT NOT NULL,
         timestamp      TEXT NOT NULL,
         synced         INTEGER NOT NULL DEFAULT 0
     );
     CREATE INDEX IF NOT EXISTS idx_submissions_synced ON submissions(synced);";

const COLUMNS: &str = "submission_id, extracted_data, meta, timestamp, synced";

pub struct SubmissionStore {
    conn: Mutex<Connection>,
    capacity: usize,
}

impl SubmissionStore {
    /// Create or open a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create store directory {:?}", parent))?;
            }
        }
        let conn = Connection::open(path).context("Failed to open SQLite submissions database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize submissions schema")?;

        info!("SubmissionStore opened at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
            capacity: DEFAULT_CAPACITY,
        })
    }

    /// Open an in-memory database (for tests).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            capacity: DEFAULT_CAPACITY,
        })
    }

    /// Override the retention bound. Values below 1 are raised to 1.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append one entry, then trim to capacity. Returns how many old entries
    /// were evicted.
    pub async fn append(&self, entry: &SubmissionEntry) -> Result<usize> {
        let extracted = serde_json::to_string(&entry.extracted_data)?;
        let meta = serde_json::to_string(&entry.meta)?;

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO submissions (submission_id, extracted_data, meta, timestamp, synced)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.submission_id.to_string(),
                extracted,
                meta,
                entry.timestamp.to_rfc3339(),
                entry.synced,
            ],
        )
        .with_context(|| format!("Failed to append submission {}", entry.submission_id))?;
        let evicted = trim(&tx, self.capacity)?;
        tx.commit()?;

        debug!(submission_id = %entry.submission_id, evicted, "Submission appended");
        if evicted > 0 {
            info!(evicted, capacity = self.capacity, "Oldest submissions evicted");
        }
        Ok(evicted)
    }

    /// Flip `synced` to true. Returns false when the entry no longer exists
    /// (already evicted). Never flips back.
    pub async fn mark_synced(&self, submission_id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn
            .execute(
                "UPDATE submissions SET synced = 1 WHERE submission_id = ?1",
                params![submission_id.to_string()],
            )
            .with_context(|| format!("Failed to mark submission {} synced", submission_id))?;
        Ok(changed > 0)
    }

    pub async fn get(&self, submission_id: Uuid) -> Result<Option<SubmissionEntry>> {
        let conn = self.conn.lock().await;
        let sql = format!("SELECT {COLUMNS} FROM submissions WHERE submission_id = ?1");
        let entry = conn
            .query_row(&sql, params![submission_id.to_string()], row_to_entry)
            .optional()?;
        Ok(entry)
    }

    /// All entries, oldest first.
    pub async fn list(&self) -> Result<Vec<SubmissionEntry>> {
        let conn = self.conn.lock().await;
        let sql = format!("SELECT {COLUMNS} FROM submissions ORDER BY seq ASC");
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map([], row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Entries still waiting for remote confirmation, oldest first.
    pub async fn unsynced(&self) -> Result<Vec<SubmissionEntry>> {
        let conn = self.conn.lock().await;
        let sql = format!("SELECT {COLUMNS} FROM submissions WHERE synced = 0 ORDER BY seq ASC");
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map([], row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub async fn unsynced_count(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM submissions WHERE synced = 0", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub async fn len(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM submissions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

fn trim(conn: &Connection, capacity: usize) -> Result<usize> {
    let evicted = conn.execute(
        "DELETE FROM submissions WHERE seq NOT IN (
             SELECT seq FROM submissions ORDER BY seq DESC LIMIT ?1
         )",
        params![capacity as i64],
    )?;
    Ok(evicted)
}

// ---------------------------------------------------------------------------
// Row deserialization helper
// ---------------------------------------------------------------------------

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<SubmissionEntry> {
    let id_str: String = row.get(0)?;
    let extracted_json: String = row.get(1)?;
    let meta_json: String = row.get(2)?;
    let timestamp: String = row.get(3)?;
    let synced: bool = row.get(4)?;

    let submission_id = Uuid::parse_str(&id_str).map_err(|e| conversion_error(0, e))?;
    let extracted_data: AggregateResult =
        serde_json::from_str(&extracted_json).map_err(|e| conversion_error(1, e))?;
    let meta: SubmissionMeta = serde_json::from_str(&meta_json).map_err(|e| conversion_error(2, e))?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| conversion_error(3, e))?
        .with_timezone(&Utc);

    Ok(SubmissionEntry {
        submission_id,
        extracted_data,
        meta,
        timestamp,
        synced,
    })
}
