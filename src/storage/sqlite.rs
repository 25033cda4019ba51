//! SQLite archive implementation

use crate::fetch::{Body, ResponseShape};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Archive, StorageError, StorageResult};
use crate::storage::{shape_from_db_string, FetchOutcome, FetchRecord, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

/// SQLite archive backend
pub struct SqliteArchive {
    conn: Connection,
}

impl SqliteArchive {
    /// Opens or creates the archive at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory archive (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn insert_fetch(
        &mut self,
        run_id: i64,
        url: &str,
        shape: ResponseShape,
        outcome: FetchOutcome,
        body: Option<&[u8]>,
        error_message: Option<&str>,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let byte_len = body.map(|b| b.len() as i64);

        self.conn.execute(
            "INSERT INTO fetches (run_id, url, shape, outcome, byte_len, body, error_message, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run_id,
                url,
                shape.as_str(),
                outcome.to_db_string(),
                byte_len,
                body,
                error_message,
                now
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

fn fetch_from_row(row: &Row<'_>) -> rusqlite::Result<FetchRecord> {
    Ok(FetchRecord {
        id: row.get(0)?,
        run_id: row.get(1)?,
        url: row.get(2)?,
        shape: shape_from_db_string(&row.get::<_, String>(3)?),
        outcome: FetchOutcome::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(FetchOutcome::Failed),
        byte_len: row.get::<_, Option<i64>>(5)?.map(|len| len as u64),
        body: row.get(6)?,
        error_message: row.get(7)?,
        fetched_at: row.get(8)?,
    })
}

impl Archive for SqliteArchive {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn count_runs(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Fetch Records =====

    fn record_fetched(&mut self, run_id: i64, url: &str, body: &Body) -> StorageResult<i64> {
        let bytes: &[u8] = match body {
            Body::Text(text) => text.as_bytes(),
            Body::Raw(raw) => raw,
        };
        self.insert_fetch(
            run_id,
            url,
            body.shape(),
            FetchOutcome::Fetched,
            Some(bytes),
            None,
        )
    }

    fn record_failed(
        &mut self,
        run_id: i64,
        url: &str,
        shape: ResponseShape,
        error_message: &str,
    ) -> StorageResult<i64> {
        self.insert_fetch(
            run_id,
            url,
            shape,
            FetchOutcome::Failed,
            None,
            Some(error_message),
        )
    }

    fn get_fetches(&self, run_id: i64) -> StorageResult<Vec<FetchRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, url, shape, outcome, byte_len, body, error_message, fetched_at
             FROM fetches WHERE run_id = ?1 ORDER BY id",
        )?;

        let fetches = stmt
            .query_map(params![run_id], fetch_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(fetches)
    }

    // ===== Statistics =====

    fn count_total_fetches(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM fetches", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_fetches_by_outcome(&self, outcome: FetchOutcome) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM fetches WHERE outcome = ?1",
            params![outcome.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn total_bytes(&self) -> StorageResult<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(byte_len), 0) FROM fetches WHERE outcome = ?1",
            params![FetchOutcome::Fetched.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(total as u64)
    }

    fn get_error_summary(&self) -> StorageResult<HashMap<String, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT error_message, COUNT(*) FROM fetches
             WHERE outcome = ?1 AND error_message IS NOT NULL
             GROUP BY error_message",
        )?;

        let summary = stmt
            .query_map(params![FetchOutcome::Failed.to_db_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(summary)
    }
}
