//! Archive trait and error types

use crate::fetch::{Body, ResponseShape};
use crate::storage::{FetchOutcome, FetchRecord, RunRecord, RunStatus};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for archive backends
pub trait Archive {
    // ===== Run Management =====

    /// Creates a new run and returns its ID
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file the run used
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run finished with the given status
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    fn count_runs(&self) -> StorageResult<u64>;

    // ===== Fetch Records =====

    /// Archives a fetched body
    fn record_fetched(&mut self, run_id: i64, url: &str, body: &Body) -> StorageResult<i64>;

    /// Archives a fetch that produced no body
    fn record_failed(
        &mut self,
        run_id: i64,
        url: &str,
        shape: ResponseShape,
        error_message: &str,
    ) -> StorageResult<i64>;

    /// Gets every fetch of a run in the order it was archived
    fn get_fetches(&self, run_id: i64) -> StorageResult<Vec<FetchRecord>>;

    // ===== Statistics =====

    fn count_total_fetches(&self) -> StorageResult<u64>;

    fn count_fetches_by_outcome(&self, outcome: FetchOutcome) -> StorageResult<u64>;

    /// Sum of the body sizes of every successful fetch
    fn total_bytes(&self) -> StorageResult<u64>;

    /// Counts failed fetches grouped by error message
    fn get_error_summary(&self) -> StorageResult<HashMap<String, u64>>;
}
