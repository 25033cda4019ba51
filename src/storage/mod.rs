//! Fetch archive
//!
//! This module handles persisting what the CLI fetched:
//! - SQLite database initialization and schema management
//! - Run tracking (one run per CLI invocation)
//! - One record per fetch, with the body or the error that replaced it

mod run;
mod schema;
mod sqlite;
mod traits;

pub use run::{archive_fetches, RunSummary};
pub use sqlite::SqliteArchive;
pub use traits::{Archive, StorageError, StorageResult};

use crate::fetch::ResponseShape;
use std::path::Path;

/// Opens or creates an archive database
pub fn open_archive(path: &Path) -> StorageResult<SqliteArchive> {
    SqliteArchive::new(path)
}

/// Represents a CLI run in the archive
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}

/// How a fetch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchOutcome {
    /// A body was received
    Fetched,

    /// The transport failed or the job never ran
    Failed,
}

impl FetchOutcome {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "fetched" => Some(Self::Fetched),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One archived fetch
#[derive(Debug, Clone)]
pub struct FetchRecord {
    pub id: i64,
    pub run_id: i64,
    pub url: String,
    pub shape: ResponseShape,
    pub outcome: FetchOutcome,
    pub byte_len: Option<u64>,
    pub body: Option<Vec<u8>>,
    pub error_message: Option<String>,
    pub fetched_at: String,
}

pub(crate) fn shape_from_db_string(s: &str) -> ResponseShape {
    match s {
        "raw" => ResponseShape::Raw,
        _ => ResponseShape::Text,
    }
}
