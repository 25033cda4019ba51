//! Statistics generation from the fetch archive
//!
//! This module provides functionality for extracting and displaying
//! archive statistics from the storage layer.

use crate::storage::{Archive, FetchOutcome, RunRecord, StorageResult};
use std::collections::HashMap;

/// Archive statistics summary
#[derive(Debug, Clone)]
pub struct ArchiveStatistics {
    /// Number of CLI runs recorded
    pub total_runs: u64,

    /// Total number of fetches archived
    pub total_fetches: u64,

    /// Count of fetches by outcome
    pub fetches_by_outcome: HashMap<FetchOutcome, u64>,

    /// Total body bytes of successful fetches
    pub total_bytes: u64,

    /// Failed fetches grouped by error message
    pub error_summary: HashMap<String, u64>,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,
}

impl ArchiveStatistics {
    /// Share of fetches that produced a body, as a percentage
    pub fn success_rate(&self) -> f64 {
        let fetched = self
            .fetches_by_outcome
            .get(&FetchOutcome::Fetched)
            .copied()
            .unwrap_or(0);

        if self.total_fetches > 0 {
            (fetched as f64 / self.total_fetches as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Loads statistics from an archive
pub fn load_statistics(archive: &dyn Archive) -> StorageResult<ArchiveStatistics> {
    let mut fetches_by_outcome = HashMap::new();
    for outcome in [FetchOutcome::Fetched, FetchOutcome::Failed] {
        let count = archive.count_fetches_by_outcome(outcome)?;
        if count > 0 {
            fetches_by_outcome.insert(outcome, count);
        }
    }

    Ok(ArchiveStatistics {
        total_runs: archive.count_runs()?,
        total_fetches: archive.count_total_fetches()?,
        fetches_by_outcome,
        total_bytes: archive.total_bytes()?,
        error_summary: archive.get_error_summary()?,
        latest_run: archive.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &ArchiveStatistics) {
    println!("=== Archive Statistics ===\n");

    println!("Overview:");
    println!("  Runs: {}", stats.total_runs);
    println!("  Total fetches: {}", stats.total_fetches);
    println!("  Bytes archived: {}", stats.total_bytes);
    if let Some(run) = &stats.latest_run {
        println!(
            "  Latest run: #{} started {} ({})",
            run.id,
            run.started_at,
            run.status.to_db_string()
        );
    }
    println!();

    println!("Fetches by Outcome:");
    let mut outcome_counts: Vec<_> = stats.fetches_by_outcome.iter().collect();
    outcome_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (outcome, count) in outcome_counts {
        let percentage = if stats.total_fetches > 0 {
            (*count as f64 / stats.total_fetches as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", outcome.to_db_string(), count, percentage);
    }
    println!();

    if !stats.error_summary.is_empty() {
        println!("Error Summary:");
        let mut error_counts: Vec<_> = stats.error_summary.iter().collect();
        error_counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (message, count) in error_counts {
            println!("  {}: {}", message, count);
        }
        println!();
    }

    println!("Success Rate: {:.1}%", stats.success_rate());
}
