//! Output module for reporting on the fetch archive

pub mod stats;

pub use stats::{load_statistics, print_statistics, ArchiveStatistics};
