//! Output module for reporting on a backup root
//!
//! Summaries are computed from the persisted snapshots rather than from a live run, so they work
//! for finished, interrupted and in-progress mirrors alike.

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};
