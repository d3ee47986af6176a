//! Run reporting for the lotgraph pipeline.
//!
//! Tracks how many sources were discovered, loaded, synthesized and
//! skipped, so gaps in a generated sequence are always visible.

pub mod log;

// Re-export commonly used types
pub use log::{create_shared_log, RunLog, RunStats, SharedRunLog};
