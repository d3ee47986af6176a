//! Run accounting for the graph preparation pipeline.
//!
//! Counts what happened to every frame source so that a run never ends with
//! silently missing frames.

use crate::core::sequence::{SkipReason, SkippedSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Counters for one pipeline run.
///
/// Counters are atomic so worker threads can record progress directly.
#[derive(Debug)]
pub struct RunLog {
    /// Frame files found under the input root
    sources_discovered: AtomicU64,
    /// Frames parsed and turned into graphs
    frames_loaded: AtomicU64,
    /// Frames synthesized by interpolation
    frames_interpolated: AtomicU64,
    /// Files written to the output directory
    files_written: AtomicU64,
    /// Sources left out, with reasons
    skipped: Mutex<Vec<SkippedSource>>,
    /// Run start time
    started_at: DateTime<Utc>,
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            sources_discovered: AtomicU64::new(0),
            frames_loaded: AtomicU64::new(0),
            frames_interpolated: AtomicU64::new(0),
            files_written: AtomicU64::new(0),
            skipped: Mutex::new(Vec::new()),
            started_at: Utc::now(),
        }
    }

    pub fn record_sources_discovered(&self, count: u64) {
        self.sources_discovered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_frame_loaded(&self) {
        self.frames_loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frames_interpolated(&self, count: u64) {
        self.frames_interpolated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_files_written(&self, count: u64) {
        self.files_written.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a source that did not make it into the sequence.
    pub fn record_skipped(&self, skipped: SkippedSource) {
        if let Ok(mut list) = self.skipped.lock() {
            list.push(skipped);
        }
    }

    pub fn record_skipped_all(&self, skipped: impl IntoIterator<Item = SkippedSource>) {
        if let Ok(mut list) = self.skipped.lock() {
            list.extend(skipped);
        }
    }

    /// Skipped sources recorded so far.
    pub fn skipped(&self) -> Vec<SkippedSource> {
        self.skipped.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Get the current statistics.
    pub fn stats(&self) -> RunStats {
        let skipped = self.skipped();
        let count = |reason: SkipReason| skipped.iter().filter(|s| s.reason == reason).count() as u64;

        RunStats {
            sources_discovered: self.sources_discovered.load(Ordering::Relaxed),
            frames_loaded: self.frames_loaded.load(Ordering::Relaxed),
            frames_interpolated: self.frames_interpolated.load(Ordering::Relaxed),
            files_written: self.files_written.load(Ordering::Relaxed),
            malformed_records: count(SkipReason::MalformedRecord),
            unparsed_timestamps: count(SkipReason::TimestampParse),
            duplicate_timestamps: count(SkipReason::DuplicateTimestamp),
            unreadable_sources: count(SkipReason::Unreadable),
            started_at: self.started_at,
            elapsed_ms: (Utc::now() - self.started_at).num_milliseconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        let mut out = format!(
            "Run Summary:\n\
             - Frame sources discovered: {}\n\
             - Frames loaded: {}\n\
             - Frames interpolated: {}\n\
             - Files written: {}\n\
             - Skipped (malformed record): {}\n\
             - Skipped (unparseable timestamp): {}\n\
             - Skipped (duplicate timestamp): {}\n\
             - Skipped (unreadable): {}\n\
             - Elapsed: {} ms",
            stats.sources_discovered,
            stats.frames_loaded,
            stats.frames_interpolated,
            stats.files_written,
            stats.malformed_records,
            stats.unparsed_timestamps,
            stats.duplicate_timestamps,
            stats.unreadable_sources,
            stats.elapsed_ms
        );

        let skipped = self.skipped();
        if !skipped.is_empty() {
            out.push_str("\n\nSkipped sources:");
            for s in &skipped {
                out.push_str(&format!("\n  {} ({:?}): {}", s.source, s.reason, s.detail));
            }
        }
        out
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of run statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub sources_discovered: u64,
    pub frames_loaded: u64,
    pub frames_interpolated: u64,
    pub files_written: u64,
    pub malformed_records: u64,
    pub unparsed_timestamps: u64,
    pub duplicate_timestamps: u64,
    pub unreadable_sources: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl RunStats {
    /// Sources that did not end up in the sequence, for any reason.
    pub fn total_skipped(&self) -> u64 {
        self.malformed_records
            + self.unparsed_timestamps
            + self.duplicate_timestamps
            + self.unreadable_sources
    }
}

/// Thread-safe shared run log.
pub type SharedRunLog = Arc<RunLog>;

/// Create a new shared run log.
pub fn create_shared_log() -> SharedRunLog {
    Arc::new(RunLog::new())
}
