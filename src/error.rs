//! Error types for the graph preparation pipeline.
//!
//! Frame-local failures (a malformed record, an unreadable timestamp) are
//! isolated by the pipeline and reported; everything else aborts the run.

use thiserror::Error;

/// Errors raised while loading frames and building graph sequences.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A registry or frame file is missing columns or holds bad rows.
    #[error("malformed record in {location}: {reason}")]
    MalformedRecord {
        /// Path or label of the offending source
        location: String,
        /// What was wrong with it
        reason: String,
    },

    /// No timestamp could be extracted from a frame source.
    #[error("cannot extract timestamp from {location}: {reason}")]
    TimestampParse { location: String, reason: String },

    /// A frame source exists on the walk but cannot be opened or read.
    #[error("cannot read {location}: {reason}")]
    UnreadableSource { location: String, reason: String },

    /// Two frames that must share topology do not.
    #[error("node set mismatch: {reason}")]
    NodeSetMismatch { reason: String },

    /// Distance threshold must be strictly positive and finite.
    #[error("invalid distance threshold {0}: must be > 0")]
    InvalidThreshold(f64),

    /// Any other configuration value out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Frames with different feature columns cannot be combined.
    #[error("feature layout mismatch: expected {expected:?}, got {actual:?}")]
    FeatureLayoutMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    pub(crate) fn malformed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::MalformedRecord {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn timestamp(location: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::TimestampParse {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unreadable(location: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::UnreadableSource {
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error only invalidates a single frame.
    ///
    /// Frame-local errors are reported and skipped; the rest of the
    /// sequence keeps processing.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            PipelineError::MalformedRecord { .. }
                | PipelineError::TimestampParse { .. }
                | PipelineError::UnreadableSource { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
