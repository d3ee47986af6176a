//! Input loading for the lotgraph pipeline.
//!
//! This module reads the node registry and per-frame occupancy records
//! from CSV, validates them and extracts frame timestamps.

pub mod loader;
pub mod timestamp;
pub mod types;

// Re-export commonly used types
pub use loader::{load_frame, load_registry, observation_from_records, read_records};
pub use timestamp::{format_token, TimestampExtractor, TIMESTAMP_FORMAT};
pub use types::{FrameObservation, Node, NodeRecord, NodeTable, StaticAttributes, REQUIRED_COLUMNS};
