//! lotgraph - temporal proximity graphs from parking-occupancy frames.
//!
//! This library turns a directory of per-frame parking-spot records into a
//! time-ordered sequence of graphs, ready for training spatio-temporal
//! models.
//!
//! # Guarantees
//!
//! - **Read-only inputs**: Source CSV files are never rewritten
//! - **Stable topology**: Every frame shares the registry's node set and order
//! - **No silent gaps**: Every skipped source is counted and reported
//! - **No leakage**: Splits are contiguous in time, never shuffled
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          lotgraph                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Ingest    │──▶│    Graph    │──▶│  Sequence   │       │
//! │  │ (CSV, ts)   │   │  (workers)  │   │ (sort/dedup)│       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         │                                    │              │
//! │         ▼                                    ▼              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   RunLog    │   │Split / Batch│◀──│ Interpolate │       │
//! │  │  (report)   │   │  / Export   │   │ (per second)│       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use lotgraph::{Pipeline, PipelineConfig};
//! use std::path::Path;
//!
//! let pipeline = Pipeline::new(PipelineConfig::default())?;
//! let output = pipeline.run(Path::new("frames"))?;
//!
//! for batch in pipeline.batches(&output.splits.train)? {
//!     println!("{} frames, {} nodes", batch.num_frames(), batch.graph.num_nodes());
//! }
//! # Ok::<(), lotgraph::PipelineError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod ingest;
pub mod pipeline;
pub mod report;

// Re-export key types at crate root for convenience
pub use config::{ConfigError, EdgeWeighting, GraphConfig, PipelineConfig};
pub use core::{
    BatchedFrameGraph, Batcher, DatasetSplits, FeatureNormalizer, FrameGraph, GraphBuilder,
    SequenceAssembler, Splitter, TemporalGraphSequence, TemporalInterpolator,
};
pub use error::PipelineError;
pub use ingest::{FrameObservation, Node, NodeTable};
pub use pipeline::{Pipeline, PipelineOutput};
pub use report::{RunLog, RunStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
