//! Core functionality of the graph preparation pipeline.
//!
//! This module contains:
//! - Proximity graph construction over fixed node positions
//! - Per-frame feature derivation and normalization
//! - Temporal interpolation of missing seconds
//! - Timestamp ordering, sequential splitting and disjoint-union batching

pub mod batch;
pub mod features;
pub mod graph;
pub mod interpolate;
pub mod sequence;
pub mod split;

// Re-export commonly used types
pub use batch::{BatchedFrameGraph, Batcher};
pub use features::{time_features, FeatureColumn, FeatureMatrix, FeatureNormalizer, TimeFeatures};
pub use graph::{gaussian_weight, symmetrize_edges, Edge, FrameGraph, FrameOrigin, GraphBuilder};
pub use interpolate::{round_half_up, TemporalInterpolator};
pub use sequence::{
    Discovery, FrameSource, SequenceAssembler, SkipReason, SkippedSource, TemporalGraphSequence,
};
pub use split::{DatasetSplits, Splitter};
