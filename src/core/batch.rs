//! Disjoint-union batching of consecutive frame graphs.
//!
//! A batch stacks the node rows of up to `B` frames and offsets each
//! frame's edge indices by the nodes contributed before it, so no edge
//! crosses a frame boundary.

use crate::core::graph::{FrameGraph, FrameOrigin};
use crate::error::{PipelineError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Several frames packed into one graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchedFrameGraph {
    /// Union graph; its timestamp is that of the first frame
    pub graph: FrameGraph,
    /// For each node row, the ordinal of its frame within the batch
    pub batch_index: Vec<usize>,
    /// Timestamp of each packed frame, in order
    pub frame_timestamps: Vec<NaiveDateTime>,
}

impl BatchedFrameGraph {
    pub fn num_frames(&self) -> usize {
        self.frame_timestamps.len()
    }

    /// Pack frames into one disjoint-union graph.
    ///
    /// All values are copied; the result shares no storage with `frames`.
    pub fn pack(frames: &[FrameGraph]) -> Result<Self> {
        let first = frames.first().ok_or_else(|| {
            PipelineError::InvalidConfig("cannot batch an empty run of frames".to_string())
        })?;

        let total_nodes: usize = frames.iter().map(|f| f.num_nodes()).sum();
        let total_edges: usize = frames.iter().map(|f| f.num_edges()).sum();

        let mut node_features = first.node_features.clone();
        let mut nodes = Vec::with_capacity(total_nodes);
        let mut labels = Vec::with_capacity(total_nodes);
        let mut edges = Vec::with_capacity(total_edges);
        let mut edge_weights = Vec::with_capacity(total_edges);
        let mut batch_index = Vec::with_capacity(total_nodes);
        let mut offset = 0;

        for (ordinal, frame) in frames.iter().enumerate() {
            if ordinal > 0 {
                node_features.extend_rows(&frame.node_features)?;
            }
            nodes.extend(frame.nodes.iter().cloned());
            labels.extend_from_slice(&frame.labels);
            edges.extend(frame.edges.iter().map(|e| {
                let mut shifted = *e;
                shifted.src += offset;
                shifted.dst += offset;
                shifted
            }));
            edge_weights.extend_from_slice(&frame.edge_weights);
            batch_index.extend(std::iter::repeat(ordinal).take(frame.num_nodes()));
            offset += frame.num_nodes();
        }

        Ok(Self {
            graph: FrameGraph {
                timestamp: first.timestamp,
                origin: FrameOrigin::Observed { source: None },
                nodes,
                node_features,
                edges,
                edge_weights,
                labels,
            },
            batch_index,
            frame_timestamps: frames.iter().map(|f| f.timestamp).collect(),
        })
    }
}

/// Groups a sequence into batches of `batch_size` frames.
#[derive(Debug, Clone, Copy)]
pub struct Batcher {
    batch_size: usize,
}

impl Batcher {
    pub fn new(batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(Self { batch_size })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// `ceil(len / B)` batches; the last one may be smaller than `B`.
    pub fn batch(&self, frames: &[FrameGraph]) -> Result<Vec<BatchedFrameGraph>> {
        frames
            .chunks(self.batch_size)
            .map(BatchedFrameGraph::pack)
            .collect()
    }

    /// Number of batches a run of `len` frames produces.
    pub fn batch_count(&self, len: usize) -> usize {
        len.div_ceil(self.batch_size)
    }
}
