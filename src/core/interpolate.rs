//! Synthetic frames for missing seconds between observations.
//!
//! For a tick `t` between observed frames at `t1 < t2`, with
//! `α = (t - t1) / (t2 - t1)`:
//!
//! - node features are linearly interpolated, `(1 - α)·v1 + α·v2`;
//! - occupancy is interpolated the same way, then rounded half-up, so a
//!   0 → 1 transition flips at the midpoint;
//! - `time_sin`/`time_cos` are recomputed from `t` itself.
//!
//! The rounding rule is reproducibility-sensitive: datasets generated with
//! it must keep producing the same labels.

use crate::core::features::{layout_mismatch, FeatureNormalizer};
use crate::core::graph::{FrameGraph, FrameOrigin};
use crate::error::{PipelineError, Result};
use chrono::Duration;
use tracing::debug;

/// Round a non-negative interpolated label, ties going up.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Linear interpolation between two values.
fn lerp(a: f64, b: f64, alpha: f64) -> f64 {
    (1.0 - alpha) * a + alpha * b
}

/// Synthesizes per-second frames between observed frame graphs.
#[derive(Debug, Clone)]
pub struct TemporalInterpolator {
    normalizer: FeatureNormalizer,
}

impl TemporalInterpolator {
    pub fn new(normalizer: FeatureNormalizer) -> Self {
        Self { normalizer }
    }

    /// Fail unless both frames share node set, order and feature layout.
    pub fn check_compatible(left: &FrameGraph, right: &FrameGraph) -> Result<()> {
        if left.nodes.len() != right.nodes.len() {
            return Err(PipelineError::NodeSetMismatch {
                reason: format!(
                    "{} nodes at {} vs {} nodes at {}",
                    left.nodes.len(),
                    left.timestamp,
                    right.nodes.len(),
                    right.timestamp
                ),
            });
        }
        if let Some((a, b)) = left.nodes.iter().zip(&right.nodes).find(|(a, b)| a != b) {
            return Err(PipelineError::NodeSetMismatch {
                reason: format!("node {} at {} does not match node {} at {}", a.id, left.timestamp, b.id, right.timestamp),
            });
        }
        if left.node_features.columns() != right.node_features.columns() {
            return Err(layout_mismatch(
                left.node_features.columns(),
                right.node_features.columns(),
            ));
        }
        Ok(())
    }

    /// Frame at fraction `alpha` of the way from `left` to `right`.
    ///
    /// The edge list is taken from `left`; compatible frames share node
    /// positions and therefore topology.
    pub fn interpolate_at(
        &self,
        left: &FrameGraph,
        right: &FrameGraph,
        alpha: f64,
        origin: FrameOrigin,
        timestamp: chrono::NaiveDateTime,
    ) -> Result<FrameGraph> {
        Self::check_compatible(left, right)?;

        let mut node_features = left.node_features.clone();
        let temporal: Vec<bool> = node_features.columns().iter().map(|c| c.is_temporal()).collect();
        for row in 0..node_features.num_rows() {
            let (a, b) = (left.node_features.row(row), right.node_features.row(row));
            for (col, is_temporal) in temporal.iter().enumerate() {
                if !is_temporal {
                    node_features.set(row, col, lerp(a[col], b[col], alpha));
                }
            }
        }
        self.normalizer.apply_time(&mut node_features, &timestamp);

        let labels = left
            .labels
            .iter()
            .zip(&right.labels)
            .map(|(&a, &b)| round_half_up(lerp(a as f64, b as f64, alpha)) as u8)
            .collect();

        Ok(FrameGraph {
            timestamp,
            origin,
            nodes: left.nodes.clone(),
            node_features,
            edges: left.edges.clone(),
            edge_weights: left.edge_weights.clone(),
            labels,
        })
    }

    /// Frames for every whole-second tick strictly between two observations.
    ///
    /// `gap` is the index of `left` in the observed sequence and is recorded
    /// in each synthesized frame's origin.
    pub fn between(&self, left: &FrameGraph, right: &FrameGraph, gap: usize) -> Result<Vec<FrameGraph>> {
        Self::check_compatible(left, right)?;

        let delta = (right.timestamp - left.timestamp).num_seconds();
        if delta <= 1 {
            return Ok(Vec::new());
        }

        (1..delta)
            .map(|s| {
                let alpha = s as f64 / delta as f64;
                let timestamp = left.timestamp + Duration::seconds(s);
                let origin = FrameOrigin::Interpolated {
                    gap,
                    step: s as u32,
                };
                self.interpolate_at(left, right, alpha, origin, timestamp)
            })
            .collect()
    }

    /// Fill every gap of a timestamp-ordered run of observed frames.
    ///
    /// Observed frames are passed through with their time columns attached;
    /// the last frame needs no successor.
    pub fn fill(&self, observed: Vec<FrameGraph>) -> Result<Vec<FrameGraph>> {
        let mut out = Vec::with_capacity(observed.len());
        let mut iter = observed.into_iter().enumerate().peekable();

        while let Some((gap, mut frame)) = iter.next() {
            self.normalizer
                .apply_time(&mut frame.node_features, &frame.timestamp);

            let synthesized = match iter.peek() {
                Some((_, next)) => self.between(&frame, next, gap)?,
                None => Vec::new(),
            };
            if !synthesized.is_empty() {
                debug!(
                    from = %frame.timestamp,
                    count = synthesized.len(),
                    "interpolated missing seconds"
                );
            }

            out.push(frame);
            out.extend(synthesized);
        }

        Ok(out)
    }
}
