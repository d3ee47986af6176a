//! Proximity graph construction.
//!
//! Nodes closer than the distance threshold `d` are connected. Edges are
//! emitted once per ordered pair `(i, j)`, `i != j`, in source-major order,
//! so two runs over the same positions produce the same edge list.

use crate::config::{EdgeWeighting, GraphConfig, NeighborSearch};
use crate::core::features::{FeatureMatrix, FeatureNormalizer};
use crate::error::{PipelineError, Result};
use crate::ingest::{FrameObservation, Node, NodeTable};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// A directed edge between two node indices of the same frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub src: usize,
    pub dst: usize,
}

impl Edge {
    pub fn new(src: usize, dst: usize) -> Self {
        Self { src, dst }
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.dst, self.src)
    }
}

/// Where a frame graph came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FrameOrigin {
    /// Read from a frame file
    Observed { source: Option<PathBuf> },
    /// Synthesized between two observed frames
    Interpolated {
        /// Index of the left observed frame's gap
        gap: usize,
        /// Seconds after the left observed frame
        step: u32,
    },
}

/// One timestamped frame as a weighted proximity graph.
///
/// `node_features.num_rows() == nodes.len() == labels.len()`, and every
/// edge references valid node indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameGraph {
    pub timestamp: NaiveDateTime,
    pub origin: FrameOrigin,
    /// Nodes in canonical (id) order
    pub nodes: Vec<Node>,
    pub node_features: FeatureMatrix,
    pub edges: Vec<Edge>,
    /// One weight per edge
    pub edge_weights: Vec<f64>,
    /// Occupancy per node (0 or 1)
    pub labels: Vec<u8>,
}

impl FrameGraph {
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn is_interpolated(&self) -> bool {
        matches!(self.origin, FrameOrigin::Interpolated { .. })
    }

    /// Check the shape invariants of the graph.
    pub fn validate(&self) -> Result<()> {
        let n = self.nodes.len();
        if self.node_features.num_rows() != n || self.labels.len() != n {
            return Err(PipelineError::NodeSetMismatch {
                reason: format!(
                    "{} nodes but {} feature rows and {} labels",
                    n,
                    self.node_features.num_rows(),
                    self.labels.len()
                ),
            });
        }
        if self.edges.len() != self.edge_weights.len() {
            return Err(PipelineError::NodeSetMismatch {
                reason: format!(
                    "{} edges but {} weights",
                    self.edges.len(),
                    self.edge_weights.len()
                ),
            });
        }
        if let Some(edge) = self.edges.iter().find(|e| e.src >= n || e.dst >= n || e.src == e.dst) {
            return Err(PipelineError::NodeSetMismatch {
                reason: format!("edge {}->{} invalid for {} nodes", edge.src, edge.dst, n),
            });
        }
        Ok(())
    }
}

/// Builds weighted proximity graphs from node positions.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    threshold: f64,
    weighting: EdgeWeighting,
    symmetrize: bool,
    search: NeighborSearch,
}

impl GraphBuilder {
    /// Create a builder; fails if the distance threshold is not positive.
    pub fn new(config: &GraphConfig) -> Result<Self> {
        let d = config.distance_threshold;
        if !d.is_finite() || d <= 0.0 {
            return Err(PipelineError::InvalidThreshold(d));
        }
        Ok(Self {
            threshold: d,
            weighting: config.weighting,
            symmetrize: config.symmetrize,
            search: config.neighbor_search,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Weight of an edge of length `distance`.
    pub fn weight(&self, distance: f64) -> f64 {
        match self.weighting {
            EdgeWeighting::Uniform => 1.0,
            EdgeWeighting::Gaussian => gaussian_weight(distance, self.threshold / 2.0),
        }
    }

    /// Edges and weights for a set of node positions.
    pub fn build_edges(&self, nodes: &[Node]) -> (Vec<Edge>, Vec<f64>) {
        let mut edges = match self.search {
            NeighborSearch::BruteForce => brute_force_pairs(nodes, self.threshold),
            NeighborSearch::Grid => grid_pairs(nodes, self.threshold),
        };
        if self.symmetrize {
            edges = symmetrize_edges(&edges);
        }

        let weights = edges
            .iter()
            .map(|e| self.weight(nodes[e.src].position.distance(&nodes[e.dst].position)))
            .collect();

        (edges, weights)
    }

    /// Build the graph of one observed frame.
    pub fn build(
        &self,
        table: &NodeTable,
        observation: &FrameObservation,
        normalizer: &FeatureNormalizer,
    ) -> Result<FrameGraph> {
        let nodes = table.nodes().to_vec();
        let labels = observation.labels_for(table)?;
        let node_features = normalizer.normalize(&nodes, &observation.timestamp);
        let (edges, edge_weights) = self.build_edges(&nodes);

        Ok(FrameGraph {
            timestamp: observation.timestamp,
            origin: FrameOrigin::Observed {
                source: observation.source.clone(),
            },
            nodes,
            node_features,
            edges,
            edge_weights,
            labels,
        })
    }
}

/// `exp(-distance² / 2σ²)`: 1 at distance 0, strictly decreasing.
pub fn gaussian_weight(distance: f64, sigma: f64) -> f64 {
    (-(distance * distance) / (2.0 * sigma * sigma)).exp()
}

/// Union an edge list with its reverse, keeping first-seen order.
pub fn symmetrize_edges(edges: &[Edge]) -> Vec<Edge> {
    let mut seen: HashSet<Edge> = edges.iter().copied().collect();
    let mut out = edges.to_vec();
    for edge in edges {
        let rev = edge.reversed();
        if seen.insert(rev) {
            out.push(rev);
        }
    }
    out
}

fn brute_force_pairs(nodes: &[Node], threshold: f64) -> Vec<Edge> {
    let mut edges = Vec::new();
    for (i, a) in nodes.iter().enumerate() {
        for (j, b) in nodes.iter().enumerate() {
            if i != j && a.position.distance(&b.position) <= threshold {
                edges.push(Edge::new(i, j));
            }
        }
    }
    edges
}

/// Same pairs as [`brute_force_pairs`], found through grid buckets of size `d`.
fn grid_pairs(nodes: &[Node], threshold: f64) -> Vec<Edge> {
    let cell_of = |node: &Node| {
        (
            (node.position.x / threshold).floor() as i64,
            (node.position.y / threshold).floor() as i64,
        )
    };

    let mut cells: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, node) in nodes.iter().enumerate() {
        cells.entry(cell_of(node)).or_default().push(i);
    }

    let mut edges = Vec::new();
    let mut neighbors = Vec::new();
    for (i, a) in nodes.iter().enumerate() {
        let (cx, cy) = cell_of(a);
        neighbors.clear();
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(bucket) = cells.get(&(cx + dx, cy + dy)) {
                    neighbors.extend(bucket.iter().copied().filter(|&j| {
                        j != i && a.position.distance(&nodes[j].position) <= threshold
                    }));
                }
            }
        }
        neighbors.sort_unstable();
        edges.extend(neighbors.iter().map(|&j| Edge::new(i, j)));
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeatureConfig;
    use crate::ingest::NodeRecord;
    use std::collections::BTreeMap;

    fn config(d: f64, weighting: EdgeWeighting) -> GraphConfig {
        GraphConfig {
            distance_threshold: d,
            weighting,
            ..GraphConfig::default()
        }
    }

    fn line_nodes() -> Vec<Node> {
        vec![
            Node::new(1, 0.0, 0.0, false),
            Node::new(2, 10.0, 0.0, false),
            Node::new(3, 25.0, 0.0, true),
            Node::new(4, 100.0, 0.0, false),
        ]
    }

    #[test]
    fn test_invalid_threshold() {
        assert!(matches!(
            GraphBuilder::new(&config(0.0, EdgeWeighting::Uniform)),
            Err(PipelineError::InvalidThreshold(_))
        ));
        assert!(GraphBuilder::new(&config(-1.0, EdgeWeighting::Gaussian)).is_err());
    }

    #[test]
    fn test_edges_respect_threshold_and_skip_self_loops() {
        let nodes = line_nodes();
        let builder = GraphBuilder::new(&config(15.0, EdgeWeighting::Uniform)).unwrap();
        let (edges, weights) = builder.build_edges(&nodes);

        assert_eq!(
            edges,
            vec![
                Edge::new(0, 1),
                Edge::new(1, 0),
                Edge::new(1, 2),
                Edge::new(2, 1),
            ]
        );
        assert!(weights.iter().all(|w| *w == 1.0));
        for e in &edges {
            assert_ne!(e.src, e.dst);
            assert!(nodes[e.src].position.distance(&nodes[e.dst].position) <= 15.0);
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let nodes = vec![Node::new(1, 0.0, 0.0, false), Node::new(2, 3.0, 4.0, false)];
        let builder = GraphBuilder::new(&config(5.0, EdgeWeighting::Uniform)).unwrap();
        assert_eq!(builder.build_edges(&nodes).0.len(), 2);
    }

    #[test]
    fn test_degenerate_frames_have_no_edges() {
        let builder = GraphBuilder::new(&config(50.0, EdgeWeighting::Gaussian)).unwrap();
        assert!(builder.build_edges(&[]).0.is_empty());
        assert!(builder
            .build_edges(&[Node::new(1, 0.0, 0.0, false)])
            .0
            .is_empty());
    }

    #[test]
    fn test_gaussian_weight_decays_with_distance() {
        let builder = GraphBuilder::new(&config(20.0, EdgeWeighting::Gaussian)).unwrap();
        assert!((builder.weight(0.0) - 1.0).abs() < 1e-12);

        let mut last = builder.weight(0.0);
        for step in 1..=20 {
            let w = builder.weight(step as f64);
            assert!(w < last);
            assert!(w > 0.0);
            last = w;
        }
        // σ = d/2, so at the threshold the weight is exp(-2).
        assert!((builder.weight(20.0) - (-2.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_symmetrize_is_explicit_union() {
        let one_way = vec![Edge::new(0, 1), Edge::new(2, 0)];
        let both = symmetrize_edges(&one_way);
        assert_eq!(
            both,
            vec![Edge::new(0, 1), Edge::new(2, 0), Edge::new(1, 0), Edge::new(0, 2)]
        );
        // Already symmetric input is left as-is.
        assert_eq!(symmetrize_edges(&both), both);
    }

    #[test]
    fn test_symmetrized_builder_keeps_weights_aligned() {
        let nodes = line_nodes();
        let plain = GraphBuilder::new(&config(15.0, EdgeWeighting::Gaussian)).unwrap();
        let symmetric = GraphBuilder::new(&GraphConfig {
            symmetrize: true,
            ..config(15.0, EdgeWeighting::Gaussian)
        })
        .unwrap();

        let (edges, weights) = symmetric.build_edges(&nodes);
        assert_eq!(edges.len(), weights.len());
        // Distance is symmetric, so the union adds nothing to the ordered pairs.
        assert_eq!((edges.clone(), weights.clone()), plain.build_edges(&nodes));

        let unique: HashSet<Edge> = edges.iter().copied().collect();
        assert_eq!(unique.len(), edges.len());
        for (edge, weight) in edges.iter().zip(&weights) {
            assert!(unique.contains(&edge.reversed()));
            let dist = nodes[edge.src].position.distance(&nodes[edge.dst].position);
            assert!((weight - gaussian_weight(dist, symmetric.threshold() / 2.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_grid_search_matches_brute_force() {
        let mut nodes = Vec::new();
        for i in 0..60u64 {
            let x = ((i * 37) % 211) as f64 * 1.7;
            let y = ((i * 53) % 173) as f64 * 2.3 - 40.0;
            nodes.push(Node::new(i, x, y, i % 7 == 0));
        }

        for d in [5.0, 30.0, 75.0, 500.0] {
            let brute = GraphBuilder::new(&config(d, EdgeWeighting::Gaussian)).unwrap();
            let grid = GraphBuilder::new(&GraphConfig {
                neighbor_search: NeighborSearch::Grid,
                ..config(d, EdgeWeighting::Gaussian)
            })
            .unwrap();
            assert_eq!(brute.build_edges(&nodes), grid.build_edges(&nodes));
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let records = vec![
            NodeRecord {
                node_id: 9,
                x_pixel: 0.0,
                y_pixel: 0.0,
                is_handicapped: false,
                is_occupied: true,
            },
            NodeRecord {
                node_id: 4,
                x_pixel: 30.0,
                y_pixel: 40.0,
                is_handicapped: true,
                is_occupied: false,
            },
        ];
        let table = NodeTable::from_records("nodes.csv", records).unwrap();
        let ts = NaiveDateTime::parse_from_str("20240611143005", "%Y%m%d%H%M%S").unwrap();
        let obs = FrameObservation::new(ts, BTreeMap::from([(4, false), (9, true)]));
        let normalizer = FeatureNormalizer::new(&FeatureConfig::default());
        let builder = GraphBuilder::new(&config(75.0, EdgeWeighting::Gaussian)).unwrap();

        let first = builder.build(&table, &obs, &normalizer).unwrap();
        let second = builder.build(&table, &obs, &normalizer).unwrap();

        assert_eq!(first.edges, second.edges);
        assert_eq!(first.edge_weights, second.edge_weights);
        assert_eq!(first.labels, vec![0, 1]);
        assert_eq!(first.nodes[0].id, 4);
        assert!(first.validate().is_ok());
        assert_eq!(first.num_edges(), 2);
    }
}
