//! Node registry and per-frame observation types.
//!
//! Nodes are fixed sensing locations; they never change within a deployment.
//! Frames only carry occupancy.

use crate::config::Point;
use crate::error::{PipelineError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// Columns every registry and frame file must provide.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "node_id",
    "x_pixel",
    "y_pixel",
    "is_handicapped",
    "is_occupied",
];

/// Static, per-deployment attributes of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticAttributes {
    pub is_handicapped: bool,
}

/// A fixed sensing location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique, stable across all frames
    pub id: u64,
    /// Pixel coordinates in the aerial image
    pub position: Point,
    pub attributes: StaticAttributes,
}

impl Node {
    pub fn new(id: u64, x: f64, y: f64, is_handicapped: bool) -> Self {
        Self {
            id,
            position: Point::new(x, y),
            attributes: StaticAttributes { is_handicapped },
        }
    }
}

/// One row of a registry or frame CSV.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeRecord {
    pub node_id: u64,
    pub x_pixel: f64,
    pub y_pixel: f64,
    #[serde(deserialize_with = "deserialize_flag")]
    pub is_handicapped: bool,
    #[serde(deserialize_with = "deserialize_flag")]
    pub is_occupied: bool,
}

/// Accept `0/1`, `0.0/1.0` and `true/false` in any case.
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_flag(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid flag value '{raw}'")))
}

pub(crate) fn parse_flag(raw: &str) -> Option<bool> {
    let value = raw.trim();
    if value.eq_ignore_ascii_case("true") {
        return Some(true);
    }
    if value.eq_ignore_ascii_case("false") {
        return Some(false);
    }
    match value.parse::<f64>() {
        Ok(v) if v == 0.0 => Some(false),
        Ok(v) if v == 1.0 => Some(true),
        _ => None,
    }
}

/// Registry of the nodes of one deployment, in canonical (id) order.
#[derive(Debug, Clone)]
pub struct NodeTable {
    nodes: Vec<Node>,
    ids: HashSet<u64>,
}

impl NodeTable {
    /// Build a table from registry rows, sorting by node id.
    ///
    /// `origin` names the source in error messages.
    pub fn from_records(origin: &str, mut records: Vec<NodeRecord>) -> Result<Self> {
        records.sort_by_key(|r| r.node_id);

        if let Some(pair) = records.windows(2).find(|w| w[0].node_id == w[1].node_id) {
            return Err(PipelineError::malformed(
                origin,
                format!("duplicate node_id {} in registry", pair[0].node_id),
            ));
        }

        let nodes: Vec<Node> = records
            .iter()
            .map(|r| Node::new(r.node_id, r.x_pixel, r.y_pixel, r.is_handicapped))
            .collect();
        let ids = nodes.iter().map(|n| n.id).collect();

        Ok(Self { nodes, ids })
    }

    /// Nodes in canonical order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }
}

/// One observed time step: occupancy per node id.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameObservation {
    pub timestamp: NaiveDateTime,
    /// File the observation was read from, if any
    pub source: Option<PathBuf>,
    /// Keyed by node id, so iteration follows canonical order
    pub occupancy: BTreeMap<u64, bool>,
}

impl FrameObservation {
    pub fn new(timestamp: NaiveDateTime, occupancy: BTreeMap<u64, bool>) -> Self {
        Self {
            timestamp,
            source: None,
            occupancy,
        }
    }

    pub fn with_source(mut self, source: PathBuf) -> Self {
        self.source = Some(source);
        self
    }

    /// Occupancy of every table node, in canonical order.
    ///
    /// Fails if the observation lacks any node of the table.
    pub fn labels_for(&self, table: &NodeTable) -> Result<Vec<u8>> {
        table
            .nodes()
            .iter()
            .map(|node| {
                self.occupancy
                    .get(&node.id)
                    .map(|&occupied| u8::from(occupied))
                    .ok_or_else(|| {
                        PipelineError::malformed(
                            self.label(),
                            format!("no occupancy for node {}", node.id),
                        )
                    })
            })
            .collect()
    }

    /// Short name for logs and errors.
    pub fn label(&self) -> String {
        match &self.source {
            Some(path) => path.display().to_string(),
            None => self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}
