//! Per-frame feature derivation.
//!
//! Each node gets a row of features built from its static attributes, its
//! min-max normalized distance to a reference point, and cyclical
//! time-of-day encodings of the frame timestamp.
//!
//! Column order is fixed: `is_handicapped, store_distance_norm, time_sin,
//! time_cos`. Disabled columns are dropped without reordering the rest.

use crate::config::{FeatureColumns, FeatureConfig, Point};
use crate::error::{PipelineError, Result};
use crate::ingest::Node;
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::f64::consts::PI;

/// A named column of the node feature matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureColumn {
    IsHandicapped,
    StoreDistanceNorm,
    TimeSin,
    TimeCos,
}

impl FeatureColumn {
    /// Canonical layout, in order.
    pub const ALL: [FeatureColumn; 4] = [
        FeatureColumn::IsHandicapped,
        FeatureColumn::StoreDistanceNorm,
        FeatureColumn::TimeSin,
        FeatureColumn::TimeCos,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FeatureColumn::IsHandicapped => "is_handicapped",
            FeatureColumn::StoreDistanceNorm => "store_distance_norm",
            FeatureColumn::TimeSin => "time_sin",
            FeatureColumn::TimeCos => "time_cos",
        }
    }

    /// Columns derived from absolute time rather than node state.
    pub fn is_temporal(&self) -> bool {
        matches!(self, FeatureColumn::TimeSin | FeatureColumn::TimeCos)
    }
}

impl FeatureColumns {
    /// Enabled columns in canonical order.
    pub fn layout(&self) -> Vec<FeatureColumn> {
        FeatureColumn::ALL
            .into_iter()
            .filter(|col| match col {
                FeatureColumn::IsHandicapped => self.is_handicapped,
                FeatureColumn::StoreDistanceNorm => self.store_distance_norm,
                FeatureColumn::TimeSin | FeatureColumn::TimeCos => self.time,
            })
            .collect()
    }
}

/// Row-major `[num_nodes × F]` feature matrix with named columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    columns: Vec<FeatureColumn>,
    rows: usize,
    values: Vec<f64>,
}

impl FeatureMatrix {
    /// An all-zero matrix.
    pub fn zeros(columns: Vec<FeatureColumn>, rows: usize) -> Self {
        let values = vec![0.0; rows * columns.len()];
        Self {
            columns,
            rows,
            values,
        }
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Index of a column in this layout.
    pub fn column_index(&self, column: FeatureColumn) -> Option<usize> {
        self.columns.iter().position(|c| *c == column)
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let width = self.columns.len();
        &self.values[i * width..(i + 1) * width]
    }

    pub fn get(&self, row: usize, column: FeatureColumn) -> Option<f64> {
        let c = self.column_index(column)?;
        self.values.get(row * self.columns.len() + c).copied()
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        let width = self.columns.len();
        self.values[row * width + col] = value;
    }

    /// Raw row-major values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Append the rows of `other`, which must share this layout.
    pub fn extend_rows(&mut self, other: &FeatureMatrix) -> Result<()> {
        if self.columns != other.columns {
            return Err(layout_mismatch(&self.columns, &other.columns));
        }
        self.values.extend_from_slice(&other.values);
        self.rows += other.rows;
        Ok(())
    }
}

pub(crate) fn layout_mismatch(expected: &[FeatureColumn], actual: &[FeatureColumn]) -> PipelineError {
    PipelineError::FeatureLayoutMismatch {
        expected: expected.iter().map(|c| c.name().to_string()).collect(),
        actual: actual.iter().map(|c| c.name().to_string()).collect(),
    }
}

/// Cyclical encoding of the time of day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeFeatures {
    pub sin: f64,
    pub cos: f64,
}

/// Compute `sin`/`cos` of the fraction of the day elapsed at `timestamp`.
pub fn time_features(timestamp: &NaiveDateTime) -> TimeFeatures {
    let hours = timestamp.hour() as f64
        + timestamp.minute() as f64 / 60.0
        + timestamp.second() as f64 / 3600.0;
    let fraction = hours / 24.0;
    TimeFeatures {
        sin: (2.0 * PI * fraction).sin(),
        cos: (2.0 * PI * fraction).cos(),
    }
}

/// Raw and normalized distance of each node to the reference point.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceColumns {
    pub raw: Vec<f64>,
    pub normalized: Vec<f64>,
}

/// Derives and normalizes node features for one frame.
#[derive(Debug, Clone)]
pub struct FeatureNormalizer {
    reference_point: Point,
    epsilon: f64,
    layout: Vec<FeatureColumn>,
}

impl FeatureNormalizer {
    pub fn new(config: &FeatureConfig) -> Self {
        Self {
            reference_point: config.reference_point,
            epsilon: config.epsilon,
            layout: config.columns.layout(),
        }
    }

    /// Feature columns this normalizer emits.
    pub fn layout(&self) -> &[FeatureColumn] {
        &self.layout
    }

    /// `store_distance` per node and its min-max normalization.
    ///
    /// `normalized = (v - min) / (max - min + ε)`, so equidistant nodes all
    /// map to 0 instead of dividing by zero.
    pub fn distance_columns(&self, nodes: &[Node]) -> DistanceColumns {
        let raw: Vec<f64> = nodes
            .iter()
            .map(|n| n.position.distance(&self.reference_point))
            .collect();

        if raw.is_empty() {
            return DistanceColumns {
                raw,
                normalized: Vec::new(),
            };
        }

        let min: f64 = Statistics::min(raw.iter());
        let max: f64 = Statistics::max(raw.iter());
        let span = max - min + self.epsilon;
        let normalized = raw.iter().map(|v| (v - min) / span).collect();

        DistanceColumns { raw, normalized }
    }

    /// Build the node feature matrix for a frame at `timestamp`.
    pub fn normalize(&self, nodes: &[Node], timestamp: &NaiveDateTime) -> FeatureMatrix {
        let distances = self.distance_columns(nodes);
        let time = time_features(timestamp);
        let mut matrix = FeatureMatrix::zeros(self.layout.clone(), nodes.len());

        for (i, node) in nodes.iter().enumerate() {
            for (c, column) in self.layout.iter().enumerate() {
                let value = match column {
                    FeatureColumn::IsHandicapped => f64::from(u8::from(node.attributes.is_handicapped)),
                    FeatureColumn::StoreDistanceNorm => distances.normalized[i],
                    FeatureColumn::TimeSin => time.sin,
                    FeatureColumn::TimeCos => time.cos,
                };
                matrix.set(i, c, value);
            }
        }

        matrix
    }

    /// Overwrite the temporal columns of `matrix` with values for `timestamp`.
    pub fn apply_time(&self, matrix: &mut FeatureMatrix, timestamp: &NaiveDateTime) {
        let time = time_features(timestamp);
        let sin_col = matrix.column_index(FeatureColumn::TimeSin);
        let cos_col = matrix.column_index(FeatureColumn::TimeCos);

        for row in 0..matrix.num_rows() {
            if let Some(c) = sin_col {
                matrix.set(row, c, time.sin);
            }
            if let Some(c) = cos_col {
                matrix.set(row, c, time.cos);
            }
        }
    }
}
