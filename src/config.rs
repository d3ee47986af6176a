//! Configuration for the graph preparation pipeline.
//!
//! Every stage receives its settings explicitly from a [`PipelineConfig`];
//! nothing is read from process-wide state.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main configuration for a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Proximity graph construction
    pub graph: GraphConfig,

    /// Per-frame feature derivation
    pub features: FeatureConfig,

    /// Whether to synthesize frames for missing seconds
    pub interpolate: bool,

    /// Sequential train/validation/test ratios
    pub split: SplitRatios,

    /// Frames per disjoint-union batch
    pub batch_size: usize,

    /// Input discovery and parsing
    pub ingest: IngestConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            graph: GraphConfig::default(),
            features: FeatureConfig::default(),
            interpolate: true,
            split: SplitRatios::default(),
            batch_size: 32,
            ingest: IngestConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from the default location, or defaults if absent.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit JSON file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lotgraph")
            .join("config.json")
    }

    /// Reject configurations that would fail mid-run.
    ///
    /// Called before any frame is read so that a bad threshold or ratio
    /// never leaves half-written output behind.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let d = self.graph.distance_threshold;
        if !d.is_finite() || d <= 0.0 {
            return Err(PipelineError::InvalidThreshold(d));
        }

        for (name, ratio) in [
            ("train_ratio", self.split.train_ratio),
            ("validation_ratio", self.split.validation_ratio),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {ratio}"
                )));
            }
        }

        if self.batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }

        if self.features.epsilon.is_nan() || self.features.epsilon <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "epsilon must be > 0, got {}",
                self.features.epsilon
            )));
        }

        let p = self.features.reference_point;
        if !p.x.is_finite() || !p.y.is_finite() {
            return Err(PipelineError::InvalidConfig(format!(
                "reference_point must be finite, got ({}, {})",
                p.x, p.y
            )));
        }

        if self.ingest.workers == 0 {
            return Err(PipelineError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// How edge weights are assigned to qualifying node pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeWeighting {
    /// Weight 1 for every pair within the threshold
    Uniform,
    /// `exp(-dist² / 2σ²)` with `σ = d / 2`
    Gaussian,
}

impl std::str::FromStr for EdgeWeighting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "uniform" => Ok(EdgeWeighting::Uniform),
            "gaussian" => Ok(EdgeWeighting::Gaussian),
            other => Err(format!("unknown weighting mode '{other}' (uniform|gaussian)")),
        }
    }
}

/// Strategy used to find node pairs within the distance threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborSearch {
    /// Compare every ordered pair
    BruteForce,
    /// Bucket nodes into a uniform grid with cell size `d`
    Grid,
}

/// Settings for proximity graph construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Maximum Euclidean distance (pixels) for an edge
    pub distance_threshold: f64,
    pub weighting: EdgeWeighting,
    /// Union the edge list with its reverse
    pub symmetrize: bool,
    pub neighbor_search: NeighborSearch,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 75.0,
            weighting: EdgeWeighting::Gaussian,
            symmetrize: false,
            neighbor_search: NeighborSearch::BruteForce,
        }
    }
}

/// A point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Settings for per-frame feature derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Point that `store_distance` is measured from
    pub reference_point: Point,
    /// Added to the min-max denominator
    pub epsilon: f64,
    pub columns: FeatureColumns,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            reference_point: Point::new(967.0, 936.0),
            epsilon: 1e-8,
            columns: FeatureColumns::default(),
        }
    }
}

/// Which feature columns end up in the node feature matrix.
///
/// The layout order is fixed regardless of which columns are enabled:
/// `is_handicapped, store_distance_norm, time_sin, time_cos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureColumns {
    pub is_handicapped: bool,
    pub store_distance_norm: bool,
    /// Both `time_sin` and `time_cos`
    pub time: bool,
}

impl Default for FeatureColumns {
    fn default() -> Self {
        Self {
            is_handicapped: true,
            store_distance_norm: true,
            time: true,
        }
    }
}

/// Ratios for the two-stage sequential split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitRatios {
    /// Share of the sequence kept for training
    pub train_ratio: f64,
    /// Share of the held-out tail kept for validation; the rest is test
    pub validation_ratio: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train_ratio: 0.8,
            validation_ratio: 0.5,
        }
    }
}

/// Settings for locating and parsing input files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// File name of the node registry inside the input directory
    pub registry_file: String,
    /// Prefix preceding the timestamp token in frame file names
    pub filename_prefix: String,
    /// Worker threads used to parse frames
    pub workers: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            registry_file: "nodes.csv".to_string(),
            filename_prefix: "DJI_".to_string(),
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
}
