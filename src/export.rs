//! CSV export of frame graphs.
//!
//! Each frame becomes `<stem>.csv` (input columns plus derived features) and
//! `<stem>_edges.csv` (`src, dst, weight`). Input files are never touched;
//! everything goes to a separate output directory.

use crate::core::features::{time_features, FeatureNormalizer};
use crate::core::graph::{FrameGraph, FrameOrigin};
use crate::core::sequence::{SkippedSource, EDGES_SUFFIX, INTERP_MARKER, MANIFEST_FILE};
use crate::core::split::DatasetSplits;
use crate::error::{PipelineError, Result};
use crate::ingest::format_token;
use crate::report::{RunLog, RunStats};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One row of an exported frame file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRow {
    pub node_id: u64,
    pub x_pixel: f64,
    pub y_pixel: f64,
    pub is_handicapped: u8,
    pub is_occupied: u8,
    pub store_distance: f64,
    pub store_distance_norm: f64,
    pub time_sin: f64,
    pub time_cos: f64,
}

/// One row of an exported edge list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRow {
    pub src: usize,
    pub dst: usize,
    pub weight: f64,
}

/// Exclusive handle on an output directory.
///
/// The directory is cleared and recreated on acquisition. Unless
/// [`OutputDir::commit`] is called, it is removed again on drop so a failed
/// export never leaves a partial directory behind.
#[derive(Debug)]
pub struct OutputDir {
    path: PathBuf,
    committed: bool,
}

impl OutputDir {
    pub fn acquire(path: &Path) -> Result<Self> {
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        std::fs::create_dir_all(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            committed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the directory.
    pub fn commit(mut self) -> PathBuf {
        self.committed = true;
        self.path.clone()
    }
}

impl Drop for OutputDir {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!(path = %self.path.display(), error = %e, "could not clean up output directory");
            }
        }
    }
}

/// Absolute, symlink-free form of `path`, which need not exist yet.
fn resolve(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.canonicalize()?);
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => Ok(resolve(parent)?.join(name)),
        _ => Ok(absolute),
    }
}

/// Refuse an output directory that equals, contains or sits inside `input`.
///
/// Clearing such a directory would delete source frames, and exports nested
/// in the input would be read back as frames on the next run.
pub fn check_output_location(input: &Path, output: &Path) -> Result<()> {
    let input = resolve(input)?;
    let output = resolve(output)?;
    if output.starts_with(&input) || input.starts_with(&output) {
        return Err(PipelineError::InvalidConfig(format!(
            "output directory {} overlaps input directory {}",
            output.display(),
            input.display()
        )));
    }
    Ok(())
}

/// File stem used for a frame's exported files.
///
/// Observed frames keep their source stem; synthesized frames are named
/// `<prefix><timestamp>_interp_<gap>_<step>`.
pub fn frame_stem(frame: &FrameGraph, prefix: &str) -> String {
    match &frame.origin {
        FrameOrigin::Observed { source: Some(path) } => path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{prefix}{}", format_token(&frame.timestamp))),
        FrameOrigin::Observed { source: None } => {
            format!("{prefix}{}", format_token(&frame.timestamp))
        }
        FrameOrigin::Interpolated { gap, step } => format!(
            "{prefix}{}{INTERP_MARKER}{gap}_{step}",
            format_token(&frame.timestamp)
        ),
    }
}

/// Columnar rows for a frame; distance columns are derived from positions.
pub fn frame_rows(frame: &FrameGraph, normalizer: &FeatureNormalizer) -> Vec<OutputRow> {
    let distances = normalizer.distance_columns(&frame.nodes);
    let time = time_features(&frame.timestamp);

    frame
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| OutputRow {
            node_id: node.id,
            x_pixel: node.position.x,
            y_pixel: node.position.y,
            is_handicapped: u8::from(node.attributes.is_handicapped),
            is_occupied: frame.labels[i],
            store_distance: distances.raw[i],
            store_distance_norm: distances.normalized[i],
            time_sin: time.sin,
            time_cos: time.cos,
        })
        .collect()
}

/// Write one frame and its edge list into `dir`.
pub fn write_frame(dir: &Path, stem: &str, frame: &FrameGraph, normalizer: &FeatureNormalizer) -> Result<()> {
    let mut nodes = csv::Writer::from_path(dir.join(format!("{stem}.csv")))?;
    for row in frame_rows(frame, normalizer) {
        nodes.serialize(row)?;
    }
    nodes.flush()?;

    // Header is written by hand so edgeless frames still get one.
    let mut edges = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(dir.join(format!("{stem}{EDGES_SUFFIX}.csv")))?;
    edges.write_record(["src", "dst", "weight"])?;
    for (edge, &weight) in frame.edges.iter().zip(&frame.edge_weights) {
        edges.serialize(EdgeRow {
            src: edge.src,
            dst: edge.dst,
            weight,
        })?;
    }
    edges.flush()?;

    Ok(())
}

/// Which exported stems belong to which partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub train: Vec<String>,
    pub validation: Vec<String>,
    pub test: Vec<String>,
    pub stats: RunStats,
    pub skipped: Vec<SkippedSource>,
}

/// Export every frame of every partition plus `manifest.json`.
///
/// `input` is the directory the frames were read from; an overlapping
/// `output` is rejected before anything is removed. Returns the number of
/// files written, which the manifest's stats already include.
pub fn export_splits(
    input: &Path,
    output: &Path,
    splits: &DatasetSplits,
    normalizer: &FeatureNormalizer,
    prefix: &str,
    log: &RunLog,
) -> Result<u64> {
    check_output_location(input, output)?;
    let dir = OutputDir::acquire(output)?;
    let mut files = 0u64;

    let mut write_all = |frames: &[FrameGraph]| -> Result<Vec<String>> {
        let mut stems = Vec::with_capacity(frames.len());
        for frame in frames {
            let stem = frame_stem(frame, prefix);
            write_frame(dir.path(), &stem, frame, normalizer)?;
            files += 2;
            stems.push(stem);
        }
        Ok(stems)
    };

    let train = write_all(splits.train.frames())?;
    let validation = write_all(splits.validation.frames())?;
    let test = write_all(splits.test.frames())?;

    files += 1;
    let mut stats = log.stats();
    stats.files_written += files;

    let manifest = Manifest {
        train,
        validation,
        test,
        stats,
        skipped: log.skipped(),
    };
    let json = serde_json::to_string_pretty(&manifest).map_err(std::io::Error::other)?;
    std::fs::write(dir.path().join(MANIFEST_FILE), json)?;

    let path = dir.commit();
    info!(path = %path.display(), files, "export complete");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeatureConfig, Point};
    use crate::core::features::{FeatureColumn, FeatureMatrix};
    use crate::core::graph::Edge;
    use crate::ingest::Node;
    use chrono::NaiveDateTime;

    fn frame(origin: FrameOrigin) -> FrameGraph {
        FrameGraph {
            timestamp: NaiveDateTime::parse_from_str("20240611143005", "%Y%m%d%H%M%S").unwrap(),
            origin,
            nodes: vec![Node::new(1, 0.0, 0.0, true), Node::new(2, 3.0, 4.0, false)],
            node_features: FeatureMatrix::zeros(vec![FeatureColumn::IsHandicapped], 2),
            edges: vec![Edge::new(0, 1), Edge::new(1, 0)],
            edge_weights: vec![0.5, 0.5],
            labels: vec![1, 0],
        }
    }

    fn normalizer() -> FeatureNormalizer {
        let mut config = FeatureConfig::default();
        config.reference_point = Point::new(0.0, 0.0);
        FeatureNormalizer::new(&config)
    }

    #[test]
    fn test_frame_stems() {
        let observed = frame(FrameOrigin::Observed {
            source: Some(PathBuf::from("in/DJI_20240611143005_0001.csv")),
        });
        assert_eq!(frame_stem(&observed, "DJI_"), "DJI_20240611143005_0001");

        let synthetic = frame(FrameOrigin::Interpolated { gap: 2, step: 7 });
        assert_eq!(frame_stem(&synthetic, "DJI_"), "DJI_20240611143005_interp_2_7");
    }

    #[test]
    fn test_frame_rows_derive_distances() {
        let rows = frame_rows(&frame(FrameOrigin::Observed { source: None }), &normalizer());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].is_handicapped, 1);
        assert_eq!(rows[0].is_occupied, 1);
        assert!((rows[1].store_distance - 5.0).abs() < 1e-12);
        assert!((rows[1].store_distance_norm - 1.0).abs() < 1e-6);
        assert_eq!(rows[0].time_sin, rows[1].time_sin);
    }

    #[test]
    fn test_write_frame_files() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "f", &frame(FrameOrigin::Observed { source: None }), &normalizer()).unwrap();

        let nodes = std::fs::read_to_string(dir.path().join("f.csv")).unwrap();
        assert!(nodes.starts_with(
            "node_id,x_pixel,y_pixel,is_handicapped,is_occupied,store_distance,store_distance_norm,time_sin,time_cos"
        ));
        assert_eq!(nodes.lines().count(), 3);

        let edges = std::fs::read_to_string(dir.path().join("f_edges.csv")).unwrap();
        let lines: Vec<&str> = edges.lines().collect();
        assert_eq!(lines[0], "src,dst,weight");
        assert_eq!(lines[1], "0,1,0.5");
    }

    #[test]
    fn test_output_dir_cleared_and_removed_unless_committed() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("stale.csv"), "old").unwrap();

        {
            let dir = OutputDir::acquire(&out).unwrap();
            assert!(!dir.path().join("stale.csv").exists());
            std::fs::write(dir.path().join("partial.csv"), "x").unwrap();
        }
        assert!(!out.exists());

        let dir = OutputDir::acquire(&out).unwrap();
        dir.commit();
        assert!(out.exists());
    }

    #[test]
    fn test_overlapping_output_rejected() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("input");
        std::fs::create_dir_all(&input).unwrap();

        for output in [input.clone(), input.join("out"), root.path().to_path_buf()] {
            assert!(matches!(
                check_output_location(&input, &output),
                Err(PipelineError::InvalidConfig(_))
            ));
        }
        assert!(check_output_location(&input, &root.path().join("dataset")).is_ok());
    }

    #[test]
    fn test_overlap_seen_through_relative_segments() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("input");
        std::fs::create_dir_all(&input).unwrap();

        let sneaky = root.path().join("input").join("..").join("input");
        assert!(check_output_location(&input, &sneaky).is_err());
    }
}
