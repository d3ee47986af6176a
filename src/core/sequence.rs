//! Frame source discovery and timestamp ordering.
//!
//! Sources are found on disk, timestamped from their names and sorted. Any
//! source that cannot be used is returned as a [`SkippedSource`] so callers
//! can report the gap instead of silently losing a frame.

use crate::core::graph::FrameGraph;
use crate::error::{PipelineError, Result};
use crate::ingest::TimestampExtractor;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Suffix of edge-list files written next to exported frames.
pub const EDGES_SUFFIX: &str = "_edges";

/// Marker in the stem of exported synthesized frames.
pub const INTERP_MARKER: &str = "_interp_";

/// File that marks a directory as exported output.
pub const MANIFEST_FILE: &str = "manifest.json";

/// A frame file together with its capture time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSource {
    pub path: PathBuf,
    pub timestamp: NaiveDateTime,
}

/// Why a source was left out of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    TimestampParse,
    MalformedRecord,
    DuplicateTimestamp,
    Unreadable,
}

/// A source that did not make it into the sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSource {
    pub source: String,
    pub reason: SkipReason,
    pub detail: String,
}

impl SkippedSource {
    /// Classify a frame-local error; returns `None` for fatal errors.
    pub fn from_error(source: &Path, error: &PipelineError) -> Option<Self> {
        if !error.is_frame_local() {
            return None;
        }
        let reason = match error {
            PipelineError::TimestampParse { .. } => SkipReason::TimestampParse,
            PipelineError::UnreadableSource { .. } => SkipReason::Unreadable,
            _ => SkipReason::MalformedRecord,
        };
        Some(Self {
            source: source.display().to_string(),
            reason,
            detail: error.to_string(),
        })
    }
}

/// Result of scanning an input tree.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Usable sources, ascending by timestamp
    pub sources: Vec<FrameSource>,
    pub skipped: Vec<SkippedSource>,
}

/// Orders frame sources and graphs by timestamp.
#[derive(Debug, Clone)]
pub struct SequenceAssembler {
    extractor: TimestampExtractor,
    registry_file: String,
}

impl SequenceAssembler {
    pub fn new(extractor: TimestampExtractor, registry_file: impl Into<String>) -> Self {
        Self {
            extractor,
            registry_file: registry_file.into(),
        }
    }

    /// Whether a path looks like an input frame file.
    ///
    /// Exported edge lists and synthesized frames are not inputs.
    fn is_frame_file(&self, path: &Path) -> bool {
        let is_csv = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let stem = path.file_stem().and_then(|n| n.to_str()).unwrap_or_default();
        is_csv
            && name != self.registry_file
            && !stem.ends_with(EDGES_SUFFIX)
            && !stem.contains(INTERP_MARKER)
    }

    /// Timestamp a set of candidate paths and sort them.
    ///
    /// Paths whose timestamp cannot be extracted are skipped and reported.
    pub fn order(&self, paths: Vec<PathBuf>) -> Discovery {
        let mut discovery = Discovery::default();

        for path in paths {
            match self.extractor.extract(&path) {
                Ok(timestamp) => discovery.sources.push(FrameSource { path, timestamp }),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping frame source");
                    if let Some(skipped) = SkippedSource::from_error(&path, &e) {
                        discovery.skipped.push(skipped);
                    }
                }
            }
        }

        discovery
            .sources
            .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.path.cmp(&b.path)));
        discovery
    }

    /// Find and order all frame files under `root`.
    ///
    /// Symlinks are followed. Directories holding a previous export are not
    /// descended into. Entries below the root that cannot be read (dangling
    /// links, unreadable folders, link loops) are reported as skipped.
    pub fn discover(&self, root: &Path) -> Result<Discovery> {
        let mut paths = Vec::new();
        let mut unreadable = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_export_dir(e.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() > 0 => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                    // Only entries that could hold frames count as missing sources.
                    if !self.is_frame_file(&path) && path.extension().is_some() {
                        debug!(path = %path.display(), error = %e, "ignoring unreadable entry");
                        continue;
                    }
                    warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                    unreadable.push(SkippedSource {
                        source: path.display().to_string(),
                        reason: SkipReason::Unreadable,
                        detail: e.to_string(),
                    });
                    continue;
                }
                Err(e) => {
                    return Err(PipelineError::Io(std::io::Error::other(format!(
                        "walking {}: {e}",
                        root.display()
                    ))));
                }
            };
            if entry.file_type().is_file() && self.is_frame_file(entry.path()) {
                paths.push(entry.into_path());
            }
        }

        let mut discovery = self.order(paths);
        discovery.skipped.extend(unreadable);
        info!(
            root = %root.display(),
            sources = discovery.sources.len(),
            skipped = discovery.skipped.len(),
            "discovered frame sources"
        );
        Ok(discovery)
    }

    /// Sort graphs by timestamp and drop duplicate timestamps.
    ///
    /// Graphs may arrive in any order (e.g. from worker threads). For equal
    /// timestamps the graph whose source path sorts first is kept.
    pub fn assemble(&self, mut graphs: Vec<FrameGraph>) -> (TemporalGraphSequence, Vec<SkippedSource>) {
        graphs.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| source_of(a).cmp(&source_of(b)))
        });

        let mut frames: Vec<FrameGraph> = Vec::with_capacity(graphs.len());
        let mut duplicates = Vec::new();
        for graph in graphs {
            match frames.last() {
                Some(last) if last.timestamp == graph.timestamp => {
                    let source = source_of(&graph);
                    warn!(source = %source, timestamp = %graph.timestamp, "duplicate frame timestamp");
                    duplicates.push(SkippedSource {
                        detail: format!("timestamp {} already taken by {}", graph.timestamp, source_of(last)),
                        source,
                        reason: SkipReason::DuplicateTimestamp,
                    });
                }
                _ => frames.push(graph),
            }
        }

        (TemporalGraphSequence { frames }, duplicates)
    }
}

/// A directory written by a previous export.
fn is_export_dir(path: &Path) -> bool {
    path.is_dir() && path.join(MANIFEST_FILE).is_file()
}

fn source_of(graph: &FrameGraph) -> String {
    match &graph.origin {
        crate::core::graph::FrameOrigin::Observed { source: Some(path) } => path.display().to_string(),
        _ => String::new(),
    }
}

/// Frame graphs with strictly increasing timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalGraphSequence {
    frames: Vec<FrameGraph>,
}

impl TemporalGraphSequence {
    /// Wrap frames that are already in order.
    ///
    /// Fails if timestamps are not strictly increasing.
    pub fn new(frames: Vec<FrameGraph>) -> Result<Self> {
        if let Some(pair) = frames.windows(2).find(|w| w[0].timestamp >= w[1].timestamp) {
            return Err(PipelineError::InvalidConfig(format!(
                "sequence timestamps not strictly increasing: {} then {}",
                pair[0].timestamp, pair[1].timestamp
            )));
        }
        Ok(Self { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[FrameGraph] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FrameGraph> {
        self.frames.iter()
    }

    pub fn into_frames(self) -> Vec<FrameGraph> {
        self.frames
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.frames.iter().map(|f| f.timestamp).collect()
    }

    /// Split into `[0, at)` and `[at, len)`, keeping order.
    pub fn split_at(mut self, at: usize) -> (Self, Self) {
        let at = at.min(self.frames.len());
        let tail = self.frames.split_off(at);
        (self, Self { frames: tail })
    }
}

impl<'a> IntoIterator for &'a TemporalGraphSequence {
    type Item = &'a FrameGraph;
    type IntoIter = std::slice::Iter<'a, FrameGraph>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}
