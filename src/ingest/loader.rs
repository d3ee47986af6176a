//! CSV loading for the node registry and per-frame records.
//!
//! Loading is a pure read: source files are never rewritten.

use crate::error::{PipelineError, Result};
use crate::ingest::types::{FrameObservation, NodeRecord, NodeTable, REQUIRED_COLUMNS};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Parse node rows from any reader, checking the header first.
pub fn read_records<R: Read>(origin: &str, reader: R) -> Result<Vec<NodeRecord>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| PipelineError::malformed(origin, format!("unreadable header: {e}")))?
        .clone();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::malformed(
            origin,
            format!("missing required column(s): {}", missing.join(", ")),
        ));
    }

    let mut records = Vec::new();
    for (row, result) in rdr.deserialize::<NodeRecord>().enumerate() {
        // Row numbers are 1-based and skip the header line.
        let record =
            result.map_err(|e| PipelineError::malformed(origin, format!("row {}: {e}", row + 2)))?;
        if !record.x_pixel.is_finite() || !record.y_pixel.is_finite() {
            return Err(PipelineError::malformed(
                origin,
                format!("row {}: non-finite position for node {}", row + 2, record.node_id),
            ));
        }
        records.push(record);
    }

    Ok(records)
}

/// Load the node registry of a deployment.
pub fn load_registry(path: &Path) -> Result<NodeTable> {
    let origin = path.display().to_string();
    let file = std::fs::File::open(path)?;
    let records = read_records(&origin, file)?;
    let table = NodeTable::from_records(&origin, records)?;
    debug!(path = %origin, nodes = table.len(), "loaded node registry");
    Ok(table)
}

/// Validate frame rows against the registry and key them by node id.
///
/// Every registry node must appear exactly once and no other ids may
/// appear, so that all frames of a deployment share one node ordering.
pub fn observation_from_records(
    origin: &str,
    timestamp: NaiveDateTime,
    records: Vec<NodeRecord>,
    table: &NodeTable,
) -> Result<FrameObservation> {
    let mut occupancy = BTreeMap::new();

    for record in records {
        if !table.contains(record.node_id) {
            return Err(PipelineError::malformed(
                origin,
                format!("node {} is not in the registry", record.node_id),
            ));
        }
        if occupancy.insert(record.node_id, record.is_occupied).is_some() {
            return Err(PipelineError::malformed(
                origin,
                format!("duplicate node_id {}", record.node_id),
            ));
        }
    }

    if occupancy.len() != table.len() {
        let absent: Vec<String> = table
            .nodes()
            .iter()
            .filter(|n| !occupancy.contains_key(&n.id))
            .map(|n| n.id.to_string())
            .collect();
        return Err(PipelineError::malformed(
            origin,
            format!("registry node(s) missing from frame: {}", absent.join(", ")),
        ));
    }

    Ok(FrameObservation::new(timestamp, occupancy))
}

/// Load one frame file.
///
/// Failing to open the file only invalidates this frame, unlike a missing
/// registry.
pub fn load_frame(path: &Path, timestamp: NaiveDateTime, table: &NodeTable) -> Result<FrameObservation> {
    let origin = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|e| PipelineError::unreadable(&origin, e.to_string()))?;
    let records = read_records(&origin, file)?;
    let observation = observation_from_records(&origin, timestamp, records, table)?;
    Ok(observation.with_source(path.to_path_buf()))
}
