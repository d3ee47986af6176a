//! Integration tests for the lotgraph pipeline

use lotgraph::core::FrameOrigin;
use lotgraph::{Pipeline, PipelineConfig, PipelineError};
use std::path::Path;
use tempfile::TempDir;

const HEADER: &str = "node_id,x_pixel,y_pixel,is_handicapped,is_occupied";

fn write(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, format!("{HEADER}\n{body}")).unwrap();
}

/// Three nodes; only the first two are within 75 px of each other.
fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    write(root, "nodes.csv", "1,0,0,1,0\n2,30,0,0,0\n3,200,0,0,0\n");
    write(root, "DJI_20240611143000_0001.csv", "1,0,0,1,0\n2,30,0,0,1\n3,200,0,0,0\n");
    write(root, "DJI_20240611143003_0002.csv", "1,0,0,1,1\n2,30,0,0,1\n3,200,0,0,0\n");
    // Missing the is_occupied column.
    std::fs::write(
        root.join("DJI_20240611143005_0003.csv"),
        "node_id,x_pixel,y_pixel,is_handicapped\n1,0,0,1\n",
    )
    .unwrap();
    // No timestamp token anywhere in the path.
    write(root, "DJI_unlabelled.csv", "1,0,0,1,0\n2,30,0,0,0\n3,200,0,0,0\n");

    dir
}

fn pipeline(config: PipelineConfig) -> Pipeline {
    Pipeline::new(config).unwrap()
}

#[test]
fn test_run_counts_skipped_and_interpolated() {
    let input = fixture();
    let output = pipeline(PipelineConfig::default()).run(input.path()).unwrap();

    let stats = output.log.stats();
    assert_eq!(stats.sources_discovered, 4);
    assert_eq!(stats.frames_loaded, 2);
    assert_eq!(stats.malformed_records, 1);
    assert_eq!(stats.unparsed_timestamps, 1);
    assert_eq!(stats.duplicate_timestamps, 0);
    assert_eq!(stats.frames_interpolated, 2);

    // 4 frames: floor(0.8 * 4) = 3 train, then 0 validation, 1 test.
    assert_eq!(output.num_frames(), 4);
    assert_eq!(output.splits.lengths(), (3, 0, 1));

    let skipped = output.log.skipped();
    assert!(skipped.iter().any(|s| s.source.ends_with("DJI_20240611143005_0003.csv")));
    assert!(skipped.iter().any(|s| s.source.ends_with("DJI_unlabelled.csv")));
}

#[test]
fn test_interpolated_labels_round_half_up() {
    let input = fixture();
    let output = pipeline(PipelineConfig::default()).run(input.path()).unwrap();

    let train = output.splits.train.frames();
    let labels: Vec<Vec<u8>> = train.iter().map(|f| f.labels.clone()).collect();

    // Node 1 goes 0 -> 1 over three seconds: alpha 1/3 rounds to 0, 2/3 to 1.
    assert_eq!(labels[0], vec![0, 1, 0]);
    assert_eq!(labels[1], vec![0, 1, 0]);
    assert_eq!(labels[2], vec![1, 1, 0]);
    assert_eq!(output.splits.test.frames()[0].labels, vec![1, 1, 0]);

    assert_eq!(train[1].origin, FrameOrigin::Interpolated { gap: 0, step: 1 });
    assert_eq!(train[2].origin, FrameOrigin::Interpolated { gap: 0, step: 2 });

    // Synthesized frames share the observed topology.
    for frame in train {
        assert_eq!(frame.num_nodes(), 3);
        assert_eq!(frame.edges, train[0].edges);
    }
}

#[test]
fn test_edges_follow_distance_threshold() {
    let input = fixture();
    let output = pipeline(PipelineConfig::default()).run(input.path()).unwrap();
    let frame = &output.splits.train.frames()[0];

    let pairs: Vec<(usize, usize)> = frame.edges.iter().map(|e| (e.src, e.dst)).collect();
    assert_eq!(pairs, vec![(0, 1), (1, 0)]);
    assert!(frame.edge_weights.iter().all(|w| *w > 0.0 && *w <= 1.0));
}

#[test]
fn test_no_interpolate_keeps_observed_frames_only() {
    let input = fixture();
    let mut config = PipelineConfig::default();
    config.interpolate = false;
    let output = pipeline(config).run(input.path()).unwrap();

    assert_eq!(output.num_frames(), 2);
    assert_eq!(output.log.stats().frames_interpolated, 0);
}

#[test]
fn test_duplicate_timestamp_keeps_first_source() {
    let input = fixture();
    write(input.path(), "DJI_20240611143000_0009.csv", "1,0,0,1,1\n2,30,0,0,1\n3,200,0,0,1\n");

    let output = pipeline(PipelineConfig::default()).run(input.path()).unwrap();
    let stats = output.log.stats();
    assert_eq!(stats.duplicate_timestamps, 1);

    let first = &output.splits.train.frames()[0];
    match &first.origin {
        FrameOrigin::Observed { source: Some(path) } => {
            assert!(path.ends_with("DJI_20240611143000_0001.csv"));
        }
        other => panic!("unexpected origin {other:?}"),
    }
}

#[test]
fn test_timestamp_from_parent_folder() {
    let input = fixture();
    write(input.path(), "20240611143004/frame.csv", "1,0,0,1,1\n2,30,0,0,0\n3,200,0,0,0\n");

    let output = pipeline(PipelineConfig::default()).run(input.path()).unwrap();
    assert_eq!(output.log.stats().frames_loaded, 3);
    assert_eq!(output.num_frames(), 5);
}

#[test]
fn test_build_exports_frames_and_manifest() {
    let input = fixture();
    let out_root = TempDir::new().unwrap();
    let out = out_root.path().join("dataset");

    let pipeline = pipeline(PipelineConfig::default());
    let run = pipeline.run(input.path()).unwrap();
    let written = pipeline.export(&run, &out).unwrap();
    assert_eq!(written, 9);

    assert!(out.join("DJI_20240611143000_0001.csv").exists());
    assert!(out.join("DJI_20240611143000_0001_edges.csv").exists());
    assert!(out.join("DJI_20240611143001_interp_0_1.csv").exists());
    assert!(out.join("DJI_20240611143002_interp_0_2_edges.csv").exists());
    assert!(out.join("DJI_20240611143003_0002.csv").exists());

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("manifest.json")).unwrap()).unwrap();
    assert_eq!(manifest["train"].as_array().unwrap().len(), 3);
    assert_eq!(manifest["test"][0], "DJI_20240611143003_0002");
    assert_eq!(manifest["stats"]["files_written"], 9);
    assert_eq!(run.log.stats().files_written, 9);
    assert_eq!(manifest["skipped"].as_array().unwrap().len(), 2);

    // Inputs are left untouched.
    let original = std::fs::read_to_string(input.path().join("DJI_20240611143000_0001.csv")).unwrap();
    assert_eq!(original, format!("{HEADER}\n1,0,0,1,0\n2,30,0,0,1\n3,200,0,0,0\n"));
}

#[test]
fn test_rebuild_replaces_previous_output() {
    let input = fixture();
    let out_root = TempDir::new().unwrap();
    let out = out_root.path().join("dataset");
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join("stale.csv"), "old").unwrap();

    let pipeline = pipeline(PipelineConfig::default());
    let run = pipeline.run(input.path()).unwrap();
    pipeline.export(&run, &out).unwrap();

    assert!(!out.join("stale.csv").exists());
    assert!(out.join("manifest.json").exists());
}

#[test]
fn test_invalid_threshold_aborts_before_work() {
    let mut config = PipelineConfig::default();
    config.graph.distance_threshold = -1.0;
    assert!(matches!(
        Pipeline::new(config),
        Err(PipelineError::InvalidThreshold(t)) if t == -1.0
    ));
}

#[test]
fn test_batches_over_train_split() {
    let input = fixture();
    let mut config = PipelineConfig::default();
    config.batch_size = 2;
    let pipeline = pipeline(config);
    let run = pipeline.run(input.path()).unwrap();

    let batches = pipeline.batches(&run.splits.train).unwrap();
    let sizes: Vec<usize> = batches.iter().map(|b| b.num_frames()).collect();
    assert_eq!(sizes, vec![2, 1]);
    assert_eq!(batches[0].graph.num_nodes(), 6);
    assert_eq!(batches[0].graph.edges[2].src, 3);
}

#[test]
fn test_export_over_input_is_rejected_and_input_kept() {
    let input = fixture();
    let pipeline = pipeline(PipelineConfig::default());
    let run = pipeline.run(input.path()).unwrap();

    let err = pipeline.export(&run, input.path()).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)));
    assert!(input.path().join("nodes.csv").exists());
    assert!(input.path().join("DJI_20240611143000_0001.csv").exists());

    let nested = input.path().join("out");
    assert!(pipeline.export(&run, &nested).is_err());
    assert!(!nested.exists());
    assert_eq!(run.log.stats().files_written, 0);
}

#[test]
fn test_rerun_ignores_previous_export_inside_input() {
    let input = fixture();
    let out_root = TempDir::new().unwrap();
    let out = out_root.path().join("dataset");

    let pipeline = pipeline(PipelineConfig::default());
    let first = pipeline.run(input.path()).unwrap();
    pipeline.export(&first, &out).unwrap();

    // Someone moves the export under the input tree.
    let stale = input.path().join("dataset");
    std::fs::create_dir_all(&stale).unwrap();
    for entry in std::fs::read_dir(&out).unwrap() {
        let entry = entry.unwrap();
        std::fs::copy(entry.path(), stale.join(entry.file_name())).unwrap();
    }
    // A loose synthesized frame outside any export directory.
    std::fs::copy(
        out.join("DJI_20240611143001_interp_0_1.csv"),
        input.path().join("DJI_20240611143001_interp_0_1.csv"),
    )
    .unwrap();

    let second = pipeline.run(input.path()).unwrap();
    let stats = second.log.stats();
    assert_eq!(stats.frames_loaded, 2);
    assert_eq!(stats.frames_interpolated, 2);
    assert_eq!(stats.duplicate_timestamps, 0);
    assert_eq!(second.num_frames(), 4);
}
