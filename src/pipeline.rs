//! End-to-end pipeline: discover, load, assemble, interpolate, split.
//!
//! Configuration is validated in [`Pipeline::new`], before any file is
//! read. Frame files are parsed on a small worker pool; frame-local errors
//! are recorded in the [`RunLog`] and the run continues without that frame.

use crate::config::PipelineConfig;
use crate::core::batch::{BatchedFrameGraph, Batcher};
use crate::core::features::FeatureNormalizer;
use crate::core::graph::{FrameGraph, GraphBuilder};
use crate::core::interpolate::TemporalInterpolator;
use crate::core::sequence::{FrameSource, SequenceAssembler, SkippedSource, TemporalGraphSequence};
use crate::core::split::{DatasetSplits, Splitter};
use crate::error::Result;
use crate::export;
use crate::ingest::{load_frame, load_registry, NodeTable, TimestampExtractor};
use crate::report::{create_shared_log, RunLog, SharedRunLog};
use crossbeam_channel::unbounded;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Everything a run produced, kept in memory.
#[derive(Debug)]
pub struct PipelineOutput {
    /// Directory the frames were read from
    pub root: PathBuf,
    /// Observed plus synthesized frames, partitioned in time order
    pub splits: DatasetSplits,
    pub log: SharedRunLog,
}

impl PipelineOutput {
    /// Total frames across all partitions.
    pub fn num_frames(&self) -> usize {
        let (train, validation, test) = self.splits.lengths();
        train + validation + test
    }
}

/// A configured pipeline; cheap to reuse across input roots.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    builder: GraphBuilder,
    normalizer: FeatureNormalizer,
    interpolator: TemporalInterpolator,
    assembler: SequenceAssembler,
    splitter: Splitter,
    batcher: Batcher,
}

impl Pipeline {
    /// Validate `config` and set up every stage.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let builder = GraphBuilder::new(&config.graph)?;
        let normalizer = FeatureNormalizer::new(&config.features);
        let extractor = TimestampExtractor::new(&config.ingest.filename_prefix)?;

        Ok(Self {
            builder,
            interpolator: TemporalInterpolator::new(normalizer.clone()),
            normalizer,
            assembler: SequenceAssembler::new(extractor, config.ingest.registry_file.clone()),
            splitter: Splitter::new(config.split),
            batcher: Batcher::new(config.batch_size)?,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn batcher(&self) -> &Batcher {
        &self.batcher
    }

    /// Registry path for an input root.
    pub fn registry_path(&self, root: &Path) -> PathBuf {
        root.join(&self.config.ingest.registry_file)
    }

    /// Run every stage on the frames under `root`.
    pub fn run(&self, root: &Path) -> Result<PipelineOutput> {
        let log = create_shared_log();

        let table = load_registry(&self.registry_path(root))?;
        info!(
            nodes = table.len(),
            threshold = self.builder.threshold(),
            "loaded node registry"
        );

        let discovery = self.assembler.discover(root)?;
        log.record_sources_discovered((discovery.sources.len() + discovery.skipped.len()) as u64);
        log.record_skipped_all(discovery.skipped);

        let graphs = self.load_frames(&table, &discovery.sources, &log)?;

        let (sequence, duplicates) = self.assembler.assemble(graphs);
        log.record_skipped_all(duplicates);

        let sequence = if self.config.interpolate {
            let observed = sequence.len();
            let filled = self.interpolator.fill(sequence.into_frames())?;
            log.record_frames_interpolated((filled.len() - observed) as u64);
            TemporalGraphSequence::new(filled)?
        } else {
            sequence
        };

        let splits = self.splitter.split_three(sequence);
        let (train, validation, test) = splits.lengths();
        info!(train, validation, test, "split sequence");

        Ok(PipelineOutput {
            root: root.to_path_buf(),
            splits,
            log,
        })
    }

    /// Parse and build graphs for `sources` on the worker pool.
    ///
    /// Results come back in completion order. Frame-local failures are
    /// recorded in `log`; the first fatal error aborts the run.
    pub fn load_frames(&self, table: &NodeTable, sources: &[FrameSource], log: &RunLog) -> Result<Vec<FrameGraph>> {
        if sources.is_empty() {
            return Ok(Vec::new());
        }

        let workers = self.config.ingest.workers.min(sources.len()).max(1);
        let (job_tx, job_rx) = unbounded::<&FrameSource>();
        let (result_tx, result_rx) = unbounded::<(&FrameSource, Result<FrameGraph>)>();

        for source in sources {
            // Receiver is alive for the whole scope; a send cannot fail here.
            let _ = job_tx.send(source);
        }
        drop(job_tx);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                scope.spawn(move || {
                    for source in jobs.iter() {
                        let graph = load_frame(&source.path, source.timestamp, table)
                            .and_then(|obs| self.builder.build(table, &obs, &self.normalizer));
                        if results.send((source, graph)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut graphs = Vec::with_capacity(sources.len());
        for (source, result) in result_rx.iter() {
            match result {
                Ok(graph) => {
                    debug!(path = %source.path.display(), edges = graph.num_edges(), "built frame graph");
                    log.record_frame_loaded();
                    graphs.push(graph);
                }
                Err(e) => match SkippedSource::from_error(&source.path, &e) {
                    Some(skipped) => {
                        warn!(path = %source.path.display(), error = %e, "skipping frame");
                        log.record_skipped(skipped);
                    }
                    None => return Err(e),
                },
            }
        }

        info!(loaded = graphs.len(), workers, "loaded frames");
        Ok(graphs)
    }

    /// Disjoint-union batches for one partition.
    pub fn batches(&self, sequence: &TemporalGraphSequence) -> Result<Vec<BatchedFrameGraph>> {
        self.batcher.batch(sequence.frames())
    }

    /// Write a run's frames and manifest to `dir`.
    ///
    /// `dir` must not overlap the run's input root.
    pub fn export(&self, output: &PipelineOutput, dir: &Path) -> Result<u64> {
        let written = export::export_splits(
            &output.root,
            dir,
            &output.splits,
            &self.normalizer,
            &self.config.ingest.filename_prefix,
            &output.log,
        )?;
        output.log.record_files_written(written);
        Ok(written)
    }
}
