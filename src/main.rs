//! lotgraph CLI
//!
//! Builds temporal proximity-graph datasets from parking-occupancy frames.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lotgraph::{EdgeWeighting, Pipeline, PipelineConfig, VERSION};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "lotgraph")]
#[command(version = VERSION)]
#[command(about = "Temporal proximity graphs from parking-occupancy frames", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and export every frame
    Build {
        /// Directory holding the node registry and frame files
        #[arg(long, short)]
        input: PathBuf,

        /// Output directory (cleared before writing)
        #[arg(long, short)]
        output: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Run the pipeline in memory and print what it would produce
    Inspect {
        /// Directory holding the node registry and frame files
        #[arg(long, short)]
        input: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Show configuration
    Config {
        /// Write the default configuration to the config path
        #[arg(long)]
        init: bool,

        /// Configuration file to read or write
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Flags that override individual configuration fields.
#[derive(Args)]
struct Overrides {
    /// Configuration file (defaults to the platform config path)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pixel distance below which two nodes are connected
    #[arg(long)]
    threshold: Option<f64>,

    /// Edge weighting (uniform or gaussian)
    #[arg(long)]
    weighting: Option<EdgeWeighting>,

    /// Frames per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Do not synthesize frames for missing seconds
    #[arg(long)]
    no_interpolate: bool,
}

impl Overrides {
    fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = load_config(self.config.as_deref())?;

        if let Some(threshold) = self.threshold {
            config.graph.distance_threshold = threshold;
        }
        if let Some(weighting) = self.weighting {
            config.graph.weighting = weighting;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if self.no_interpolate {
            config.interpolate = false;
        }

        Ok(config)
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => PipelineConfig::load_from(p)
            .with_context(|| format!("loading configuration from {}", p.display())),
        None => PipelineConfig::load().context("loading configuration"),
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Build {
            input,
            output,
            overrides,
        } => cmd_build(&input, &output, &overrides),
        Commands::Inspect { input, overrides } => cmd_inspect(&input, &overrides),
        Commands::Config { init, config } => cmd_config(init, config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_build(input: &Path, output: &Path, overrides: &Overrides) -> Result<()> {
    let pipeline = Pipeline::new(overrides.resolve()?).context("invalid configuration")?;

    println!("lotgraph v{VERSION}");
    println!();
    println!("Input:  {}", input.display());
    println!("Output: {}", output.display());
    println!();

    let run = pipeline
        .run(input)
        .with_context(|| format!("processing {}", input.display()))?;
    pipeline
        .export(&run, output)
        .with_context(|| format!("writing {}", output.display()))?;

    let (train, validation, test) = run.splits.lengths();
    println!("Frames: {} (train {train}, validation {validation}, test {test})", run.num_frames());
    println!();
    println!("{}", run.log.summary());
    Ok(())
}

fn cmd_inspect(input: &Path, overrides: &Overrides) -> Result<()> {
    let pipeline = Pipeline::new(overrides.resolve()?).context("invalid configuration")?;
    let run = pipeline
        .run(input)
        .with_context(|| format!("processing {}", input.display()))?;

    let (train, validation, test) = run.splits.lengths();
    let batcher = pipeline.batcher();

    println!("Sequence");
    println!("========");
    println!();
    println!("  Frames:           {}", run.num_frames());
    println!("  Interpolated:     {}", run.log.stats().frames_interpolated);
    println!("  Train:            {train} ({} batches)", batcher.batch_count(train));
    println!("  Validation:       {validation} ({} batches)", batcher.batch_count(validation));
    println!("  Test:             {test} ({} batches)", batcher.batch_count(test));
    println!("  Batch size:       {}", batcher.batch_size());
    if let Some(first) = run.splits.train.frames().first() {
        println!("  Nodes per frame:  {}", first.num_nodes());
        println!("  Edges per frame:  {}", first.num_edges());
    }
    println!();
    println!("{}", run.log.summary());
    Ok(())
}

fn cmd_config(init: bool, path: Option<&Path>) -> Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(PipelineConfig::config_path);

    if init {
        PipelineConfig::default()
            .save_to(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let config = if path.exists() {
        load_config(Some(&path))?
    } else {
        PipelineConfig::default()
    };

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", path.display());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
