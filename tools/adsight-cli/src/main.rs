//! Adsight CLI: score how well ads are displayed in a video.
//!
//! Usage:
//!   adsight analyze <DETECTIONS> --frames <DIR>   Score ad appearances
//!   adsight validate <DETECTIONS>                  Check a detections file
//!   adsight init-config                            Write the default configuration

use std::path::PathBuf;

use adsight_common::config::{AppConfig, GroupingStrategyKind};
use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod frames;

#[derive(Parser)]
#[command(
    name = "adsight",
    about = "Ad display quality analysis for object-detector output",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the standard location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Density,
    Greedy,
}

impl From<StrategyArg> for GroupingStrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Density => GroupingStrategyKind::Density,
            StrategyArg::Greedy => GroupingStrategyKind::Greedy,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Group detections into ad appearances and score each one
    Analyze {
        /// Detector output (JSON)
        detections: PathBuf,

        /// Directory of decoded frames, one image per frame in name order
        #[arg(long)]
        frames: PathBuf,

        /// Grouping strategy
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit the report as JSON
        #[arg(long)]
        json: bool,

        /// Video entry to analyze when the file holds several
        #[arg(long)]
        video_id: Option<String>,

        /// Override the frame rate recorded in the detections file
        #[arg(long)]
        frame_rate: Option<f64>,

        /// Override the minimum detection confidence
        #[arg(long)]
        min_confidence: Option<f64>,

        /// Override the frame subsampling stride
        #[arg(long)]
        frame_skip: Option<u64>,

        /// Override the number of evaluation workers
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Report metadata and validator rejections for a detections file
    Validate {
        /// Detector output (JSON)
        detections: PathBuf,

        /// Print rejection statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the default configuration
    InitConfig {
        /// Destination (defaults to the standard location)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => AppConfig::load(),
    };

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    adsight_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Analyze {
            detections,
            frames,
            strategy,
            output,
            json,
            video_id,
            frame_rate,
            min_confidence,
            frame_skip,
            workers,
        } => {
            let analysis = &mut config.analysis;
            if let Some(strategy) = strategy {
                analysis.grouping.strategy = strategy.into();
            }
            if let Some(min_confidence) = min_confidence {
                analysis.validation.min_confidence = min_confidence;
            }
            if let Some(frame_skip) = frame_skip {
                analysis.grouping.frame_skip = frame_skip;
            }
            if let Some(workers) = workers {
                analysis.workers = workers;
            }
            commands::analyze::run(commands::analyze::AnalyzeArgs {
                detections,
                frames,
                output,
                json,
                video_id,
                frame_rate,
                config: config.analysis,
            })
        }
        Commands::Validate { detections, json } => {
            commands::validate::run(detections, json, &config.analysis)
        }
        Commands::InitConfig { output } => commands::init_config::run(output),
    }
}
