use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};

use structure_segmenter::{
    audio::{AudioLoader, AudioSource},
    config::AnalysisConfig,
    features::FeatureKind,
    report::SegmentationReport,
    session::AnalysisSession,
};

#[derive(Parser)]
#[command(
    name = "structure-segmenter",
    version,
    about = "Find the structure of a piece of music",
    long_about = "Structure-Segmenter compares every moment of a recording with every other moment and reports nested macro, meso and micro segment boundaries."
)]
struct Cli {
    /// Audio file path (WAV, MP3, FLAC, OGG)
    #[arg(short, long)]
    audio: PathBuf,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a TOML report to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Comma-separated features to use (mfcc, cqt, autocorrelation)
    #[arg(short, long, value_delimiter = ',')]
    features: Option<Vec<FeatureKind>>,

    /// Analysis frame size in samples
    #[arg(long)]
    frame_size: Option<usize>,

    /// Samples shared by consecutive frames
    #[arg(long)]
    overlap: Option<usize>,

    /// Skip macro (section) detection
    #[arg(long)]
    no_macro: bool,

    /// Skip meso (phrase) detection
    #[arg(long)]
    no_meso: bool,

    /// Skip micro detection
    #[arg(long)]
    no_micro: bool,

    /// Use a larger frame size automatically for long recordings
    #[arg(long)]
    auto_frame_size: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut AnalysisConfig) {
        if let Some(features) = &self.features {
            config.features.enabled = features.clone();
        }
        if let Some(frame_size) = self.frame_size {
            config.frame_size = frame_size;
        }
        if let Some(overlap) = self.overlap {
            config.overlap = overlap;
        }
        if self.no_macro {
            config.levels.macro_enabled = false;
        }
        if self.no_meso {
            config.levels.meso_enabled = false;
        }
        if self.no_micro {
            config.levels.micro_enabled = false;
        }
        if self.auto_frame_size {
            config.runtime.auto_frame_size = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .init();

    info!("Starting Structure-Segmenter v{}", env!("CARGO_PKG_VERSION"));
    info!("Audio: {:?}", cli.audio);

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            AnalysisConfig::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            AnalysisConfig::default()
        }
    };
    cli.apply_overrides(&mut config);
    config.validate()?;

    let audio = Arc::new(AudioLoader::load(&cli.audio).await?);
    info!(
        "Loaded {:.1}s at {} Hz ({} channel(s))",
        audio.duration_secs(),
        audio.sample_rate,
        audio.channels
    );

    // The analysis is CPU-bound; keep it off the async workers
    let session = Arc::new(AnalysisSession::new());
    let result = {
        let (session, audio, config) = (session.clone(), audio.clone(), config.clone());
        tokio::task::spawn_blocking(move || session.run(audio.as_ref(), &config))
            .await
            .context("analysis task panicked")??
    };

    for level in result.computed_levels() {
        info!("{} level: {} segments", level.level, level.segments.len());
        for segment in &level.segments {
            info!("   {:>8.2}s - {:>8.2}s", segment.start, segment.end);
        }
    }

    if let Some(output) = &cli.output {
        let used_config = session.last_config().unwrap_or(config);
        let matrix = session.similarity_matrix()?;
        let report = SegmentationReport::new(audio.source_id(), &used_config, &result, &matrix);
        report.save_to_file(output)?;
        info!("Report saved to: {:?}", output);
    }

    Ok(())
}
