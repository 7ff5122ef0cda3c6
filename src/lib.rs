//! # Structure Segmenter
//!
//! Hierarchical structural segmentation of audio recordings.
//!
//! The library measures how similar every moment of a recording is to every other moment
//! and turns that into three nested segmentations: macro (sections), meso (phrases) and
//! micro (short events).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use structure_segmenter::{
//!     audio::AudioLoader,
//!     config::AnalysisConfig,
//!     session::AnalysisSession,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let audio = AudioLoader::load("song.wav").await?;
//! let session = AnalysisSession::new();
//!
//! let result = session.run(&audio, &AnalysisConfig::with_defaults(50.0, 8000.0))?;
//! if let Some(sections) = result.macro_level() {
//!     for segment in &sections.segments {
//!         println!("{:.1}s - {:.1}s", segment.start, segment.end);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Data flows strictly forward:
//!
//! - [`audio`] - PCM sources and file loading
//! - [`features`] - Per-frame extractors (MFCC, Constant-Q, autocorrelation)
//! - [`pipeline`] - Frame layout and ordered extraction
//! - [`analysis`] - Similarity matrix, novelty curves, boundary detection
//! - [`session`] - Orchestration, result reuse and lifecycle notifications
//! - [`config`] - Configuration management
//!
//! ## Custom Extractors
//!
//! Any built-in extractor can be replaced through the [`ExtractorRegistry`](features::ExtractorRegistry):
//!
//! ```rust,no_run
//! use structure_segmenter::features::{ExtractorRegistry, FeatureExtractor, FeatureKind, FeatureVector};
//! use structure_segmenter::session::AnalysisSession;
//! use structure_segmenter::Result;
//!
//! struct Energy;
//!
//! impl FeatureExtractor for Energy {
//!     fn kind(&self) -> FeatureKind {
//!         FeatureKind::Autocorrelation
//!     }
//!
//!     fn consume(&mut self, frame: &[f32]) -> Result<FeatureVector> {
//!         Ok(vec![frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32])
//!     }
//! }
//!
//! let mut registry = ExtractorRegistry::new();
//! registry.register(FeatureKind::Autocorrelation, |_| Ok(Box::new(Energy)));
//! let session = AnalysisSession::with_registry(registry);
//! ```

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod report;
pub mod session;

// Re-export commonly used types for convenience
pub use crate::{
    analysis::{SegmentationLevel, SegmentationResult},
    config::AnalysisConfig,
    error::{Result, SegmenterError},
    report::SegmentationReport,
    session::AnalysisSession,
};
