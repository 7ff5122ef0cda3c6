//! # Analysis Session
//!
//! [`AnalysisSession`] is the entry point: it validates the configuration, drives the
//! pipeline stages, publishes the results, and tells registered listeners when a run
//! starts and ends.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use structure_segmenter::{
//!     audio::AudioLoader,
//!     config::AnalysisConfig,
//!     session::{AnalysisSession, ChannelListener},
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let audio = AudioLoader::load("song.wav").await?;
//!
//! let session = AnalysisSession::new();
//! let (listener, events) = ChannelListener::channel();
//! session.add_listener(Arc::new(listener));
//!
//! let result = session.run(&audio, &AnalysisConfig::default())?;
//! for level in result.computed_levels() {
//!     println!("{}: {} segments", level.level, level.segments.len());
//! }
//! # drop(events);
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod listener;

use serde::Serialize;

pub use engine::AnalysisSession;
pub use listener::{CalculationEvent, CalculationListener, CalculationOutcome, ChannelListener};

/// Where a session is in its lifecycle
///
/// `Idle -> Extracting -> MatrixBuilt -> SegmentDetecting -> Done`. A detection-only run
/// goes straight from `Done` (or `Idle` after a failed run) to `SegmentDetecting`.
/// Clearing returns to `Idle` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Extracting,
    MatrixBuilt,
    SegmentDetecting,
    Done,
}
