//! # Audio Sources
//!
//! Decoding lives outside the segmenter: anything that can report its length and sample
//! rate and hand out a sequential mono PCM reader is an [`AudioSource`].
//!
//! [`AudioData`] is the in-memory implementation. [`AudioLoader`] fills it from WAV files
//! (via `hound`) and compressed formats (via `symphonia`).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use structure_segmenter::audio::{AudioLoader, AudioSource};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let audio = AudioLoader::load("song.wav").await?;
//! println!("{} mono frames at {} Hz", audio.total_frames(), audio.format().sample_rate);
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod types;

pub use loader::AudioLoader;
pub use types::{AudioData, AudioFormat, AudioSource, MonoMixReader, PcmFormat, PcmReader};
