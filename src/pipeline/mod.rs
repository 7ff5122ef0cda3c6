//! # Feature Frame Pipeline
//!
//! Cuts the signal into frames and runs every enabled extractor over each frame, strictly
//! in frame order.
//!
//! A dispatcher thread reads PCM from the source and sends whole frames over a bounded
//! channel; the calling thread consumes them and fills a [`FeatureStore`]. The channel
//! closing is the completion signal. Extraction succeeds only when every `(kind, frame)`
//! slot has been filled.

pub mod layout;
pub mod store;

use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info};

use crate::{
    audio::{AudioSource, PcmReader},
    config::AnalysisConfig,
    error::{AnalysisError, AudioError, Result},
    features::{ExtractorRegistry, FeatureExtractor},
};

pub use layout::{frame_count, FrameClock, FrameLayout};
pub use store::{FeatureSequence, FeatureSet, FeatureStore};

/// Frames buffered between the dispatcher and the extractors
const CHANNEL_DEPTH: usize = 16;

/// One frame of mono PCM, zero-padded to the frame size
#[derive(Debug)]
struct PcmFrame {
    index: usize,
    samples: Vec<f32>,
}

/// Drives frame-by-frame extraction over a whole source
pub struct FeatureFramePipeline<'a> {
    registry: &'a ExtractorRegistry,
    channel_depth: usize,
}

impl<'a> FeatureFramePipeline<'a> {
    pub fn new(registry: &'a ExtractorRegistry) -> Self {
        Self {
            registry,
            channel_depth: CHANNEL_DEPTH,
        }
    }

    pub fn with_channel_depth(mut self, depth: usize) -> Self {
        self.channel_depth = depth.max(1);
        self
    }

    /// Extract all enabled features from `source`
    pub fn extract(&self, source: &dyn AudioSource, config: &AnalysisConfig) -> Result<FeatureSet> {
        self.extract_until(source, config, || false)
    }

    /// Like [`extract`](Self::extract), stopping with `Abandoned` once `abandoned` returns true
    pub fn extract_until<F>(&self, source: &dyn AudioSource, config: &AnalysisConfig, abandoned: F) -> Result<FeatureSet>
    where
        F: Fn() -> bool,
    {
        let started = Instant::now();
        let layout = FrameLayout::new(source.total_frames(), config.frame_size, config.overlap)?;

        let sample_rate = source.format().sample_rate;
        if sample_rate == 0 {
            return Err(AudioError::InvalidParameters {
                details: "sample rate is 0 Hz".to_string(),
            }.into());
        }
        let sample_rate = sample_rate as f32;

        let mut extractors = self.registry.build_enabled(config, sample_rate)?;
        let kinds: Vec<_> = config
            .features
            .enabled
            .iter()
            .map(|&kind| (kind, kind.vector_len(&config.features, sample_rate)))
            .collect();
        let mut store = FeatureStore::new(&kinds, layout.frame_count);

        debug!(
            "Extracting {:?} over {} frames (size {}, hop {})",
            config.features.enabled,
            layout.frame_count,
            layout.frame_size,
            layout.hop()
        );

        let reader = source.reader()?;
        let depth = self.channel_depth;

        std::thread::scope(|scope| -> Result<()> {
            let (tx, rx) = bounded(depth);
            let dispatcher = scope.spawn(move || dispatch_frames(reader, layout, tx));

            let consumed = consume_frames(rx, &mut extractors, &mut store, &abandoned);
            let dispatched = dispatcher.join().map_err(|_| AnalysisError::ExtractionFailed {
                reason: "frame dispatcher panicked".to_string(),
            })?;

            consumed?;
            dispatched
        })?;

        let features = store.finish()?;
        info!(
            "Extracted {} feature kind(s) for {} frames in {:.2?}",
            features.sequences().len(),
            features.frame_count(),
            started.elapsed()
        );
        Ok(features)
    }
}

/// Runs on the calling thread; returning drops the receiver, which stops the dispatcher
fn consume_frames<F>(
    rx: Receiver<PcmFrame>,
    extractors: &mut [Box<dyn FeatureExtractor>],
    store: &mut FeatureStore,
    abandoned: &F,
) -> Result<()>
where
    F: Fn() -> bool,
{
    for frame in rx {
        if abandoned() {
            return Err(AnalysisError::Abandoned.into());
        }
        for extractor in extractors.iter_mut() {
            let vector = extractor.consume(&frame.samples)?;
            store.insert(extractor.kind(), frame.index, vector)?;
        }
    }
    Ok(())
}

fn dispatch_frames(mut reader: Box<dyn PcmReader + '_>, layout: FrameLayout, tx: Sender<PcmFrame>) -> Result<()> {
    let hop = layout.hop();
    let mut window = vec![0.0f32; layout.frame_size];

    let mut valid = read_full(reader.as_mut(), &mut window)?;
    let mut delivered = valid;
    let mut exhausted = valid < layout.frame_size;

    for index in 0..layout.frame_count {
        if index > 0 {
            window.copy_within(hop.., 0);
            valid = valid.saturating_sub(hop);
            window[valid..].fill(0.0);

            if !exhausted {
                let read = read_full(reader.as_mut(), &mut window[valid..])?;
                delivered += read;
                exhausted = read < layout.frame_size - valid;
                valid += read;
            }
        }

        if valid == 0 {
            return Err(AudioError::SourceUnavailable {
                frame: index,
                expected: layout.frame_count,
                delivered,
            }.into());
        }

        let frame = PcmFrame {
            index,
            samples: window.clone(),
        };
        if tx.send(frame).is_err() {
            // Consumer stopped early and reports its own error
            return Ok(());
        }
    }

    Ok(())
}

/// Read until `buf` is full or the reader is exhausted
fn read_full(reader: &mut dyn PcmReader, buf: &mut [f32]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let read = reader.read(&mut buf[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}
