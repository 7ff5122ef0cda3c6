use crate::error::{AudioError, ConfigError, Result};

/// Number of analysis frames for a signal of `total_frames` mono samples
///
/// `ceil((total - frame_size) / (frame_size - overlap + 1)) + 1`. Every frame starts inside
/// the signal; the last one may run past its end and is zero-padded.
pub fn frame_count(total_frames: usize, frame_size: usize, overlap: usize) -> Result<usize> {
    if frame_size == 0 {
        return Err(ConfigError::invalid("frame_size", frame_size).into());
    }
    if overlap >= frame_size {
        return Err(ConfigError::invalid("overlap", format!("{} >= frame_size {}", overlap, frame_size)).into());
    }
    if total_frames < frame_size {
        return Err(AudioError::SourceUnavailable {
            frame: 0,
            expected: 1,
            delivered: total_frames,
        }.into());
    }

    Ok((total_frames - frame_size).div_ceil(frame_size - overlap + 1) + 1)
}

/// How a signal is cut into frames for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub frame_size: usize,
    pub overlap: usize,
    pub total_frames: usize,
    pub frame_count: usize,
}

impl FrameLayout {
    pub fn new(total_frames: usize, frame_size: usize, overlap: usize) -> Result<Self> {
        let frame_count = frame_count(total_frames, frame_size, overlap)?;
        Ok(Self {
            frame_size,
            overlap,
            total_frames,
            frame_count,
        })
    }

    /// Samples between the starts of consecutive frames
    ///
    /// `frame_size - overlap + 1`, the same divisor the frame count uses, so the frames
    /// reach the end of the signal. With no overlap it is capped at `frame_size` so that
    /// no sample falls between two frames.
    pub fn hop(&self) -> usize {
        (self.frame_size - self.overlap + 1).min(self.frame_size)
    }

    /// First sample of frame `index`
    pub fn frame_start(&self, index: usize) -> usize {
        index * self.hop()
    }
}

/// Maps frame indices to seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    /// Seconds between the starts of consecutive frames
    pub hop_secs: f64,
    /// Length of the recording in seconds
    pub duration: f64,
}

impl FrameClock {
    pub fn new(layout: &FrameLayout, sample_rate: u32, duration: f64) -> Self {
        let hop_secs = if sample_rate == 0 {
            0.0
        } else {
            layout.hop() as f64 / sample_rate as f64
        };
        Self { hop_secs, duration }
    }

    /// `frame_count` frames spread evenly over `duration`
    pub fn uniform(frame_count: usize, duration: f64) -> Self {
        let hop_secs = if frame_count == 0 {
            0.0
        } else {
            duration / frame_count as f64
        };
        Self { hop_secs, duration }
    }

    /// Start of frame `index` in seconds, never past the end of the recording
    pub fn time(&self, index: usize) -> f64 {
        (index as f64 * self.hop_secs).min(self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SegmenterError;

    #[test]
    fn test_frame_count_formula() {
        assert_eq!(frame_count(4096, 4096, 1024).unwrap(), 1);
        assert_eq!(frame_count(10, 4, 0).unwrap(), 3);
        // (44100 - 4096) / 3073 = 13.02 -> 14, + 1
        assert_eq!(frame_count(44100, 4096, 1024).unwrap(), 15);
    }

    #[test]
    fn test_frames_start_inside_signal() {
        for (total, size, overlap) in [(10, 4, 0), (44100, 4096, 1024), (5000, 1024, 1023), (9999, 512, 0)] {
            let layout = FrameLayout::new(total, size, overlap).unwrap();
            assert!(layout.frame_count >= 1);
            assert!(layout.frame_start(layout.frame_count - 1) < total);
        }
    }

    #[test]
    fn test_short_source_is_unavailable() {
        let err = frame_count(100, 4096, 1024).unwrap_err();
        assert!(matches!(err, SegmenterError::Audio(AudioError::SourceUnavailable { delivered: 100, .. })));
    }

    #[test]
    fn test_invalid_geometry_is_config_error() {
        assert!(matches!(frame_count(10_000, 0, 0), Err(SegmenterError::Config(_))));
        assert!(matches!(frame_count(10_000, 1024, 1024), Err(SegmenterError::Config(_))));
    }

    #[test]
    fn test_hop_matches_count_divisor() {
        assert_eq!(FrameLayout::new(1000, 20, 18).unwrap().hop(), 3);
        assert_eq!(FrameLayout::new(44100, 4096, 1024).unwrap().hop(), 3073);
        // No overlap: back to back
        assert_eq!(FrameLayout::new(1000, 100, 0).unwrap().hop(), 100);
    }

    #[test]
    fn test_overlapping_frames_reach_the_end() {
        for (total, size, overlap) in [(1000, 20, 18), (44100, 4096, 1024), (5000, 1024, 1023), (7001, 300, 1)] {
            let layout = FrameLayout::new(total, size, overlap).unwrap();
            let last = layout.frame_start(layout.frame_count - 1);
            assert!(last + size >= total, "{}/{}/{} stops at {}", total, size, overlap, last + size);
        }
    }

    #[test]
    fn test_frame_clock_follows_frame_starts() {
        let layout = FrameLayout::new(1000, 20, 18).unwrap();
        let clock = FrameClock::new(&layout, 100, 10.0);
        assert!((clock.time(130) - 3.9).abs() < 1e-9);
        assert_eq!(clock.time(400), 10.0);

        let uniform = FrameClock::uniform(10, 20.0);
        assert_eq!(uniform.time(5), 10.0);
        assert_eq!(FrameClock::uniform(0, 20.0).time(3), 0.0);
    }
}
