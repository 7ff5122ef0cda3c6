use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// Raw audio data with metadata
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Audio samples (interleaved for stereo, mono for single channel)
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Duration in seconds
    pub duration: f64,

    /// Original file path
    pub file_path: PathBuf,

    /// Audio format information
    pub format: AudioFormat,
}

impl AudioData {
    /// Wrap mono samples that did not come from a file (synthetic signals, tests)
    pub fn from_mono<S: Into<String>>(samples: Vec<f32>, sample_rate: u32, name: S) -> Self {
        let duration = if sample_rate > 0 {
            samples.len() as f64 / sample_rate as f64
        } else {
            0.0
        };

        Self {
            samples,
            sample_rate,
            channels: 1,
            duration,
            file_path: PathBuf::from(name.into()),
            format: AudioFormat {
                extension: "pcm".to_string(),
                bit_depth: Some(32),
                compression: None,
                bitrate: None,
            },
        }
    }

    /// Number of sample frames (one sample per channel)
    pub fn frame_len(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Get mono mix of all channels
    pub fn mono_samples(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        self.samples
            .chunks(self.channels as usize)
            .map(|chunk| chunk.iter().sum::<f32>() / self.channels as f32)
            .collect()
    }
}

/// Audio file format information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFormat {
    /// File extension (wav, mp3, flac, etc.)
    pub extension: String,

    /// Bit depth (16, 24, 32, etc.)
    pub bit_depth: Option<u16>,

    /// Compression type (if any)
    pub compression: Option<String>,

    /// Bitrate for compressed formats
    pub bitrate: Option<u32>,
}

/// Sample layout a source decodes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: Option<u16>,
}

/// Sequential reader of mono PCM samples
pub trait PcmReader: Send {
    /// Fill `buf` with the next samples and return how many were written
    ///
    /// Returns 0 once the source is exhausted.
    fn read(&mut self, buf: &mut [f32]) -> Result<usize>;
}

/// Anything the pipeline can pull PCM frames from
pub trait AudioSource: Send + Sync {
    /// Stable identity; together with length and format it decides whether extracted
    /// features can be reused
    fn source_id(&self) -> String;

    fn format(&self) -> PcmFormat;

    /// Length of the signal in mono sample frames
    fn total_frames(&self) -> usize;

    /// Open a fresh reader positioned at the first sample
    fn reader(&self) -> Result<Box<dyn PcmReader + '_>>;

    fn duration_secs(&self) -> f64 {
        let rate = self.format().sample_rate;
        if rate == 0 {
            0.0
        } else {
            self.total_frames() as f64 / rate as f64
        }
    }
}

impl AudioSource for AudioData {
    fn source_id(&self) -> String {
        self.file_path.display().to_string()
    }

    fn format(&self) -> PcmFormat {
        PcmFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bit_depth: self.format.bit_depth,
        }
    }

    fn total_frames(&self) -> usize {
        self.frame_len()
    }

    fn reader(&self) -> Result<Box<dyn PcmReader + '_>> {
        Ok(Box::new(MonoMixReader::new(&self.samples, self.channels as usize)))
    }

    fn duration_secs(&self) -> f64 {
        self.duration
    }
}

/// Reads interleaved samples as a mono mix, without copying the whole signal
pub struct MonoMixReader<'a> {
    samples: &'a [f32],
    channels: usize,
    position: usize,
}

impl<'a> MonoMixReader<'a> {
    pub fn new(samples: &'a [f32], channels: usize) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            position: 0,
        }
    }
}

impl PcmReader for MonoMixReader<'_> {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        let frames = self.samples.chunks_exact(self.channels).skip(self.position);
        let mut written = 0;

        for (slot, chunk) in buf.iter_mut().zip(frames) {
            *slot = if self.channels == 1 {
                chunk[0]
            } else {
                chunk.iter().sum::<f32>() / self.channels as f32
            };
            written += 1;
        }

        self.position += written;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo() -> AudioData {
        AudioData {
            samples: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], // L, R, L, R, L, R
            sample_rate: 44100,
            channels: 2,
            duration: 3.0 / 44100.0,
            file_path: PathBuf::from("test.wav"),
            format: AudioFormat {
                extension: "wav".to_string(),
                bit_depth: Some(16),
                compression: None,
                bitrate: None,
            },
        }
    }

    #[test]
    fn test_audio_data_mono_conversion() {
        let mono = stereo().mono_samples();
        assert_eq!(mono, vec![1.5, 3.5, 5.5]); // Average of L and R channels
    }

    #[test]
    fn test_source_reports_mono_frames() {
        let audio = stereo();
        assert_eq!(audio.total_frames(), 3);
        assert_eq!(audio.format().channels, 2);
        assert_eq!(audio.source_id(), "test.wav");
    }

    #[test]
    fn test_reader_mixes_in_chunks() {
        let audio = stereo();
        let mut reader = audio.reader().unwrap();
        let mut buf = [0.0; 2];

        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1.5, 3.5]);
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 5.5);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_from_mono_duration() {
        let audio = AudioData::from_mono(vec![0.0; 22050], 44100, "synthetic");
        assert_eq!(audio.duration_secs(), 0.5);
    }
}
