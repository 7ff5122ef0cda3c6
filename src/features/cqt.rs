use rustfft::num_complex::Complex;

use crate::error::{AudioError, ConfigError, Result};
use crate::features::{FeatureExtractor, FeatureKind, FeatureVector};

/// Number of Constant-Q bins between `lower` and `upper` at `bins_per_octave`
///
/// The band is clamped to the Nyquist frequency, so every bin centre stays below it.
/// Returns 0 for an empty or invalid band.
pub fn bin_count(lower: f32, upper: f32, bins_per_octave: usize, sample_rate: f32) -> usize {
    let upper = upper.min(sample_rate / 2.0);
    if bins_per_octave == 0 || !(lower > 0.0) || !(upper > lower) {
        return 0;
    }
    (bins_per_octave as f32 * (upper / lower).log2()).ceil() as usize
}

/// One bin's analysis kernel, centred in the frame
struct CqtKernel {
    offset: usize,
    coefficients: Vec<Complex<f32>>,
}

/// Constant-Q magnitude extractor
///
/// Each bin correlates the frame with a Hann-windowed complex sinusoid whose length is
/// `Q * sample_rate / f`, capped at the frame size.
pub struct CqtExtractor {
    kernels: Vec<CqtKernel>,
}

impl CqtExtractor {
    pub fn new(
        frame_size: usize,
        sample_rate: f32,
        lower_filter_freq: f32,
        upper_filter_freq: f32,
        bins_per_octave: usize,
    ) -> Result<Self> {
        if !(sample_rate > 0.0) {
            return Err(AudioError::InvalidParameters {
                details: format!("sample rate {} Hz", sample_rate),
            }.into());
        }

        let bins = bin_count(lower_filter_freq, upper_filter_freq, bins_per_octave, sample_rate);
        if bins == 0 || frame_size == 0 {
            return Err(ConfigError::invalid(
                "features.cqt_bins",
                format!(
                    "{} bins/octave over {}-{} Hz at {} Hz",
                    bins_per_octave, lower_filter_freq, upper_filter_freq, sample_rate
                ),
            ).into());
        }

        let q = 1.0 / (2f32.powf(1.0 / bins_per_octave as f32) - 1.0);
        let kernels = (0..bins)
            .map(|k| {
                let freq = lower_filter_freq * 2f32.powf(k as f32 / bins_per_octave as f32);
                let len = ((q * sample_rate / freq).ceil() as usize).clamp(1, frame_size);
                build_kernel(len, frame_size, q)
            })
            .collect();

        Ok(Self { kernels })
    }

    pub fn bins(&self) -> usize {
        self.kernels.len()
    }
}

fn build_kernel(len: usize, frame_size: usize, q: f32) -> CqtKernel {
    let two_pi = 2.0 * std::f32::consts::PI;
    let coefficients = (0..len)
        .map(|n| {
            let hann = if len > 1 {
                0.5 - 0.5 * (two_pi * n as f32 / (len - 1) as f32).cos()
            } else {
                1.0
            };
            let phase = -two_pi * q * n as f32 / len as f32;
            Complex::new(phase.cos(), phase.sin()) * (hann / len as f32)
        })
        .collect();

    CqtKernel {
        offset: (frame_size - len) / 2,
        coefficients,
    }
}

impl FeatureExtractor for CqtExtractor {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Cqt
    }

    fn consume(&mut self, frame: &[f32]) -> Result<FeatureVector> {
        let magnitudes = self
            .kernels
            .iter()
            .map(|kernel| {
                let samples = frame.iter().skip(kernel.offset);
                let acc: Complex<f32> = kernel
                    .coefficients
                    .iter()
                    .zip(samples)
                    .map(|(c, &x)| c * x)
                    .sum();
                acc.norm()
            })
            .collect();

        Ok(magnitudes)
    }
}
