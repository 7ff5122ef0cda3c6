use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use crate::error::{AnalysisError, AudioError, ConfigError, Result};
use crate::features::{FeatureExtractor, FeatureKind, FeatureVector};

/// Floor applied to mel energies before taking the logarithm
const LOG_FLOOR: f32 = 1e-10;

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular filter stored as a run of non-zero weights starting at `start_bin`
#[derive(Debug, Clone)]
struct MelFilter {
    start_bin: usize,
    weights: Vec<f32>,
}

/// MFCC extractor: Hamming window, real FFT, mel filterbank, log, DCT-II
pub struct MfccExtractor {
    coefficients: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    window: Vec<f32>,
    filterbank: Vec<MelFilter>,
    log_energies: Vec<f32>,
    /// `coefficients x filters`, row-major
    dct: Vec<f32>,
}

impl MfccExtractor {
    /// Create an extractor for frames of `frame_size` samples
    ///
    /// The upper filter frequency is clamped to the Nyquist frequency.
    pub fn new(
        frame_size: usize,
        sample_rate: f32,
        mel_filters: usize,
        coefficients: usize,
        lower_filter_freq: f32,
        upper_filter_freq: f32,
    ) -> Result<Self> {
        if !(sample_rate > 0.0) {
            return Err(AudioError::InvalidParameters {
                details: format!("sample rate {} Hz", sample_rate),
            }.into());
        }

        let upper = upper_filter_freq.min(sample_rate / 2.0);
        if !(lower_filter_freq >= 0.0 && lower_filter_freq < upper) {
            return Err(ConfigError::invalid(
                "features.filter_band",
                format!("{}-{} at {} Hz", lower_filter_freq, upper, sample_rate),
            ).into());
        }

        if frame_size == 0 || mel_filters == 0 || coefficients == 0 || coefficients > mel_filters {
            return Err(ConfigError::invalid(
                "features.mfcc",
                format!("frame {} / filters {} / coefficients {}", frame_size, mel_filters, coefficients),
            ).into());
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(frame_size);

        let filterbank = build_mel_filterbank(mel_filters, frame_size, sample_rate, lower_filter_freq, upper);
        let dct = build_dct_table(coefficients, mel_filters);

        Ok(Self {
            coefficients,
            input: fft.make_input_vec(),
            spectrum: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            window: hamming_window(frame_size),
            log_energies: vec![0.0; mel_filters],
            filterbank,
            dct,
            fft,
        })
    }
}

impl FeatureExtractor for MfccExtractor {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Mfcc
    }

    fn consume(&mut self, frame: &[f32]) -> Result<FeatureVector> {
        for (i, (slot, &w)) in self.input.iter_mut().zip(self.window.iter()).enumerate() {
            *slot = frame.get(i).copied().unwrap_or(0.0) * w;
        }

        self.fft
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
            .map_err(|e| AnalysisError::ExtractionFailed {
                reason: format!("MFCC FFT failed: {}", e),
            })?;

        for (log_energy, filter) in self.log_energies.iter_mut().zip(self.filterbank.iter()) {
            let energy: f32 = filter
                .weights
                .iter()
                .zip(self.spectrum[filter.start_bin..].iter())
                .map(|(&w, c)| w * c.norm_sqr())
                .sum();
            *log_energy = energy.max(LOG_FLOOR).ln();
        }

        let filters = self.log_energies.len();
        let mfcc = (0..self.coefficients)
            .map(|k| {
                self.dct[k * filters..(k + 1) * filters]
                    .iter()
                    .zip(self.log_energies.iter())
                    .map(|(&c, &e)| c * e)
                    .sum()
            })
            .collect();

        Ok(mfcc)
    }
}

fn hamming_window(size: usize) -> Vec<f32> {
    if size == 1 {
        return vec![1.0];
    }
    (0..size)
        .map(|n| 0.54 - 0.46 * (2.0 * std::f32::consts::PI * n as f32 / (size - 1) as f32).cos())
        .collect()
}

/// Triangular filters evenly spaced on the mel scale between `low` and `high`
fn build_mel_filterbank(filters: usize, fft_size: usize, sample_rate: f32, low: f32, high: f32) -> Vec<MelFilter> {
    let bins = fft_size / 2 + 1;
    let mel_low = hz_to_mel(low);
    let mel_step = (hz_to_mel(high) - mel_low) / (filters + 1) as f32;
    let edges: Vec<f32> = (0..filters + 2)
        .map(|i| mel_to_hz(mel_low + i as f32 * mel_step))
        .collect();
    let bin_hz = sample_rate / fft_size as f32;

    edges
        .windows(3)
        .map(|edge| {
            let (left, center, right) = (edge[0], edge[1], edge[2]);
            let weights: Vec<(usize, f32)> = (0..bins)
                .filter_map(|k| {
                    let f = k as f32 * bin_hz;
                    let w = if f > left && f <= center {
                        (f - left) / (center - left)
                    } else if f > center && f < right {
                        (right - f) / (right - center)
                    } else {
                        0.0
                    };
                    (w > 0.0).then_some((k, w))
                })
                .collect();

            match weights.first() {
                Some(&(start_bin, _)) => MelFilter {
                    start_bin,
                    weights: weights.iter().map(|&(_, w)| w).collect(),
                },
                // Narrower than one FFT bin: contributes nothing
                None => MelFilter { start_bin: 0, weights: Vec::new() },
            }
        })
        .collect()
}

fn build_dct_table(coefficients: usize, filters: usize) -> Vec<f32> {
    let mut table = Vec::with_capacity(coefficients * filters);
    for k in 0..coefficients {
        for m in 0..filters {
            let angle = std::f32::consts::PI * k as f32 * (m as f32 + 0.5) / filters as f32;
            table.push(angle.cos());
        }
    }
    table
}
