//! # Feature Extraction
//!
//! Per-frame acoustic descriptors that feed the self-similarity matrix.
//!
//! Every extractor belongs to one [`FeatureKind`]. The kind is a closed set: it fixes the
//! vector length an extractor must produce and the distance used to compare two frames.
//!
//! | Kind | Vector | Distance |
//! |------|--------|----------|
//! | MFCC | `mfcc_coefficients` cepstral coefficients | Euclidean, coefficient 0 skipped |
//! | CQT | magnitudes of `cqt_bins` bins per octave over the filter band | Euclidean, bin 0 skipped |
//! | Autocorrelation | `autocorrelation_lags` lags | `sqrt(|a[0] - b[0]|)` |
//!
//! Built-in extractors live in [`mfcc`], [`cqt`] and [`autocorrelation`]. Custom DSP can
//! replace any of them through the [`ExtractorRegistry`].

pub mod autocorrelation;
pub mod cqt;
pub mod mfcc;
pub mod registry;
pub mod traits;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{config::FeatureConfig, error::ConfigError};

pub use autocorrelation::AutocorrelationExtractor;
pub use cqt::CqtExtractor;
pub use mfcc::MfccExtractor;
pub use registry::{ExtractorContext, ExtractorRegistry};
pub use traits::FeatureExtractor;

/// One extractor's output for one frame
pub type FeatureVector = Vec<f32>;

/// The kinds of features the segmenter knows how to compare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    /// Mel-frequency cepstral coefficients
    Mfcc,

    /// Constant-Q transform magnitudes
    Cqt,

    /// Autocorrelation of the frame
    Autocorrelation,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 3] = [FeatureKind::Mfcc, FeatureKind::Cqt, FeatureKind::Autocorrelation];

    pub fn label(&self) -> &'static str {
        match self {
            FeatureKind::Mfcc => "mfcc",
            FeatureKind::Cqt => "cqt",
            FeatureKind::Autocorrelation => "autocorrelation",
        }
    }

    /// Length every vector of this kind must have for the given parameters
    pub fn vector_len(&self, config: &FeatureConfig, sample_rate: f32) -> usize {
        match self {
            FeatureKind::Mfcc => config.mfcc_coefficients,
            FeatureKind::Cqt => cqt::bin_count(
                config.lower_filter_freq,
                config.upper_filter_freq,
                config.cqt_bins,
                sample_rate,
            ),
            FeatureKind::Autocorrelation => config.autocorrelation_lags,
        }
    }

    /// Distance between two vectors of this kind
    ///
    /// The first coefficient of spectral features is a level/bias term and is left out.
    /// Autocorrelation is compared on its lag-0 value only.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            FeatureKind::Mfcc | FeatureKind::Cqt => a
                .iter()
                .zip(b.iter())
                .skip(1)
                .map(|(&x, &y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
            FeatureKind::Autocorrelation => match (a.first(), b.first()) {
                (Some(&x), Some(&y)) => (x - y).abs().sqrt(),
                _ => 0.0,
            },
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FeatureKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mfcc" => Ok(FeatureKind::Mfcc),
            "cqt" | "constant-q" | "constantq" => Ok(FeatureKind::Cqt),
            "autocorrelation" | "ac" => Ok(FeatureKind::Autocorrelation),
            other => Err(ConfigError::invalid("features.enabled", other)),
        }
    }
}
