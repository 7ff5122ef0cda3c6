use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::{
    analysis::SegmentationLevel,
    error::{ConfigError, Result},
    features::FeatureKind,
};

/// Default similarity ceiling; a frame compared with itself scores this value
pub const DEFAULT_MAX_SCALE: f32 = 1000.0;

/// Complete configuration for one analysis run
///
/// Extraction-relevant fields (`frame_size`, `overlap`, `max_scale` and the whole
/// [`FeatureConfig`]) decide whether a previous similarity matrix can be reused.
/// Everything under `levels` and `detection` only affects boundary detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Analysis frame length in samples
    pub frame_size: usize,

    /// Number of samples shared by consecutive frames
    pub overlap: usize,

    /// Similarity score given to identical frames
    pub max_scale: f32,

    /// Feature extractor selection and parameters
    pub features: FeatureConfig,

    /// Which segmentation levels to compute
    pub levels: LevelConfig,

    /// Novelty kernel and peak picking parameters
    pub detection: DetectionConfig,

    /// Execution settings
    pub runtime: RuntimeConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_size: 4096,
            overlap: 1024,
            max_scale: DEFAULT_MAX_SCALE,
            features: FeatureConfig::default(),
            levels: LevelConfig::default(),
            detection: DetectionConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// MFCC-only analysis with all levels enabled and the given filter band
    pub fn with_defaults(lower_filter_freq: f32, upper_filter_freq: f32) -> Self {
        Self {
            features: FeatureConfig {
                enabled: vec![FeatureKind::Mfcc],
                mfcc_coefficients: 40,
                mel_filters: 40,
                lower_filter_freq,
                upper_filter_freq,
                ..FeatureConfig::default()
            },
            ..Self::default()
        }
    }

    /// Coarse frames and a single feature: quick overview of long recordings
    pub fn fast() -> Self {
        Self {
            frame_size: 16384,
            overlap: 0,
            features: FeatureConfig {
                enabled: vec![FeatureKind::Mfcc],
                mfcc_coefficients: 20,
                mel_filters: 26,
                ..FeatureConfig::default()
            },
            ..Self::default()
        }
    }

    /// Small frames and all three features (slow, memory hungry on long files)
    pub fn high_resolution() -> Self {
        Self {
            frame_size: 2048,
            overlap: 1024,
            features: FeatureConfig {
                enabled: vec![FeatureKind::Mfcc, FeatureKind::Cqt, FeatureKind::Autocorrelation],
                ..FeatureConfig::default()
            },
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: AnalysisConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::invalid("config", e))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Whether `other` cuts and describes frames exactly like `self`, so extracted
    /// features can be reused
    pub fn same_extraction(&self, other: &AnalysisConfig) -> bool {
        self.frame_size == other.frame_size
            && self.overlap == other.overlap
            && self.features == other.features
    }

    /// Whether `other` can also reuse the similarity matrix built with `self`
    ///
    /// The strict flag is not compared here: a lenient matrix is only reusable by a strict
    /// run when no feature was degenerate, which depends on the matrix.
    pub fn same_matrix(&self, other: &AnalysisConfig) -> bool {
        self.same_extraction(other) && self.max_scale == other.max_scale
    }

    /// Larger frame size suggested for long recordings, if the current one is too small
    ///
    /// The matrix grows with the square of the frame count, so small frames on long files
    /// quickly exhaust memory.
    pub fn recommended_frame_size(&self, duration_secs: f64) -> Option<usize> {
        let minutes = duration_secs / 60.0;
        if self.frame_size <= 8192 && minutes > 16.0 {
            Some(16384)
        } else if self.frame_size <= 4096 && minutes > 12.0 {
            Some(8192)
        } else if self.frame_size <= 2048 && duration_secs > 360.0 {
            Some(4096)
        } else {
            None
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.frame_size == 0 {
            return Err(ConfigError::invalid("frame_size", self.frame_size).into());
        }

        if self.overlap >= self.frame_size {
            return Err(ConfigError::invalid(
                "overlap",
                format!("{} (must be smaller than frame_size {})", self.overlap, self.frame_size),
            ).into());
        }

        if !self.max_scale.is_finite() || self.max_scale <= 0.0 {
            return Err(ConfigError::invalid("max_scale", self.max_scale).into());
        }

        self.features.validate(self.frame_size)?;
        self.detection.validate()?;
        Ok(())
    }
}

/// Feature extractor selection and parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Enabled extractors, in the order frames are pushed through them
    pub enabled: Vec<FeatureKind>,

    /// Number of cepstral coefficients kept per frame
    pub mfcc_coefficients: usize,

    /// Number of triangular mel filters
    pub mel_filters: usize,

    /// Constant-Q bins per octave
    pub cqt_bins: usize,

    /// Lower edge of the analysed frequency band (Hz)
    pub lower_filter_freq: f32,

    /// Upper edge of the analysed frequency band (Hz)
    pub upper_filter_freq: f32,

    /// Number of autocorrelation lags; only lag 0 takes part in the distance
    pub autocorrelation_lags: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            enabled: vec![FeatureKind::Mfcc],
            mfcc_coefficients: 40,
            mel_filters: 40,
            cqt_bins: 12,
            lower_filter_freq: 50.0,
            upper_filter_freq: 8000.0,
            autocorrelation_lags: 1,
        }
    }
}

impl FeatureConfig {
    /// Whether the given extractor is enabled
    pub fn is_enabled(&self, kind: FeatureKind) -> bool {
        self.enabled.contains(&kind)
    }

    fn validate(&self, frame_size: usize) -> Result<()> {
        if self.enabled.is_empty() {
            return Err(ConfigError::invalid("features.enabled", "[] (at least one extractor is required)").into());
        }

        for (i, kind) in self.enabled.iter().enumerate() {
            if self.enabled[..i].contains(kind) {
                return Err(ConfigError::invalid("features.enabled", format!("{} listed twice", kind)).into());
            }
        }

        if !(self.lower_filter_freq >= 0.0 && self.lower_filter_freq < self.upper_filter_freq) {
            return Err(ConfigError::invalid(
                "features.filter_band",
                format!("{}-{}", self.lower_filter_freq, self.upper_filter_freq),
            ).into());
        }

        if self.is_enabled(FeatureKind::Mfcc) {
            if self.mel_filters == 0 {
                return Err(ConfigError::invalid("features.mel_filters", self.mel_filters).into());
            }
            if self.mfcc_coefficients == 0 || self.mfcc_coefficients > self.mel_filters {
                return Err(ConfigError::invalid(
                    "features.mfcc_coefficients",
                    format!("{} (must be between 1 and mel_filters {})", self.mfcc_coefficients, self.mel_filters),
                ).into());
            }
        }

        if self.is_enabled(FeatureKind::Cqt) {
            if self.cqt_bins == 0 {
                return Err(ConfigError::invalid("features.cqt_bins", self.cqt_bins).into());
            }
            if self.lower_filter_freq <= 0.0 {
                return Err(ConfigError::invalid("features.lower_filter_freq", self.lower_filter_freq).into());
            }
        }

        if self.is_enabled(FeatureKind::Autocorrelation)
            && (self.autocorrelation_lags == 0 || self.autocorrelation_lags >= frame_size)
        {
            return Err(ConfigError::invalid("features.autocorrelation_lags", self.autocorrelation_lags).into());
        }

        Ok(())
    }
}

/// Which segmentation levels are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    pub macro_enabled: bool,
    pub meso_enabled: bool,
    pub micro_enabled: bool,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self::all()
    }
}

impl LevelConfig {
    /// All three levels enabled
    pub fn all() -> Self {
        Self {
            macro_enabled: true,
            meso_enabled: true,
            micro_enabled: true,
        }
    }

    pub fn is_enabled(&self, level: SegmentationLevel) -> bool {
        match level {
            SegmentationLevel::Macro => self.macro_enabled,
            SegmentationLevel::Meso => self.meso_enabled,
            SegmentationLevel::Micro => self.micro_enabled,
        }
    }

    /// Coarsest enabled level
    pub fn first_enabled(&self) -> Option<SegmentationLevel> {
        SegmentationLevel::ALL.into_iter().find(|&level| self.is_enabled(level))
    }
}

/// Novelty kernel and peak picking parameters, one set per level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Checkerboard kernel half-width for the macro level (seconds)
    pub macro_kernel_secs: f64,

    /// Checkerboard kernel half-width for the meso level (seconds)
    pub meso_kernel_secs: f64,

    /// Checkerboard kernel half-width for the micro level (seconds)
    pub micro_kernel_secs: f64,

    /// Peaks must exceed `mean + k * std` of the macro curve
    pub macro_threshold: f32,

    /// Threshold multiplier for the meso curve
    pub meso_threshold: f32,

    /// Threshold multiplier for the micro curve
    pub micro_threshold: f32,

    /// Weight kernel cells with a radial Gaussian instead of a flat checkerboard
    pub gaussian_taper: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            macro_kernel_secs: 16.0,
            meso_kernel_secs: 6.0,
            micro_kernel_secs: 2.0,
            macro_threshold: 1.0,
            meso_threshold: 0.5,
            micro_threshold: 0.0,
            gaussian_taper: true,
        }
    }
}

impl DetectionConfig {
    /// Kernel half-width in seconds for a level
    pub fn kernel_secs(&self, level: SegmentationLevel) -> f64 {
        match level {
            SegmentationLevel::Macro => self.macro_kernel_secs,
            SegmentationLevel::Meso => self.meso_kernel_secs,
            SegmentationLevel::Micro => self.micro_kernel_secs,
        }
    }

    /// Threshold multiplier for a level
    pub fn threshold(&self, level: SegmentationLevel) -> f32 {
        match level {
            SegmentationLevel::Macro => self.macro_threshold,
            SegmentationLevel::Meso => self.meso_threshold,
            SegmentationLevel::Micro => self.micro_threshold,
        }
    }

    fn validate(&self) -> Result<()> {
        for level in SegmentationLevel::ALL {
            let secs = self.kernel_secs(level);
            if !(secs.is_finite() && secs > 0.0) {
                return Err(ConfigError::invalid(format!("detection.{}_kernel_secs", level), secs).into());
            }
            if !self.threshold(level).is_finite() {
                return Err(ConfigError::invalid(format!("detection.{}_threshold", level), self.threshold(level)).into());
            }
        }

        if self.macro_kernel_secs < self.meso_kernel_secs || self.meso_kernel_secs < self.micro_kernel_secs {
            return Err(ConfigError::invalid(
                "detection.kernel_secs",
                format!(
                    "{}/{}/{} (macro >= meso >= micro required)",
                    self.macro_kernel_secs, self.meso_kernel_secs, self.micro_kernel_secs
                ),
            ).into());
        }

        Ok(())
    }
}

/// Execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker threads for the similarity matrix (0 = rayon's global pool)
    pub threads: usize,

    /// Fail the run instead of zeroing a feature whose distances do not vary
    pub strict_normalization: bool,

    /// Replace the frame size with the recommended one for long recordings
    pub auto_frame_size: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            strict_normalization: false,
            auto_frame_size: false,
        }
    }
}

/// Read-only access to the configuration for the next run
pub trait ConfigProvider {
    /// Take a snapshot; the run works on this copy only
    fn snapshot(&self) -> Result<AnalysisConfig>;
}

impl ConfigProvider for AnalysisConfig {
    fn snapshot(&self) -> Result<AnalysisConfig> {
        Ok(self.clone())
    }
}

/// Provider that re-reads a TOML file on every snapshot
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for FileConfigProvider {
    fn snapshot(&self) -> Result<AnalysisConfig> {
        AnalysisConfig::from_file(&self.path)
    }
}
