use std::collections::HashMap;

use crate::{
    config::{AnalysisConfig, FeatureConfig},
    error::Result,
    features::{AutocorrelationExtractor, CqtExtractor, FeatureExtractor, FeatureKind, MfccExtractor},
};

/// Everything a factory needs to build an extractor for one run
#[derive(Debug, Clone, Copy)]
pub struct ExtractorContext<'a> {
    pub features: &'a FeatureConfig,
    pub frame_size: usize,
    pub sample_rate: f32,
}

type ExtractorFactory = Box<dyn Fn(&ExtractorContext<'_>) -> Result<Box<dyn FeatureExtractor>> + Send + Sync>;

/// Registry of extractor factories, one per feature kind
///
/// The registry starts out with the built-in MFCC, Constant-Q and autocorrelation
/// extractors. Registering a factory for a kind replaces the built-in one, which is how
/// callers plug in their own DSP.
pub struct ExtractorRegistry {
    factories: HashMap<FeatureKind, ExtractorFactory>,
}

impl ExtractorRegistry {
    /// Create a new registry with all built-in extractors
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };

        registry.register_builtin_extractors();
        registry
    }

    fn register_builtin_extractors(&mut self) {
        self.register(FeatureKind::Mfcc, |ctx| {
            let extractor = MfccExtractor::new(
                ctx.frame_size,
                ctx.sample_rate,
                ctx.features.mel_filters,
                ctx.features.mfcc_coefficients,
                ctx.features.lower_filter_freq,
                ctx.features.upper_filter_freq,
            )?;
            Ok(Box::new(extractor))
        });

        self.register(FeatureKind::Cqt, |ctx| {
            let extractor = CqtExtractor::new(
                ctx.frame_size,
                ctx.sample_rate,
                ctx.features.lower_filter_freq,
                ctx.features.upper_filter_freq,
                ctx.features.cqt_bins,
            )?;
            Ok(Box::new(extractor))
        });

        self.register(FeatureKind::Autocorrelation, |ctx| {
            Ok(Box::new(AutocorrelationExtractor::new(ctx.features.autocorrelation_lags)))
        });
    }

    /// Register (or replace) the factory for a feature kind
    pub fn register<F>(&mut self, kind: FeatureKind, factory: F)
    where
        F: Fn(&ExtractorContext<'_>) -> Result<Box<dyn FeatureExtractor>> + Send + Sync + 'static,
    {
        self.factories.insert(kind, Box::new(factory));
    }

    /// Check if a factory is available for the kind
    pub fn has_extractor(&self, kind: FeatureKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Build the enabled extractors, in enabled order, each freshly reset
    pub fn build_enabled(&self, config: &AnalysisConfig, sample_rate: f32) -> Result<Vec<Box<dyn FeatureExtractor>>> {
        let ctx = ExtractorContext {
            features: &config.features,
            frame_size: config.frame_size,
            sample_rate,
        };

        config
            .features
            .enabled
            .iter()
            .map(|&kind| {
                let factory = self.factories.get(&kind).ok_or_else(|| {
                    crate::error::AnalysisError::invalid_request(format!("no extractor registered for {}", kind))
                })?;
                let mut extractor = factory(&ctx)?;
                extractor.reset();
                Ok(extractor)
            })
            .collect()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
