use crate::error::Result;
use crate::features::{FeatureExtractor, FeatureKind, FeatureVector};

/// Biased autocorrelation `r[l] = sum(x[n] * x[n + l]) / N` for lags `0..lags`
///
/// Only lag 0 (the frame energy) takes part in the distance; the remaining lags are kept
/// for callers that read features back out of a session.
pub struct AutocorrelationExtractor {
    lags: usize,
}

impl AutocorrelationExtractor {
    pub fn new(lags: usize) -> Self {
        Self { lags: lags.max(1) }
    }
}

impl FeatureExtractor for AutocorrelationExtractor {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Autocorrelation
    }

    fn consume(&mut self, frame: &[f32]) -> Result<FeatureVector> {
        let n = frame.len();
        if n == 0 {
            return Ok(vec![0.0; self.lags]);
        }

        Ok((0..self.lags)
            .map(|lag| {
                if lag >= n {
                    return 0.0;
                }
                frame[..n - lag]
                    .iter()
                    .zip(&frame[lag..])
                    .map(|(&a, &b)| a * b)
                    .sum::<f32>()
                    / n as f32
            })
            .collect())
    }
}
