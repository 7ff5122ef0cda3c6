use crate::{error::Result, features::{FeatureKind, FeatureVector}};

/// Core trait that every per-frame feature extractor implements
///
/// The pipeline pushes frames through an extractor strictly in frame order, one call to
/// [`consume`](FeatureExtractor::consume) per frame. Extractors may keep state between
/// frames; [`reset`](FeatureExtractor::reset) is called once before the first frame of a run.
pub trait FeatureExtractor: Send {
    /// The kind of vectors this extractor produces
    fn kind(&self) -> FeatureKind;

    /// Forget any state carried over from a previous run
    fn reset(&mut self) {}

    /// Compute the feature vector of one PCM frame
    ///
    /// # Arguments
    ///
    /// * `frame` - Mono samples of exactly one analysis frame (zero-padded at the end of the signal)
    ///
    /// # Returns
    ///
    /// A vector whose length matches [`FeatureKind::vector_len`] for the run's configuration.
    fn consume(&mut self, frame: &[f32]) -> Result<FeatureVector>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        frames: usize,
    }

    impl FeatureExtractor for Counter {
        fn kind(&self) -> FeatureKind {
            FeatureKind::Autocorrelation
        }

        fn reset(&mut self) {
            self.frames = 0;
        }

        fn consume(&mut self, _frame: &[f32]) -> Result<FeatureVector> {
            self.frames += 1;
            Ok(vec![self.frames as f32])
        }
    }

    #[test]
    fn test_reset_clears_state() {
        let mut extractor = Counter { frames: 0 };
        extractor.consume(&[0.0; 4]).unwrap();
        extractor.consume(&[0.0; 4]).unwrap();
        extractor.reset();
        assert_eq!(extractor.consume(&[0.0; 4]).unwrap(), vec![1.0]);
    }
}
