use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::{
    config::AnalysisConfig,
    error::{AnalysisError, Result, SegmenterError},
    features::FeatureKind,
    pipeline::FeatureSet,
};

/// Blended, normalized pairwise similarity of all frames
///
/// Only the lower triangle (with diagonal) is stored; `get(i, j)` mirrors it. Entries lie in
/// `[0, max_scale]`, higher meaning more similar, and every diagonal entry is `max_scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    size: usize,
    max_scale: f32,
    /// Row `i` holds columns `0..=i`
    rows: Vec<Vec<f32>>,
    degenerate: Vec<FeatureKind>,
}

impl SimilarityMatrix {
    /// Build a matrix directly from a score function over the lower triangle
    ///
    /// Scores are clamped to `[0, max_scale]` and the diagonal is forced to `max_scale`.
    pub fn from_fn<F>(size: usize, max_scale: f32, score: F) -> Self
    where
        F: Fn(usize, usize) -> f32,
    {
        let rows = (0..size)
            .map(|i| {
                (0..=i)
                    .map(|j| if i == j { max_scale } else { score(i, j).clamp(0.0, max_scale) })
                    .collect()
            })
            .collect();

        Self {
            size,
            max_scale,
            rows,
            degenerate: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn max_scale(&self) -> f32 {
        self.max_scale
    }

    /// Kinds whose distances did not vary and therefore contributed nothing
    pub fn degenerate_kinds(&self) -> &[FeatureKind] {
        &self.degenerate
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        let (row, col) = if j <= i { (i, j) } else { (j, i) };
        self.rows.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Stored lower-triangular row `i` (columns `0..=i`)
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        self.rows.get(i).map(Vec::as_slice)
    }

    /// Unchecked-by-`Option` lookup for hot loops; panics outside the matrix
    pub(crate) fn at(&self, i: usize, j: usize) -> f32 {
        if j <= i {
            self.rows[i][j]
        } else {
            self.rows[j][i]
        }
    }
}

/// Turns per-kind feature sequences into one [`SimilarityMatrix`]
///
/// Pass one computes every lower-triangle distance per kind, rows in parallel, and reduces
/// each kind's min and max. Pass two maps each distance onto `[0, max_scale / kinds]` and
/// subtracts the sum from `max_scale`.
#[derive(Debug, Clone)]
pub struct SimilarityMatrixBuilder {
    max_scale: f32,
    strict: bool,
    threads: usize,
}

impl SimilarityMatrixBuilder {
    pub fn new(max_scale: f32) -> Self {
        Self {
            max_scale,
            strict: false,
            threads: 0,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.max_scale)
            .strict(config.runtime.strict_normalization)
            .threads(config.runtime.threads)
    }

    /// Fail with `DegenerateNormalization` instead of zeroing a kind that does not vary
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Dedicated worker count; 0 uses rayon's global pool
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn build(&self, features: &FeatureSet) -> Result<SimilarityMatrix> {
        if self.threads == 0 {
            return self.compute(features);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| SegmenterError::generic(format!("Failed to start similarity workers: {}", e)))?;
        pool.install(|| self.compute(features))
    }

    fn compute(&self, features: &FeatureSet) -> Result<SimilarityMatrix> {
        let started = Instant::now();
        let size = features.frame_count();
        let sequences = features.sequences();

        // Pass 1: raw distances and their range, per kind
        let distances: Vec<Vec<Vec<f32>>> = sequences
            .iter()
            .map(|sequence| {
                let vectors = &sequence.vectors;
                (0..size)
                    .into_par_iter()
                    .map(|i| {
                        (0..=i)
                            .map(|j| sequence.kind.distance(&vectors[i], &vectors[j]))
                            .collect()
                    })
                    .collect()
            })
            .collect();

        let mut ranges = Vec::with_capacity(sequences.len());
        let mut degenerate = Vec::new();

        for (sequence, rows) in sequences.iter().zip(&distances) {
            let (min, max) = distance_range(rows);
            let span = max - min;

            if !(span > 0.0) {
                if self.strict {
                    return Err(AnalysisError::DegenerateNormalization { kind: sequence.kind }.into());
                }
                warn!(
                    "{} distances do not vary (min = max = {}); the feature contributes nothing",
                    sequence.kind, min
                );
                degenerate.push(sequence.kind);
                ranges.push(None);
            } else {
                debug!("{} distance range [{}, {}]", sequence.kind, min, max);
                ranges.push(Some((min, span)));
            }
        }

        // Pass 2: blend
        let max_scale = self.max_scale;
        let coefficient = max_scale / sequences.len().max(1) as f32;

        let rows: Vec<Vec<f32>> = (0..size)
            .into_par_iter()
            .map(|i| {
                (0..=i)
                    .map(|j| {
                        if i == j {
                            return max_scale;
                        }
                        let penalty: f32 = distances
                            .iter()
                            .zip(&ranges)
                            .filter_map(|(rows, range)| {
                                range.map(|(min, span)| (rows[i][j] - min) / span * coefficient)
                            })
                            .sum();
                        (max_scale - penalty).max(0.0)
                    })
                    .collect()
            })
            .collect();

        debug!(
            "Similarity matrix {}x{} built from {} kind(s) in {:.2?}",
            size,
            size,
            sequences.len(),
            started.elapsed()
        );

        Ok(SimilarityMatrix {
            size,
            max_scale,
            rows,
            degenerate,
        })
    }
}

fn distance_range(rows: &[Vec<f32>]) -> (f32, f32) {
    rows.par_iter()
        .map(|row| {
            row.iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &d| (lo.min(d), hi.max(d)))
        })
        .reduce(
            || (f32::INFINITY, f32::NEG_INFINITY),
            |(a_lo, a_hi), (b_lo, b_hi)| (a_lo.min(b_lo), a_hi.max(b_hi)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SegmenterError;
    use crate::pipeline::FeatureSequence;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn random_features(kinds: &[FeatureKind], frames: usize, len: usize, seed: u64) -> FeatureSet {
        let mut rng = SmallRng::seed_from_u64(seed);
        let sequences = kinds
            .iter()
            .map(|&kind| FeatureSequence {
                kind,
                vectors: (0..frames)
                    .map(|_| (0..len).map(|_| rng.gen_range(-10.0..10.0)).collect())
                    .collect(),
            })
            .collect();
        FeatureSet::from_sequences(sequences).unwrap()
    }

    #[test]
    fn test_diagonal_and_range() {
        let features = random_features(&[FeatureKind::Mfcc, FeatureKind::Autocorrelation], 40, 6, 7);
        let matrix = SimilarityMatrixBuilder::new(1000.0).build(&features).unwrap();

        assert_eq!(matrix.size(), 40);
        for i in 0..40 {
            assert_eq!(matrix.get(i, i), Some(1000.0));
            for j in 0..=i {
                let v = matrix.get(i, j).unwrap();
                assert!((0.0..=1000.0).contains(&v), "entry ({}, {}) = {}", i, j, v);
                assert_eq!(matrix.get(j, i), Some(v));
            }
        }
        assert!(matrix.get(40, 0).is_none());
    }

    #[test]
    fn test_each_kind_contributes_at_most_half() {
        let features = random_features(&[FeatureKind::Mfcc, FeatureKind::Cqt], 30, 5, 11);
        let matrix = SimilarityMatrixBuilder::new(1000.0).build(&features).unwrap();

        let min = (0..30)
            .flat_map(|i| matrix.row(i).unwrap().to_vec())
            .fold(f32::INFINITY, f32::min);
        assert!(min >= 0.0);

        // With a single kind zeroed out, no entry can drop below the other half
        let mut single = features.sequences().to_vec();
        for v in single[1].vectors.iter_mut() {
            v.iter_mut().for_each(|x| *x = 0.0);
        }
        let half = SimilarityMatrixBuilder::new(1000.0)
            .build(&FeatureSet::from_sequences(single).unwrap())
            .unwrap();
        for i in 0..30 {
            for &v in half.row(i).unwrap() {
                assert!(v >= 500.0 - 1e-3);
            }
        }
        assert_eq!(half.degenerate_kinds(), &[FeatureKind::Cqt]);
    }

    #[test]
    fn test_identical_frames_take_the_degenerate_path() {
        let features = FeatureSet::from_sequences(vec![FeatureSequence {
            kind: FeatureKind::Mfcc,
            vectors: vec![vec![1.0, 2.0, 3.0, 4.0]; 10],
        }]).unwrap();

        let matrix = SimilarityMatrixBuilder::new(1000.0).build(&features).unwrap();
        for i in 0..10 {
            assert!(matrix.row(i).unwrap().iter().all(|&v| v == 1000.0));
        }
        assert_eq!(matrix.degenerate_kinds(), &[FeatureKind::Mfcc]);

        let strict = SimilarityMatrixBuilder::new(1000.0).strict(true).build(&features);
        assert!(matches!(
            strict,
            Err(SegmenterError::Analysis(AnalysisError::DegenerateNormalization { kind: FeatureKind::Mfcc }))
        ));
    }

    #[test]
    fn test_thread_count_does_not_change_result() {
        let features = random_features(&[FeatureKind::Mfcc, FeatureKind::Autocorrelation], 64, 8, 3);
        let global = SimilarityMatrixBuilder::new(1000.0).build(&features).unwrap();
        let single = SimilarityMatrixBuilder::new(1000.0).threads(1).build(&features).unwrap();
        let quad = SimilarityMatrixBuilder::new(1000.0).threads(4).build(&features).unwrap();

        assert_eq!(global, single);
        assert_eq!(global, quad);
    }

    #[test]
    fn test_most_distant_pair_scores_zero_for_single_kind() {
        let features = FeatureSet::from_sequences(vec![FeatureSequence {
            kind: FeatureKind::Mfcc,
            vectors: vec![vec![0.0, 0.0], vec![0.0, 3.0], vec![0.0, 1.0]],
        }]).unwrap();
        let matrix = SimilarityMatrixBuilder::new(100.0).build(&features).unwrap();

        assert_eq!(matrix.get(1, 0), Some(0.0));
        assert!((matrix.get(2, 0).unwrap() - 100.0 * 2.0 / 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_from_fn_clamps_and_fixes_diagonal() {
        let matrix = SimilarityMatrix::from_fn(3, 10.0, |_, _| 25.0);
        assert_eq!(matrix.get(0, 2), Some(10.0));
        let matrix = SimilarityMatrix::from_fn(3, 10.0, |_, _| -5.0);
        assert_eq!(matrix.get(1, 2), Some(0.0));
        assert_eq!(matrix.get(1, 1), Some(10.0));
    }
}
