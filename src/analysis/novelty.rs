use rayon::prelude::*;
use serde::Serialize;

use crate::analysis::{SegmentationLevel, SimilarityMatrix};

/// Novelty signal of one level, one value per frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoveltyCurve {
    pub level: SegmentationLevel,
    /// Kernel half-width in frames
    pub half_width: usize,
    pub values: Vec<f32>,
}

impl NoveltyCurve {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mean and population standard deviation of the curve
    pub fn mean_std(&self) -> (f32, f32) {
        if self.values.is_empty() {
            return (0.0, 0.0);
        }
        let n = self.values.len() as f32;
        let mean = self.values.iter().sum::<f32>() / n;
        let var = self.values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
        (mean, var.sqrt())
    }
}

/// Convert a kernel half-width in seconds to frames
///
/// `round(secs / hop_secs)`, clamped to `[1, max(1, frame_count / 2)]`.
pub fn half_width_frames(secs: f64, frame_count: usize, hop_secs: f64) -> usize {
    let upper = (frame_count / 2).max(1);
    if !(hop_secs > 0.0) {
        return 1;
    }
    let frames = (secs / hop_secs).round();
    (frames.max(1.0) as usize).min(upper)
}

/// Checkerboard kernel of half-width `L`, covering offsets `[-L, L)` on both axes
///
/// Cells where both offsets have the same sign compare frames on the same side of the
/// centre (within); the others compare across it. Weights are positive magnitudes; the
/// sign is applied by the quadrant.
#[derive(Debug, Clone)]
pub struct CheckerboardKernel {
    half_width: usize,
    /// `2L x 2L`, row-major, indexed by `(a + L, b + L)`
    weights: Vec<f32>,
}

impl CheckerboardKernel {
    pub fn new(half_width: usize, gaussian_taper: bool) -> Self {
        let half_width = half_width.max(1);
        let side = 2 * half_width;
        let sigma = 0.5 * half_width as f32;

        let weights = (0..side * side)
            .map(|cell| {
                if !gaussian_taper {
                    return 1.0;
                }
                // Cell centres sit at half-integer offsets from the diagonal point
                let a = (cell / side) as f32 - half_width as f32 + 0.5;
                let b = (cell % side) as f32 - half_width as f32 + 0.5;
                (-(a * a + b * b) / (2.0 * sigma * sigma)).exp()
            })
            .collect();

        Self { half_width, weights }
    }

    pub fn half_width(&self) -> usize {
        self.half_width
    }

    /// Novelty at diagonal frame `t`, over in-bounds cells only
    pub fn correlate(&self, matrix: &SimilarityMatrix, t: usize) -> f32 {
        let n = matrix.size() as isize;
        let l = self.half_width as isize;
        let side = 2 * self.half_width;
        let t = t as isize;

        let (mut within, mut within_w) = (0.0f64, 0.0f64);
        let (mut cross, mut cross_w) = (0.0f64, 0.0f64);

        for a in -l..l {
            let i = t + a;
            if i < 0 || i >= n {
                continue;
            }
            for b in -l..l {
                let j = t + b;
                if j < 0 || j >= n {
                    continue;
                }
                let w = self.weights[(a + l) as usize * side + (b + l) as usize] as f64;
                let s = matrix.at(i as usize, j as usize) as f64;
                if (a < 0) == (b < 0) {
                    within += w * s;
                    within_w += w;
                } else {
                    cross += w * s;
                    cross_w += w;
                }
            }
        }

        if within_w <= 0.0 || cross_w <= 0.0 {
            return 0.0;
        }
        ((within / within_w - cross / cross_w) / matrix.max_scale() as f64) as f32
    }

    /// Correlate along the whole diagonal
    pub fn curve(&self, matrix: &SimilarityMatrix, level: SegmentationLevel) -> NoveltyCurve {
        let values = (0..matrix.size())
            .into_par_iter()
            .map(|t| self.correlate(matrix, t))
            .collect();

        NoveltyCurve {
            level,
            half_width: self.half_width,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two homogeneous blocks meeting at `split`
    fn two_blocks(size: usize, split: usize) -> SimilarityMatrix {
        SimilarityMatrix::from_fn(size, 1000.0, |i, j| {
            if (i < split) == (j < split) { 1000.0 } else { 0.0 }
        })
    }

    #[test]
    fn test_half_width_conversion() {
        // 2 frames per second
        assert_eq!(half_width_frames(16.0, 100, 0.5), 32);
        assert_eq!(half_width_frames(40.0, 100, 0.5), 50);
        assert_eq!(half_width_frames(0.1, 100, 0.5), 1);
        assert_eq!(half_width_frames(16.0, 1, 0.5), 1);
        assert_eq!(half_width_frames(16.0, 100, 0.0), 1);
    }

    #[test]
    fn test_peak_at_block_change() {
        let matrix = two_blocks(40, 20);
        for taper in [false, true] {
            let curve = CheckerboardKernel::new(4, taper).curve(&matrix, SegmentationLevel::Meso);
            let peak = curve
                .values
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap();
            assert_eq!(peak, 20);
            assert!((curve.values[20] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_homogeneous_matrix_has_no_novelty() {
        let matrix = SimilarityMatrix::from_fn(30, 1000.0, |_, _| 1000.0);
        let curve = CheckerboardKernel::new(5, true).curve(&matrix, SegmentationLevel::Macro);
        assert!(curve.values.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn test_first_frame_is_zero_and_values_bounded() {
        let matrix = SimilarityMatrix::from_fn(25, 1000.0, |i, j| ((i * 31 + j * 17) % 1000) as f32);
        let curve = CheckerboardKernel::new(6, true).curve(&matrix, SegmentationLevel::Micro);
        assert_eq!(curve.values[0], 0.0);
        assert!(curve.values.iter().all(|v| (-1.0..=1.0).contains(v)));
        assert_eq!(curve.len(), 25);
    }

    #[test]
    fn test_mean_std() {
        let curve = NoveltyCurve {
            level: SegmentationLevel::Macro,
            half_width: 1,
            values: vec![1.0, 3.0, 1.0, 3.0],
        };
        assert_eq!(curve.mean_std(), (2.0, 1.0));
    }
}
