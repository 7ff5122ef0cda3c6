use serde::Serialize;
use tracing::debug;

use crate::{
    analysis::{
        novelty::{half_width_frames, CheckerboardKernel, NoveltyCurve},
        SegmentationLevel, SimilarityMatrix,
    },
    config::{DetectionConfig, LevelConfig},
    pipeline::FrameClock,
};

/// A structural boundary at the start of a frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Boundary {
    pub frame: usize,
    /// Seconds from the start of the recording
    pub time: f64,
    /// Novelty value that selected the boundary
    pub strength: f32,
}

/// Interval between two consecutive boundaries (or the recording's ends)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub start_frame: usize,
    pub end_frame: usize,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Boundaries and segments of one level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelSegmentation {
    pub level: SegmentationLevel,
    /// Sorted by frame, never at frame 0 or at the end
    pub boundaries: Vec<Boundary>,
    pub segments: Vec<Segment>,
}

impl LevelSegmentation {
    fn new(level: SegmentationLevel, mut boundaries: Vec<Boundary>, frame_count: usize, clock: &FrameClock) -> Self {
        boundaries.sort_by_key(|b| b.frame);

        let mut edges = Vec::with_capacity(boundaries.len() + 2);
        edges.push(0);
        edges.extend(boundaries.iter().map(|b| b.frame));
        edges.push(frame_count);

        // The last segment runs to the end of the recording, past the last frame start
        let time = |frame: usize| if frame >= frame_count { clock.duration } else { clock.time(frame) };
        let segments = edges
            .windows(2)
            .map(|pair| Segment {
                start: time(pair[0]),
                end: time(pair[1]),
                start_frame: pair[0],
                end_frame: pair[1],
            })
            .collect();

        Self {
            level,
            boundaries,
            segments,
        }
    }

    pub fn boundary_frames(&self) -> Vec<usize> {
        self.boundaries.iter().map(|b| b.frame).collect()
    }
}

/// Three nested segmentation levels; a level is `None` when it was not computed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationResult {
    pub duration: f64,
    pub frame_count: usize,
    levels: [Option<LevelSegmentation>; 3],
}

impl SegmentationResult {
    pub fn level(&self, level: SegmentationLevel) -> Option<&LevelSegmentation> {
        self.levels[level.index()].as_ref()
    }

    pub fn macro_level(&self) -> Option<&LevelSegmentation> {
        self.level(SegmentationLevel::Macro)
    }

    pub fn meso_level(&self) -> Option<&LevelSegmentation> {
        self.level(SegmentationLevel::Meso)
    }

    pub fn micro_level(&self) -> Option<&LevelSegmentation> {
        self.level(SegmentationLevel::Micro)
    }

    /// Boundary frames of a level, empty when the level was not computed
    pub fn boundary_frames(&self, level: SegmentationLevel) -> Vec<usize> {
        self.level(level).map(LevelSegmentation::boundary_frames).unwrap_or_default()
    }

    pub fn computed_levels(&self) -> impl Iterator<Item = &LevelSegmentation> {
        self.levels.iter().flatten()
    }

    /// Every computed level's boundaries appear in every finer computed level
    pub fn is_nested(&self) -> bool {
        let computed: Vec<&LevelSegmentation> = self.computed_levels().collect();
        computed.windows(2).all(|pair| {
            let finer = pair[1].boundary_frames();
            pair[0].boundaries.iter().all(|b| finer.binary_search(&b.frame).is_ok())
        })
    }
}

/// Output of one detection pass: the segmentation and the curves behind it
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub result: SegmentationResult,
    pub curves: Vec<NoveltyCurve>,
}

impl Detection {
    pub fn curve(&self, level: SegmentationLevel) -> Option<&NoveltyCurve> {
        self.curves.iter().find(|c| c.level == level)
    }
}

/// Top-down boundary detection over the three levels
///
/// Each enabled level computes its own novelty curve, keeps every boundary of the nearest
/// coarser level, and adds peaks of its curve that stay at least a minimum gap away from
/// all boundaries already accepted and from both ends of the recording.
///
/// Levels coarser than the first enabled one are carried over from `previous` so that
/// refining only meso/micro keeps the existing macro structure.
pub struct StructureDetector<'a> {
    detection: &'a DetectionConfig,
    levels: LevelConfig,
}

impl<'a> StructureDetector<'a> {
    pub fn new(detection: &'a DetectionConfig, levels: LevelConfig) -> Self {
        Self { detection, levels }
    }

    pub fn detect(&self, matrix: &SimilarityMatrix, clock: &FrameClock, previous: Option<&Detection>) -> Detection {
        let frame_count = matrix.size();
        let first_enabled = self.levels.first_enabled();
        let previous = previous.filter(|p| p.result.frame_count == frame_count);

        let mut levels: [Option<LevelSegmentation>; 3] = [None, None, None];
        let mut curves = Vec::new();

        for level in SegmentationLevel::ALL {
            if self.levels.is_enabled(level) {
                let inherited = levels[..level.index()]
                    .iter()
                    .rev()
                    .flatten()
                    .next()
                    .map(|parent| parent.boundaries.clone())
                    .unwrap_or_default();

                let curve = self.novelty(matrix, clock, level);
                let boundaries = self.pick_boundaries(&curve, inherited, frame_count, clock);
                debug!("{} level: {} boundaries (half-width {} frames)", level, boundaries.len(), curve.half_width);

                levels[level.index()] = Some(LevelSegmentation::new(level, boundaries, frame_count, clock));
                curves.push(curve);
            } else if first_enabled.map_or(false, |first| level < first) {
                if let Some(previous) = previous {
                    levels[level.index()] = previous.result.level(level).cloned();
                    curves.extend(previous.curve(level).cloned());
                }
            }
        }

        Detection {
            result: SegmentationResult {
                duration: clock.duration,
                frame_count,
                levels,
            },
            curves,
        }
    }

    fn novelty(&self, matrix: &SimilarityMatrix, clock: &FrameClock, level: SegmentationLevel) -> NoveltyCurve {
        let half_width = half_width_frames(self.detection.kernel_secs(level), matrix.size(), clock.hop_secs);
        CheckerboardKernel::new(half_width, self.detection.gaussian_taper).curve(matrix, level)
    }

    fn pick_boundaries(
        &self,
        curve: &NoveltyCurve,
        inherited: Vec<Boundary>,
        frame_count: usize,
        clock: &FrameClock,
    ) -> Vec<Boundary> {
        let (mean, std) = curve.mean_std();
        let threshold = mean + self.detection.threshold(curve.level) * std;
        let radius = (curve.half_width / 2).max(1);

        let mut candidates = local_peaks(&curve.values, radius, threshold);
        // Strongest first; ties go to the earlier frame
        candidates.sort_by(|&a, &b| curve.values[b].total_cmp(&curve.values[a]).then(a.cmp(&b)));

        let mut accepted = inherited;
        for frame in candidates {
            let clear_of_ends = frame >= radius && frame_count - frame >= radius;
            let clear_of_boundaries = accepted.iter().all(|b| b.frame.abs_diff(frame) >= radius);
            if clear_of_ends && clear_of_boundaries {
                accepted.push(Boundary {
                    frame,
                    time: clock.time(frame),
                    strength: curve.values[frame],
                });
            }
        }

        accepted
    }
}

/// Frames that rise strictly from the previous frame, are the maximum within `radius`,
/// are positive, and reach `threshold`
fn local_peaks(values: &[f32], radius: usize, threshold: f32) -> Vec<usize> {
    (1..values.len())
        .filter(|&t| {
            let v = values[t];
            if !(v > 0.0 && v >= threshold && v > values[t - 1]) {
                return false;
            }
            let lo = t.saturating_sub(radius);
            let hi = (t + radius).min(values.len() - 1);
            values[lo..=hi].iter().all(|&other| other <= v)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Block-structured matrix: frames with equal labels are fully similar
    fn labelled(labels: &[usize]) -> SimilarityMatrix {
        SimilarityMatrix::from_fn(labels.len(), 1000.0, |i, j| {
            if labels[i] == labels[j] { 1000.0 } else { 0.0 }
        })
    }

    /// One frame per second: three 40 s sections, each made of four 10 s phrases that
    /// resemble each other more than they resemble other sections
    fn nested_matrix() -> SimilarityMatrix {
        SimilarityMatrix::from_fn(120, 1000.0, |i, j| {
            if i / 10 == j / 10 {
                1000.0
            } else if i / 40 == j / 40 {
                700.0
            } else {
                0.0
            }
        })
    }

    fn detection_config() -> DetectionConfig {
        DetectionConfig {
            macro_kernel_secs: 16.0,
            meso_kernel_secs: 4.0,
            micro_kernel_secs: 2.0,
            macro_threshold: 0.5,
            meso_threshold: 0.0,
            micro_threshold: 0.0,
            ..DetectionConfig::default()
        }
    }

    #[test]
    fn test_local_peaks() {
        let values = [0.0, 0.2, 0.5, 0.1, 0.1, 0.9, 0.3, -0.2, 0.4];
        assert_eq!(local_peaks(&values, 1, 0.0), vec![2, 5, 8]);
        assert_eq!(local_peaks(&values, 3, 0.0), vec![5]);
        assert_eq!(local_peaks(&values, 1, 0.6), vec![5]);
    }

    #[test]
    fn test_plateau_is_not_a_peak() {
        let values = [0.0, 0.5, 0.5, 0.5, 0.0];
        // Only the rising edge counts
        assert_eq!(local_peaks(&values, 1, 0.0), vec![1]);
    }

    #[test]
    fn test_macro_finds_section_changes() {
        let matrix = labelled(&(0..120).map(|t| (t / 40) % 2).collect::<Vec<_>>());
        let config = DetectionConfig::default();
        let levels = LevelConfig { macro_enabled: true, meso_enabled: false, micro_enabled: false };

        let detection = StructureDetector::new(&config, levels).detect(&matrix, &FrameClock::uniform(120, 120.0), None);
        assert_eq!(detection.result.boundary_frames(SegmentationLevel::Macro), vec![40, 80]);
        assert!(detection.result.meso_level().is_none());

        let segments = &detection.result.macro_level().unwrap().segments;
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[2].end, 120.0);
        assert_eq!(segments[1].duration(), 40.0);
    }

    #[test]
    fn test_levels_nest() {
        let matrix = nested_matrix();
        let config = detection_config();

        let detection = StructureDetector::new(&config, LevelConfig::all()).detect(&matrix, &FrameClock::uniform(120, 120.0), None);
        let result = &detection.result;

        assert!(result.is_nested());
        let macro_frames = result.boundary_frames(SegmentationLevel::Macro);
        let meso_frames = result.boundary_frames(SegmentationLevel::Meso);
        assert!(macro_frames.contains(&40) && macro_frames.contains(&80));
        assert_eq!(meso_frames, (1..12).map(|k| k * 10).collect::<Vec<_>>());
        assert_eq!(detection.curves.len(), 3);

        for level in result.computed_levels() {
            assert!(level.segments.iter().all(|s| s.end_frame > s.start_frame));
        }
    }

    #[test]
    fn test_refining_keeps_previous_macro() {
        let matrix = nested_matrix();
        let config = detection_config();
        let full = StructureDetector::new(&config, LevelConfig::all()).detect(&matrix, &FrameClock::uniform(120, 120.0), None);

        let fine_only = LevelConfig { macro_enabled: false, meso_enabled: true, micro_enabled: true };
        let refined = StructureDetector::new(&config, fine_only).detect(&matrix, &FrameClock::uniform(120, 120.0), Some(&full));

        assert_eq!(refined.result.macro_level(), full.result.macro_level());
        assert_eq!(refined.result.meso_level(), full.result.meso_level());
        assert!(refined.result.is_nested());
        assert!(refined.curve(SegmentationLevel::Macro).is_some());
    }

    #[test]
    fn test_disabled_finer_level_is_cleared() {
        let matrix = nested_matrix();
        let config = detection_config();
        let full = StructureDetector::new(&config, LevelConfig::all()).detect(&matrix, &FrameClock::uniform(120, 120.0), None);

        let macro_only = LevelConfig { macro_enabled: true, meso_enabled: false, micro_enabled: false };
        let coarse = StructureDetector::new(&config, macro_only).detect(&matrix, &FrameClock::uniform(120, 120.0), Some(&full));
        assert!(coarse.result.meso_level().is_none());
        assert!(coarse.result.micro_level().is_none());
    }

    #[test]
    fn test_times_follow_frame_starts() {
        let matrix = labelled(&(0..120).map(|t| (t / 40) % 2).collect::<Vec<_>>());
        let levels = LevelConfig { macro_enabled: true, meso_enabled: false, micro_enabled: false };
        // Half-second hop; the last frame starts 0.5 s before the end
        let clock = FrameClock { hop_secs: 0.5, duration: 60.5 };
        let config = DetectionConfig { macro_kernel_secs: 8.0, ..DetectionConfig::default() };

        let detection = StructureDetector::new(&config, levels).detect(&matrix, &clock, None);
        let sections = detection.result.macro_level().unwrap();

        let times: Vec<f64> = sections.boundaries.iter().map(|b| b.time).collect();
        assert_eq!(times, vec![20.0, 40.0]);
        assert_eq!(sections.segments.last().unwrap().end, 60.5);
        assert_eq!(detection.result.duration, 60.5);
    }

    #[test]
    fn test_flat_matrix_has_single_segment() {
        let matrix = SimilarityMatrix::from_fn(50, 1000.0, |_, _| 1000.0);
        let config = detection_config();
        let detection = StructureDetector::new(&config, LevelConfig::all()).detect(&matrix, &FrameClock::uniform(50, 50.0), None);

        for level in detection.result.computed_levels() {
            assert!(level.boundaries.is_empty());
            assert_eq!(level.segments.len(), 1);
        }
    }
}
