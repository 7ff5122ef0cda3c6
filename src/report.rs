use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    analysis::{Boundary, Segment, SegmentationLevel, SegmentationResult, SimilarityMatrix},
    config::AnalysisConfig,
    error::{Result, SegmenterError},
    features::FeatureKind,
};

/// Serializable summary of one analysis, written by the CLI
#[derive(Debug, Clone, Serialize)]
pub struct SegmentationReport {
    pub source: String,
    pub generated_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub frame_count: usize,
    pub frame_size: usize,
    pub overlap: usize,
    pub features: Vec<FeatureKind>,
    /// Features that did not vary and were left out of the matrix
    pub degenerate_features: Vec<FeatureKind>,
    pub levels: Vec<LevelReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LevelReport {
    pub level: SegmentationLevel,
    pub boundaries: Vec<Boundary>,
    pub segments: Vec<Segment>,
}

impl SegmentationReport {
    pub fn new(
        source: impl Into<String>,
        config: &AnalysisConfig,
        result: &SegmentationResult,
        matrix: &SimilarityMatrix,
    ) -> Self {
        let levels = result
            .computed_levels()
            .map(|level| LevelReport {
                level: level.level,
                boundaries: level.boundaries.clone(),
                segments: level.segments.clone(),
            })
            .collect();

        Self {
            source: source.into(),
            generated_at: Utc::now(),
            duration_secs: result.duration,
            frame_count: result.frame_count,
            frame_size: config.frame_size,
            overlap: config.overlap,
            features: config.features.enabled.clone(),
            degenerate_features: matrix.degenerate_kinds().to_vec(),
            levels,
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SegmenterError::generic(format!("Failed to serialize report: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::StructureDetector;
    use crate::config::{DetectionConfig, LevelConfig};
    use crate::pipeline::FrameClock;
    use tempfile::tempdir;

    fn sample_report() -> SegmentationReport {
        let matrix = SimilarityMatrix::from_fn(60, 1000.0, |i, j| {
            if i / 20 == j / 20 { 1000.0 } else { 0.0 }
        });
        let detection = DetectionConfig {
            macro_kernel_secs: 8.0,
            meso_kernel_secs: 4.0,
            micro_kernel_secs: 2.0,
            ..DetectionConfig::default()
        };
        let levels = LevelConfig { macro_enabled: true, meso_enabled: true, micro_enabled: false };
        let result = StructureDetector::new(&detection, levels).detect(&matrix, &FrameClock::uniform(60, 60.0), None).result;

        SegmentationReport::new("song.wav", &AnalysisConfig::default(), &result, &matrix)
    }

    #[test]
    fn test_report_lists_computed_levels() {
        let report = sample_report();
        assert_eq!(report.levels.len(), 2);
        assert_eq!(report.levels[0].level, SegmentationLevel::Macro);
        assert_eq!(report.frame_count, 60);
    }

    #[test]
    fn test_report_toml() {
        let report = sample_report();
        let text = report.to_toml().unwrap();
        assert!(text.contains("source = \"song.wav\""));
        assert!(text.contains("[[levels]]"));
        assert!(text.contains("level = \"macro\""));

        let dir = tempdir().unwrap();
        let path = dir.path().join("report.toml");
        report.save_to_file(&path).unwrap();
        let parsed: toml::Value = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["levels"].as_array().unwrap().len(), 2);
    }
}
