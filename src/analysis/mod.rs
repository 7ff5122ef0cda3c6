//! # Structural Analysis
//!
//! Everything downstream of feature extraction:
//!
//! 1. [`similarity`] blends per-kind frame distances into one normalized self-similarity
//!    matrix.
//! 2. [`novelty`] slides a checkerboard kernel along the matrix diagonal.
//! 3. [`structure`] picks boundaries from the novelty curves, coarse to fine.
//!
//! The three levels nest: every macro boundary is a meso boundary and every meso boundary
//! is a micro boundary.

pub mod novelty;
pub mod similarity;
pub mod structure;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use novelty::{CheckerboardKernel, NoveltyCurve};
pub use similarity::{SimilarityMatrix, SimilarityMatrixBuilder};
pub use structure::{Boundary, Detection, LevelSegmentation, Segment, SegmentationResult, StructureDetector};

/// Granularity of a segmentation, coarse to fine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationLevel {
    Macro,
    Meso,
    Micro,
}

impl SegmentationLevel {
    /// All levels in detection order
    pub const ALL: [SegmentationLevel; 3] = [
        SegmentationLevel::Macro,
        SegmentationLevel::Meso,
        SegmentationLevel::Micro,
    ];

    pub fn index(&self) -> usize {
        match self {
            SegmentationLevel::Macro => 0,
            SegmentationLevel::Meso => 1,
            SegmentationLevel::Micro => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SegmentationLevel::Macro => "macro",
            SegmentationLevel::Meso => "meso",
            SegmentationLevel::Micro => "micro",
        }
    }
}

impl fmt::Display for SegmentationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
