use serde::Serialize;

use crate::error::{AnalysisError, Result};
use crate::features::{FeatureKind, FeatureVector};

/// All vectors of one kind, indexed by frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSequence {
    pub kind: FeatureKind,
    pub vectors: Vec<FeatureVector>,
}

/// Completed extraction output: one dense sequence per enabled kind, in enabled order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    frame_count: usize,
    sequences: Vec<FeatureSequence>,
}

impl FeatureSet {
    /// Assemble a set from precomputed sequences
    ///
    /// All sequences must be non-empty, of equal length, and of distinct kinds.
    pub fn from_sequences(sequences: Vec<FeatureSequence>) -> Result<Self> {
        let frame_count = sequences
            .first()
            .map(|s| s.vectors.len())
            .ok_or_else(|| AnalysisError::invalid_request("no feature sequences"))?;

        if frame_count == 0 {
            return Err(AnalysisError::invalid_request("feature sequences are empty").into());
        }

        for (i, sequence) in sequences.iter().enumerate() {
            if sequence.vectors.len() != frame_count {
                return Err(AnalysisError::invalid_request(format!(
                    "{} has {} frames, expected {}",
                    sequence.kind,
                    sequence.vectors.len(),
                    frame_count
                )).into());
            }
            if sequences[..i].iter().any(|s| s.kind == sequence.kind) {
                return Err(AnalysisError::invalid_request(format!("{} given twice", sequence.kind)).into());
            }
        }

        Ok(Self { frame_count, sequences })
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn kinds(&self) -> Vec<FeatureKind> {
        self.sequences.iter().map(|s| s.kind).collect()
    }

    pub fn sequences(&self) -> &[FeatureSequence] {
        &self.sequences
    }

    pub fn sequence(&self, kind: FeatureKind) -> Result<&FeatureSequence> {
        self.sequences
            .iter()
            .find(|s| s.kind == kind)
            .ok_or_else(|| AnalysisError::invalid_request(format!("{} was not enabled", kind)).into())
    }

    pub fn vector(&self, kind: FeatureKind, index: usize) -> Result<&[f32]> {
        let sequence = self.sequence(kind)?;
        sequence
            .vectors
            .get(index)
            .map(Vec::as_slice)
            .ok_or_else(|| out_of_range(index, self.frame_count).into())
    }
}

fn out_of_range(index: usize, frame_count: usize) -> AnalysisError {
    AnalysisError::invalid_request(format!("frame {} outside [0, {})", index, frame_count))
}

struct Slots {
    kind: FeatureKind,
    vector_len: usize,
    vectors: Vec<Option<FeatureVector>>,
}

/// Write-once buffer the pipeline fills by `(kind, frame)` while extraction is running
pub struct FeatureStore {
    frame_count: usize,
    slots: Vec<Slots>,
    filled: usize,
}

impl FeatureStore {
    /// Allocate one container per kind, each sized to `frame_count`
    pub fn new(kinds: &[(FeatureKind, usize)], frame_count: usize) -> Self {
        let slots = kinds
            .iter()
            .map(|&(kind, vector_len)| Slots {
                kind,
                vector_len,
                vectors: vec![None; frame_count],
            })
            .collect();

        Self {
            frame_count,
            slots,
            filled: 0,
        }
    }

    fn slots(&self, kind: FeatureKind) -> Result<&Slots> {
        self.slots
            .iter()
            .find(|s| s.kind == kind)
            .ok_or_else(|| AnalysisError::invalid_request(format!("{} was not enabled", kind)).into())
    }

    pub fn insert(&mut self, kind: FeatureKind, index: usize, vector: FeatureVector) -> Result<()> {
        let frame_count = self.frame_count;
        let slots = self
            .slots
            .iter_mut()
            .find(|s| s.kind == kind)
            .ok_or_else(|| AnalysisError::invalid_request(format!("{} was not enabled", kind)))?;

        if vector.len() != slots.vector_len {
            return Err(AnalysisError::ExtractionFailed {
                reason: format!(
                    "{} extractor produced {} values for frame {}, expected {}",
                    kind,
                    vector.len(),
                    index,
                    slots.vector_len
                ),
            }.into());
        }

        let slot = slots
            .vectors
            .get_mut(index)
            .ok_or_else(|| out_of_range(index, frame_count))?;
        if slot.is_some() {
            return Err(AnalysisError::ExtractionFailed {
                reason: format!("{} frame {} delivered twice", kind, index),
            }.into());
        }

        *slot = Some(vector);
        self.filled += 1;
        Ok(())
    }

    pub fn get(&self, kind: FeatureKind, index: usize) -> Result<&FeatureVector> {
        let slots = self.slots(kind)?;
        match slots.vectors.get(index) {
            Some(Some(vector)) => Ok(vector),
            Some(None) => Err(AnalysisError::invalid_request(format!("{} frame {} not extracted yet", kind, index)).into()),
            None => Err(out_of_range(index, self.frame_count).into()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.filled == self.frame_count * self.slots.len()
    }

    /// Seal the store; fails unless every `(kind, frame)` slot is filled
    pub fn finish(self) -> Result<FeatureSet> {
        if !self.is_complete() {
            return Err(AnalysisError::ExtractionFailed {
                reason: format!(
                    "only {} of {} feature vectors were extracted",
                    self.filled,
                    self.frame_count * self.slots.len()
                ),
            }.into());
        }

        let sequences = self
            .slots
            .into_iter()
            .map(|s| FeatureSequence {
                kind: s.kind,
                vectors: s.vectors.into_iter().flatten().collect(),
            })
            .collect();

        FeatureSet::from_sequences(sequences)
    }
}
