//! Sequential train/validation/test partitioning.
//!
//! Partitions are contiguous and keep time order; nothing is shuffled, so
//! later frames never leak into an earlier partition.

use crate::config::SplitRatios;
use crate::core::sequence::TemporalGraphSequence;

/// Three contiguous partitions of one sequence.
#[derive(Debug, Clone, Default)]
pub struct DatasetSplits {
    pub train: TemporalGraphSequence,
    pub validation: TemporalGraphSequence,
    pub test: TemporalGraphSequence,
}

impl DatasetSplits {
    /// Partition lengths as `(train, validation, test)`.
    pub fn lengths(&self) -> (usize, usize, usize) {
        (self.train.len(), self.validation.len(), self.test.len())
    }
}

/// Splits temporal sequences by ratio.
#[derive(Debug, Clone, Copy)]
pub struct Splitter {
    ratios: SplitRatios,
}

impl Splitter {
    pub fn new(ratios: SplitRatios) -> Self {
        Self { ratios }
    }

    /// First boundary for a sequence of length `len`: `floor(ratio · len)`.
    pub fn boundary(ratio: f64, len: usize) -> usize {
        ((ratio * len as f64).floor() as usize).min(len)
    }

    /// Split into a head of `floor(ratio · len)` frames and the remaining tail.
    ///
    /// Either side may be empty.
    pub fn split(
        sequence: TemporalGraphSequence,
        ratio: f64,
    ) -> (TemporalGraphSequence, TemporalGraphSequence) {
        let at = Self::boundary(ratio, sequence.len());
        sequence.split_at(at)
    }

    /// Train on the head, then split the held-out tail into validation/test.
    pub fn split_three(&self, sequence: TemporalGraphSequence) -> DatasetSplits {
        let (train, rest) = Self::split(sequence, self.ratios.train_ratio);
        let (validation, test) = Self::split(rest, self.ratios.validation_ratio);
        DatasetSplits {
            train,
            validation,
            test,
        }
    }
}
