// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralCert — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use crate::sample::Sample;
use sc_hash::Digest;
use thiserror::Error;

/// Dataset construction failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DatasetError {
    #[error("dataset holds no samples")]
    Empty,
    #[error("sample {index} does not match the dataset shape")]
    NonUniformShape { index: usize },
}

/// An immutable, uniformly shaped collection of samples sealed under a
/// dataset hash.
///
/// The hash is supplied at construction (use `sc-audit`'s sealing helper,
/// which derives it from the per-sample commitments); afterwards neither the
/// samples nor the hash can change, so the digest remains a faithful
/// commitment to the contents for the lifetime of the value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dataset {
    samples: Vec<Sample>,
    dataset_hash: Digest,
}

impl Dataset {
    /// Validates uniform shape and wraps the samples with their hash.
    pub fn new(samples: Vec<Sample>, dataset_hash: Digest) -> Result<Self, DatasetError> {
        let first = samples.first().ok_or(DatasetError::Empty)?;
        let (ndims, dims) = (first.ndims(), *first.dims());
        for (index, sample) in samples.iter().enumerate().skip(1) {
            if sample.ndims() != ndims || *sample.dims() != dims {
                return Err(DatasetError::NonUniformShape { index });
            }
        }
        Ok(Self {
            samples,
            dataset_hash,
        })
    }

    pub fn num_samples(&self) -> u32 {
        self.samples.len() as u32
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample(&self, index: u32) -> Option<&Sample> {
        self.samples.get(index as usize)
    }

    pub fn dataset_hash(&self) -> &Digest {
        &self.dataset_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_hash::ZERO_DIGEST;

    #[test]
    fn rejects_empty_collections() {
        assert_eq!(
            Dataset::new(vec![], ZERO_DIGEST),
            Err(DatasetError::Empty)
        );
    }

    #[test]
    fn rejects_shape_drift() {
        let a = Sample::zeros(&[2, 2]).unwrap();
        let b = Sample::zeros(&[4]).unwrap();
        assert_eq!(
            Dataset::new(vec![a, b], ZERO_DIGEST),
            Err(DatasetError::NonUniformShape { index: 1 })
        );
    }

    #[test]
    fn exposes_samples_by_index() {
        let a = Sample::new(&[2], vec![1, 2]).unwrap();
        let b = Sample::new(&[2], vec![3, 4]).unwrap();
        let ds = Dataset::new(vec![a.clone(), b], ZERO_DIGEST).unwrap();
        assert_eq!(ds.num_samples(), 2);
        assert_eq!(ds.sample(0), Some(&a));
        assert_eq!(ds.sample(2), None);
    }
}
