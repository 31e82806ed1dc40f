// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralCert — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Sample and dataset model for the SpiralCert pipeline.
//!
//! A [`Sample`] is a small row-major Q16.16 tensor with a fixed four-slot
//! dimension header; a [`Dataset`] is an immutable, uniformly shaped
//! collection of samples sealed under a dataset hash. The loaders in
//! [`io`] and [`csv`] produce samples from the on-disk formats and mirror
//! every failure into the caller's sticky fault set in addition to the
//! returned error, so one flag set summarises an entire run.
//!
//! Sealing (computing the dataset hash) lives in `sc-audit`, which owns the
//! commitment rules; this crate only defines the shapes and the canonical
//! field order.

pub mod csv;
pub mod io;

mod dataset;
mod sample;

pub use dataset::{Dataset, DatasetError};
pub use sample::{Sample, SampleError, DTYPE_Q16_16, MAX_DIMS, MAX_SAMPLE_ELEMENTS, SAMPLE_VERSION};

use sc_dvm::Fixed;

/// Precomputed per-feature normalization statistics.
///
/// Both fields are Q16.16; `inv_std` is the reciprocal of the standard
/// deviation, computed offline. The pipeline never estimates statistics at
/// runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureStats {
    pub mean: Fixed,
    pub inv_std: Fixed,
}
