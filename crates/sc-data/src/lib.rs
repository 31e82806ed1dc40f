// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralCert — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! The SpiralCert data path: per-epoch shuffling, augmentation,
//! normalization, and committed batch assembly.
//!
//! One batch flows as `(seed, epoch, batch_index, i) → global index →
//! permute → dataset sample → leaf hash → Merkle root`, with the augment and
//! normalize passes producing the training view of each selected sample.
//! Everything is a pure function of `(dataset, config, seed, epoch,
//! batch_index)`: batches fill in ascending slot order, augment stages run
//! in a fixed order, and element loops ascend, so two conforming runs agree
//! byte for byte.

pub mod augment;
pub mod batch;
pub mod normalize;
pub mod permute;
pub mod pipeline;

pub use augment::{AugmentConfig, AugmentOp};
pub use batch::{Batch, BatchRef};
pub use normalize::NormalizeConfig;
pub use permute::{permute, PermuteParams};
pub use pipeline::{EpochReport, EpochRunner, PipelineError};
