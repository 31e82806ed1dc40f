// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralCert — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Epoch orchestration: batches in ascending order, commitments collected,
//! the provenance chain advanced only over a clean epoch.
//!
//! The runner owns every buffer the per-batch path needs (the batch, the
//! transformed sample views, the epoch-level Merkle scratch), all sized at
//! construction, so a steady-state epoch performs no allocation. At epoch
//! end the sticky flag set is the arbiter: any fault discards the epoch and
//! leaves the chain untouched, surfacing the full flag set to the operator.

use sc_audit::{MerkleScratch, Provenance, MAX_MERKLE_LEAVES};
use sc_dvm::FaultFlags;
use sc_hash::{hex_digest, Digest};
use sc_tensor::{Dataset, Sample};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::augment::{augment_sample, AugmentConfig};
use crate::batch::Batch;
use crate::normalize::NormalizeConfig;

/// Construction- and epoch-level failures of the runner.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("batch size must be positive")]
    ZeroBatchSize,
    #[error("{required} commitment leaves exceed the supported {max}")]
    CommitmentCapacity { required: u64, max: usize },
    #[error("epoch {epoch} faulted: {faults}")]
    EpochFaulted { epoch: u32, faults: FaultFlags },
}

/// Outcome of one clean epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpochReport {
    pub epoch: u32,
    pub epoch_hash: Digest,
    pub num_batches: u32,
    /// Provenance chain head after binding this epoch.
    pub chain_hash: Digest,
}

/// Drives the full data path for one dataset and configuration.
pub struct EpochRunner<'d> {
    dataset: &'d Dataset,
    seed: u64,
    augment: AugmentConfig,
    normalize: NormalizeConfig,
    batch: Batch,
    views: Vec<Sample>,
    batch_hashes: Vec<Digest>,
    epoch_scratch: MerkleScratch,
}

impl<'d> EpochRunner<'d> {
    /// Sizes every buffer for `batch_size` against the dataset.
    pub fn new(
        dataset: &'d Dataset,
        seed: u64,
        batch_size: u32,
        augment: AugmentConfig,
        normalize: NormalizeConfig,
    ) -> Result<Self, PipelineError> {
        if batch_size == 0 {
            return Err(PipelineError::ZeroBatchSize);
        }
        let num_batches = num_batches_for(dataset.num_samples(), batch_size);
        for required in [u64::from(batch_size), u64::from(num_batches)] {
            if required > MAX_MERKLE_LEAVES as u64 {
                return Err(PipelineError::CommitmentCapacity {
                    required,
                    max: MAX_MERKLE_LEAVES,
                });
            }
        }

        // Pre-shaped views keep the per-batch path allocation-free.
        let template = &dataset.samples()[0];
        let views = vec![template.clone(); batch_size as usize];

        Ok(Self {
            dataset,
            seed,
            augment,
            normalize,
            batch: Batch::new(batch_size),
            views,
            batch_hashes: Vec::with_capacity(num_batches as usize),
            epoch_scratch: MerkleScratch::new(num_batches as usize),
        })
    }

    pub fn num_batches(&self) -> u32 {
        num_batches_for(self.dataset.num_samples(), self.batch.capacity())
    }

    /// Fills, commits, and transforms one batch; returns its commitment.
    ///
    /// After the call, [`batch`](EpochRunner::batch) exposes the committed
    /// selection and [`views`](EpochRunner::views) the augmented and
    /// normalized samples the training step consumes.
    pub fn process_batch(&mut self, epoch: u32, batch_index: u32, faults: &mut FaultFlags) -> Digest {
        self.batch
            .fill(self.dataset, batch_index, epoch, self.seed, faults);
        self.batch.verify(faults);

        let dataset = self.dataset;
        let augment = self.augment;
        let capacity = self.batch.capacity();
        for i in 0..self.batch.len() {
            let slot = i as usize;
            let shuffled = self.batch.refs()[slot].shuffled_index;
            let sample_idx = batch_index
                .wrapping_mul(capacity)
                .wrapping_add(i);
            augment_sample(
                &augment,
                self.seed,
                epoch,
                sample_idx,
                &dataset.samples()[shuffled as usize],
                &mut self.views[slot],
                faults,
            );
            self.normalize.apply_in_place(&mut self.views[slot], faults);
        }
        debug!(epoch, batch_index, len = self.batch.len(), "processed batch");
        *self.batch.batch_hash()
    }

    /// Runs every batch of `epoch`, binds the epoch into the provenance
    /// chain, and reports the commitments.
    ///
    /// If any sticky fault is set by the end of the epoch — whether raised
    /// here or carried in by the caller — the epoch is discarded: the chain
    /// does not advance and the accumulated flag set is returned.
    pub fn run_epoch(
        &mut self,
        epoch: u32,
        provenance: &mut Provenance,
        faults: &mut FaultFlags,
    ) -> Result<EpochReport, PipelineError> {
        let num_batches = self.num_batches();
        self.batch_hashes.clear();
        for batch_index in 0..num_batches {
            let hash = self.process_batch(epoch, batch_index, faults);
            self.batch_hashes.push(hash);
        }
        let epoch_hash = self.epoch_scratch.root(&self.batch_hashes, faults);

        if faults.any() {
            warn!(epoch, faults = %faults, "discarding faulted epoch");
            return Err(PipelineError::EpochFaulted {
                epoch,
                faults: *faults,
            });
        }

        provenance.advance(&epoch_hash, faults);
        info!(
            epoch,
            num_batches,
            epoch_hash = %hex_digest(&epoch_hash),
            "epoch committed"
        );
        Ok(EpochReport {
            epoch,
            epoch_hash,
            num_batches,
            chain_hash: *provenance.current_hash(),
        })
    }

    /// The most recently processed batch.
    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Transformed views of the most recently processed batch, in slot
    /// order (only the first [`Batch::len`] entries are live).
    pub fn views(&self) -> &[Sample] {
        &self.views[..self.batch.len() as usize]
    }

    /// Per-batch commitments of the most recently run epoch.
    pub fn batch_hashes(&self) -> &[Digest] {
        &self.batch_hashes
    }
}

fn num_batches_for(num_samples: u32, batch_size: u32) -> u32 {
    ((u64::from(num_samples) + u64::from(batch_size) - 1) / u64::from(batch_size)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_audit::seal_dataset;

    fn dataset(n: u32, elems: u32) -> Dataset {
        let samples = (0..n)
            .map(|i| {
                let data = (0..elems).map(|e| (i * elems + e) as i32 * 100).collect();
                Sample::new(&[elems], data).unwrap()
            })
            .collect();
        let mut faults = FaultFlags::new();
        seal_dataset(samples, &mut faults).unwrap()
    }

    #[test]
    fn rejects_degenerate_construction() {
        let ds = dataset(4, 2);
        assert!(matches!(
            EpochRunner::new(&ds, 1, 0, AugmentConfig::default(), NormalizeConfig::default()),
            Err(PipelineError::ZeroBatchSize)
        ));
    }

    #[test]
    fn batch_count_covers_the_dataset() {
        let ds = dataset(10, 2);
        let runner =
            EpochRunner::new(&ds, 1, 4, AugmentConfig::default(), NormalizeConfig::default())
                .unwrap();
        assert_eq!(runner.num_batches(), 3);
    }

    #[test]
    fn epoch_report_is_reproducible() {
        let ds = dataset(7, 3);
        let cfg = AugmentConfig {
            additive_noise: true,
            noise_std: 500,
            ..AugmentConfig::default()
        };

        let run = |ds: &Dataset| {
            let mut runner =
                EpochRunner::new(ds, 0xAA55, 3, cfg, NormalizeConfig::default()).unwrap();
            let mut prov = Provenance::new(*ds.dataset_hash(), [9u8; 32], 0xAA55);
            let mut faults = FaultFlags::new();
            let report = runner.run_epoch(0, &mut prov, &mut faults).unwrap();
            (report, runner.views().to_vec())
        };

        let (report_a, views_a) = run(&ds);
        let (report_b, views_b) = run(&ds);
        assert_eq!(report_a, report_b);
        assert_eq!(views_a, views_b);
    }

    #[test]
    fn faulted_epochs_are_discarded() {
        let ds = dataset(4, 2);
        let mut runner =
            EpochRunner::new(&ds, 7, 2, AugmentConfig::default(), NormalizeConfig::default())
                .unwrap();
        let mut prov = Provenance::new(*ds.dataset_hash(), [0u8; 32], 7);
        let before = prov.clone();

        let mut faults = FaultFlags::new();
        faults.io_error = true;
        assert!(matches!(
            runner.run_epoch(0, &mut prov, &mut faults),
            Err(PipelineError::EpochFaulted { epoch: 0, .. })
        ));
        assert_eq!(prov, before);
    }
}
