// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralCert — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Committed batch assembly.
//!
//! A batch selects its samples through the per-epoch permutation, records
//! the (original, shuffled) index pairs, hashes each selected sample, and
//! commits to the hashes with a Merkle root. The final batch of an epoch
//! may be partial; trailing slots are zeroed and excluded from the root, so
//! the commitment covers exactly the live samples. All buffers are sized at
//! construction — filling a batch does not allocate.

use sc_audit::{hash_sample, MerkleScratch};
use sc_dvm::FaultFlags;
use sc_hash::{Digest, ZERO_DIGEST};
use sc_tensor::{Dataset, Sample};
use tracing::debug;

use crate::permute::PermuteParams;

/// Where one batch slot came from: the in-epoch position and the dataset
/// index the permutation selected for it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchRef {
    pub original_index: u32,
    pub shuffled_index: u32,
}

/// One committed batch of an epoch.
///
/// Construction happens once per `(epoch, batch_index)` via
/// [`fill`](Batch::fill); afterwards the contents are only read. Samples are
/// referenced by index into the dataset rather than copied.
#[derive(Clone, Debug)]
pub struct Batch {
    epoch: u32,
    batch_index: u32,
    capacity: u32,
    len: u32,
    refs: Vec<BatchRef>,
    sample_hashes: Vec<Digest>,
    batch_hash: Digest,
    scratch: MerkleScratch,
}

impl Batch {
    /// An empty batch able to hold up to `capacity` samples.
    pub fn new(capacity: u32) -> Self {
        Self {
            epoch: 0,
            batch_index: 0,
            capacity,
            len: 0,
            refs: vec![BatchRef::default(); capacity as usize],
            sample_hashes: vec![ZERO_DIGEST; capacity as usize],
            batch_hash: ZERO_DIGEST,
            scratch: MerkleScratch::new(capacity as usize),
        }
    }

    /// Selects, hashes, and commits the samples of `(epoch, batch_index)`.
    pub fn fill(
        &mut self,
        dataset: &Dataset,
        batch_index: u32,
        epoch: u32,
        seed: u64,
        faults: &mut FaultFlags,
    ) {
        self.epoch = epoch;
        self.batch_index = batch_index;

        let n = dataset.num_samples();
        let start = u64::from(batch_index) * u64::from(self.capacity);
        let effective = u64::from(n)
            .saturating_sub(start)
            .min(u64::from(self.capacity)) as u32;
        self.len = effective;

        let params = PermuteParams::new(seed, epoch, n);
        for i in 0..effective {
            let original = (start + u64::from(i)) as u32;
            let shuffled = params.apply(original, faults);
            self.refs[i as usize] = BatchRef {
                original_index: original,
                shuffled_index: shuffled,
            };
            // The permutation stays in range by construction; the zero
            // fallback keeps a corrupt dataset index from panicking here.
            let sample = dataset.sample(shuffled).unwrap_or_else(|| {
                faults.domain = true;
                &dataset.samples()[0]
            });
            self.sample_hashes[i as usize] = hash_sample(sample);
        }
        for i in effective..self.capacity {
            self.refs[i as usize] = BatchRef::default();
            self.sample_hashes[i as usize] = ZERO_DIGEST;
        }

        self.batch_hash = self
            .scratch
            .root(&self.sample_hashes[..effective as usize], faults);
        debug!(
            epoch,
            batch_index,
            len = effective,
            hash = %sc_hash::hex_digest(&self.batch_hash),
            "filled batch"
        );
    }

    /// Recomputes the Merkle root and compares it with the stored
    /// commitment.
    ///
    /// Returns false without touching the flags when any fault is already
    /// set — an artifact built under faults is never acceptable. A root
    /// mismatch raises `hash_mismatch`.
    pub fn verify(&mut self, faults: &mut FaultFlags) -> bool {
        if faults.any() {
            return false;
        }
        let recomputed = self
            .scratch
            .root(&self.sample_hashes[..self.len as usize], faults);
        if recomputed == self.batch_hash {
            true
        } else {
            faults.hash_mismatch = true;
            false
        }
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn batch_index(&self) -> u32 {
        self.batch_index
    }

    /// Maximum number of samples this batch can hold.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of live samples in the batch.
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Live slot provenance, in slot order.
    pub fn refs(&self) -> &[BatchRef] {
        &self.refs[..self.len as usize]
    }

    /// Live sample commitments, in slot order.
    pub fn sample_hashes(&self) -> &[Digest] {
        &self.sample_hashes[..self.len as usize]
    }

    pub fn batch_hash(&self) -> &Digest {
        &self.batch_hash
    }

    /// Overrides the stored commitment; exists for tamper tests.
    #[doc(hidden)]
    pub fn set_batch_hash(&mut self, hash: Digest) {
        self.batch_hash = hash;
    }

    /// The dataset sample behind slot `i`.
    pub fn sample<'d>(&self, dataset: &'d Dataset, i: u32) -> Option<&'d Sample> {
        if i >= self.len {
            return None;
        }
        dataset.sample(self.refs[i as usize].shuffled_index)
    }
}
