// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralCert — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Merkle tree construction over sample commitments.
//!
//! Odd levels use **promotion**: a trailing node without a sibling is copied
//! up unchanged, never duplicated and hashed with itself. The two
//! conventions produce different roots for every odd leaf count — with three
//! leaves this tree yields `H(H(a,b), c)`, the duplicating convention yields
//! `H(H(a,b), H(c,c))` — so promotion is a frozen part of the public
//! contract, pinned by tests.

use sc_dvm::FaultFlags;
use sc_hash::{Digest, Sha256, ZERO_DIGEST};
use sc_tensor::{Dataset, DatasetError, Sample};

use crate::{DOMAIN_INTERNAL, DOMAIN_LEAF};

/// Upper bound on the leaf count any scratch may support.
///
/// A level beyond this is refused outright (domain fault, zero digest);
/// silently truncating a commitment would be worse than failing it.
pub const MAX_MERKLE_LEAVES: usize = 1 << 16;

/// Leaf commitment of a sample over its canonical byte serialization:
/// version, dtype, ndims, all four dim slots, then every element, all
/// little-endian, behind the leaf prefix.
pub fn hash_sample(sample: &Sample) -> Digest {
    let mut h = Sha256::new();
    h.update(&[DOMAIN_LEAF]);
    h.update(&sample.version().to_le_bytes());
    h.update(&sample.dtype().to_le_bytes());
    h.update(&sample.ndims().to_le_bytes());
    for dim in sample.dims() {
        h.update(&dim.to_le_bytes());
    }
    for value in sample.data() {
        h.update(&value.to_le_bytes());
    }
    h.finalize()
}

/// Interior node commitment.
pub fn hash_internal(left: &Digest, right: &Digest) -> Digest {
    let mut h = Sha256::new();
    h.update(&[DOMAIN_INTERNAL]);
    h.update(left);
    h.update(right);
    h.finalize()
}

/// Reusable node buffer for root computation.
///
/// Allocate once, at init time, with the largest leaf count the call site
/// will commit; `root` itself never allocates.
#[derive(Clone, Debug)]
pub struct MerkleScratch {
    nodes: Vec<Digest>,
}

impl MerkleScratch {
    /// A scratch able to hold up to `capacity` leaves, capped at
    /// [`MAX_MERKLE_LEAVES`].
    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: vec![ZERO_DIGEST; capacity.min(MAX_MERKLE_LEAVES)],
        }
    }

    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Computes the Merkle root of `leaves`.
    ///
    /// Zero leaves commit to the all-zero digest; a single leaf is its own
    /// root. A leaf count beyond the scratch capacity raises `domain` and
    /// returns the all-zero digest without computing anything.
    pub fn root(&mut self, leaves: &[Digest], faults: &mut FaultFlags) -> Digest {
        if leaves.is_empty() {
            return ZERO_DIGEST;
        }
        if leaves.len() == 1 {
            return leaves[0];
        }
        if leaves.len() > self.nodes.len() {
            faults.domain = true;
            return ZERO_DIGEST;
        }

        self.nodes[..leaves.len()].copy_from_slice(leaves);
        let mut level = leaves.len();
        while level > 1 {
            let next = level.div_ceil(2);
            for i in 0..next {
                let left = 2 * i;
                let right = left + 1;
                self.nodes[i] = if right < level {
                    hash_internal(&self.nodes[left], &self.nodes[right])
                } else {
                    // Odd trailing node: promote unchanged.
                    self.nodes[left]
                };
            }
            level = next;
        }
        self.nodes[0]
    }
}

/// One-shot root over a transient scratch, for init-time and test callers.
pub fn merkle_root(leaves: &[Digest], faults: &mut FaultFlags) -> Digest {
    MerkleScratch::new(leaves.len()).root(leaves, faults)
}

/// Root over the per-sample leaf commitments of a sample collection.
pub fn dataset_hash(samples: &[Sample], faults: &mut FaultFlags) -> Digest {
    let leaves: Vec<Digest> = samples.iter().map(hash_sample).collect();
    merkle_root(&leaves, faults)
}

/// Hashes the samples and wraps them into a sealed [`Dataset`].
pub fn seal_dataset(samples: Vec<Sample>, faults: &mut FaultFlags) -> Result<Dataset, DatasetError> {
    let hash = dataset_hash(&samples, faults);
    let dataset = Dataset::new(samples, hash)?;
    tracing::debug!(
        samples = dataset.num_samples(),
        hash = %sc_hash::hex_digest(dataset.dataset_hash()),
        "sealed dataset"
    );
    Ok(dataset)
}
