// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralCert — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Bijective index permutation: a four-round balanced Feistel network over
//! the next power-of-two domain, cycle-walked back into `[0, n)`.
//!
//! Both Feistel halves share the ceiling width `half_bits = (k+1)/2`, so for
//! odd `k` the network permutes a domain larger than `1 << k`; the cycle
//! walk re-applies the network until the value lands below `n`. The network
//! is a bijection on its own domain, so the walk moves along one cycle and
//! terminates within that cycle's length. The loop is still hard-bounded at
//! `range` steps: a longer cycle (possible only when `k` is odd and the
//! Feistel domain exceeds `range`) degrades deterministically to `index % n`
//! with a domain fault instead of walking further.
//!
//! The round function reads `seed ‖ epoch ‖ R ‖ round` little-endian through
//! SHA-256 and keeps the first four digest bytes. These seventeen bytes are
//! the only binding between the seed material and the permutation; any
//! change to their layout breaks replay compatibility.

use sc_dvm::FaultFlags;
use sc_hash::Sha256;

/// Derived Feistel geometry for a fixed `(seed, epoch, n)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PermuteParams {
    seed: u64,
    epoch: u32,
    n: u32,
    k: u32,
    half_bits: u32,
    half_mask: u32,
    range: u64,
}

impl PermuteParams {
    /// Computes the geometry: `k = ⌈log₂ n⌉`, `range = 2ᵏ`, balanced half
    /// width `(k+1)/2`.
    pub fn new(seed: u64, epoch: u32, n: u32) -> Self {
        let k = ceil_log2(n);
        let half_bits = (k + 1) / 2;
        Self {
            seed,
            epoch,
            n,
            k,
            half_bits,
            half_mask: if half_bits == 0 {
                0
            } else {
                (1u32 << half_bits) - 1
            },
            range: 1u64 << k,
        }
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn half_bits(&self) -> u32 {
        self.half_bits
    }

    pub fn range(&self) -> u64 {
        self.range
    }

    /// Maps `index` through the cycle-walked Feistel network.
    pub fn apply(&self, index: u32, faults: &mut FaultFlags) -> u32 {
        if self.n <= 1 {
            return 0;
        }
        if index >= self.n {
            return index % self.n;
        }

        let mut i = index;
        for _ in 0..self.range {
            let mut left = i & self.half_mask;
            let mut right = (i >> self.half_bits) & self.half_mask;
            for round in 0..4u8 {
                let f = feistel_round(right, self.seed, self.epoch, round) & self.half_mask;
                let next_right = left ^ f;
                left = right;
                right = next_right;
            }
            i = (right << self.half_bits) | left;
            if i < self.n {
                return i;
            }
        }

        faults.domain = true;
        index % self.n
    }
}

/// Permutes `index` within `[0, n)` for the given `(seed, epoch)`.
///
/// For any fixed `(n, seed, epoch)` the mapping restricted to `[0, n)` is a
/// bijection onto `[0, n)`. `n ≤ 1` maps everything to 0; an out-of-range
/// index is defensively reduced modulo `n`.
pub fn permute(index: u32, n: u32, seed: u64, epoch: u32, faults: &mut FaultFlags) -> u32 {
    PermuteParams::new(seed, epoch, n).apply(index, faults)
}

/// Round function: first four digest bytes of
/// `SHA256(seed_LE ‖ epoch_LE ‖ r_LE ‖ round)`, read little-endian.
pub fn feistel_round(r: u32, seed: u64, epoch: u32, round: u8) -> u32 {
    let mut buf = [0u8; 17];
    buf[..8].copy_from_slice(&seed.to_le_bytes());
    buf[8..12].copy_from_slice(&epoch.to_le_bytes());
    buf[12..16].copy_from_slice(&r.to_le_bytes());
    buf[16] = round;

    let mut h = Sha256::new();
    h.update(&buf);
    let digest = h.finalize();
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

fn ceil_log2(n: u32) -> u32 {
    if n <= 1 {
        0
    } else {
        32 - (n - 1).leading_zeros()
    }
}
