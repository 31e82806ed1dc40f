// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralCert — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use sc_dvm::FaultFlags;
use sc_hash::{hex_digest, Digest, Sha256};
use tracing::{info, warn};

use crate::{DOMAIN_EPOCH_CHAIN, DOMAIN_PROVENANCE_INIT};

/// Rolling commitment binding dataset, configuration, seed, and every
/// completed epoch into a single hash.
///
/// The chain starts at `h₀ = SHA256(0x03 ‖ dataset_hash ‖ config_hash ‖
/// seed)` and advances once per completed epoch with `hₑ₊₁ = SHA256(0x04 ‖
/// hₑ ‖ epoch_hash ‖ e)`, where `e` is the number of the epoch just
/// completed. The current hash after `e` advances is therefore the canonical
/// wire commitment to "dataset + config + seed + epochs 0..e−1". The chain
/// is strictly append-only and refuses to advance over a faulted epoch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Provenance {
    dataset_hash: Digest,
    config_hash: Digest,
    seed: u64,
    current_epoch: u32,
    total_epochs: u32,
    prev_hash: Digest,
    current_hash: Digest,
}

impl Provenance {
    /// Initializes the chain at its genesis hash.
    pub fn new(dataset_hash: Digest, config_hash: Digest, seed: u64) -> Self {
        let mut h = Sha256::new();
        h.update(&[DOMAIN_PROVENANCE_INIT]);
        h.update(&dataset_hash);
        h.update(&config_hash);
        h.update(&seed.to_le_bytes());
        let genesis = h.finalize();

        Self {
            dataset_hash,
            config_hash,
            seed,
            current_epoch: 0,
            total_epochs: 0,
            prev_hash: genesis,
            current_hash: genesis,
        }
    }

    /// Binds a completed epoch into the chain.
    ///
    /// Returns false — leaving the chain untouched — when any fault is
    /// already set: a faulted epoch must be discarded, not committed.
    pub fn advance(&mut self, epoch_hash: &Digest, faults: &FaultFlags) -> bool {
        if faults.any() {
            warn!(
                epoch = self.current_epoch,
                faults = %faults,
                "refusing to advance provenance over a faulted epoch"
            );
            return false;
        }

        self.prev_hash = self.current_hash;
        let mut h = Sha256::new();
        h.update(&[DOMAIN_EPOCH_CHAIN]);
        h.update(&self.prev_hash);
        h.update(epoch_hash);
        h.update(&self.current_epoch.to_le_bytes());
        self.current_hash = h.finalize();

        info!(
            epoch = self.current_epoch,
            chain = %hex_digest(&self.current_hash),
            "provenance advanced"
        );
        self.current_epoch += 1;
        self.total_epochs += 1;
        true
    }

    pub fn dataset_hash(&self) -> &Digest {
        &self.dataset_hash
    }

    pub fn config_hash(&self) -> &Digest {
        &self.config_hash
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Epoch number the next advance will commit.
    pub fn current_epoch(&self) -> u32 {
        self.current_epoch
    }

    pub fn total_epochs(&self) -> u32 {
        self.total_epochs
    }

    pub fn prev_hash(&self) -> &Digest {
        &self.prev_hash
    }

    /// The canonical wire commitment to everything completed so far.
    pub fn current_hash(&self) -> &Digest {
        &self.current_hash
    }
}
