// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralCert — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Commitment layer: domain-separated hashing, Merkle roots, and the
//! rolling provenance chain.
//!
//! Every structural position in the commitment tree carries its own prefix
//! byte, so a leaf can never be confused with an interior node and a batch
//! commitment can never collide with a chain link. The byte values are part
//! of the wire contract and frozen — renumbering them silently breaks
//! cross-implementation compatibility.

mod merkle;
mod provenance;

pub use merkle::{
    dataset_hash, hash_internal, hash_sample, merkle_root, seal_dataset, MerkleScratch,
    MAX_MERKLE_LEAVES,
};
pub use provenance::Provenance;

/// Prefix for sample leaf hashes.
pub const DOMAIN_LEAF: u8 = 0x00;
/// Prefix for interior Merkle nodes.
pub const DOMAIN_INTERNAL: u8 = 0x01;
/// Reserved for a metadata-wrapped batch commitment; the stored batch hash
/// is currently the plain Merkle root and does not use this byte.
pub const DOMAIN_BATCH: u8 = 0x02;
/// Prefix for the provenance chain genesis hash.
pub const DOMAIN_PROVENANCE_INIT: u8 = 0x03;
/// Prefix for each epoch link of the provenance chain.
pub const DOMAIN_EPOCH_CHAIN: u8 = 0x04;
