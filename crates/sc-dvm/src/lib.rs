// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralCert — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Deterministic arithmetic primitives for the SpiralCert data path.
//!
//! Everything downstream of the loaders — normalization, augmentation, the
//! index permutation — is built from the operations in this crate, and the
//! bit-reproducibility promise of the whole pipeline reduces to three local
//! rules enforced here:
//!
//! - integer-only Q16.16 arithmetic, widened to 64 bits before every
//!   combination so no intermediate can overflow;
//! - a single rounding rule (round-to-nearest, ties-to-even) for every
//!   narrowing step;
//! - totality: primitives never panic and never return `Result`; they
//!   produce a defined value and record anomalies in a sticky
//!   [`FaultFlags`] set owned by the caller.
//!
//! Randomness comes from a pure counter-based PRF: a deterministic function
//! of `(seed, epoch, op_id)` with no hidden state, so any draw can be
//! recomputed in isolation during an audit.

mod fault;
mod fixed;
mod prf;

pub use fault::FaultFlags;
pub use fixed::{
    add32, clamp32, div_q16, mul64, mul_q16, round_shift_rne, sub32, Fixed, FIXED_EPS, FIXED_HALF,
    FIXED_MAX, FIXED_MIN, FIXED_ONE, FIXED_SHIFT, FIXED_ZERO,
};
pub use prf::{prf, prf_uniform, PRF_REJECTION_BOUND};
