// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralCert — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::fmt;

/// Sticky fault accumulator threaded through every fallible primitive.
///
/// Flags only ever transition from clear to set while a pipeline runs; the
/// owner decides when (and whether) to [`clear`](FaultFlags::clear) them.
/// This lets a whole epoch execute to completion and still surface every
/// anomaly that occurred along the way, which is what the
/// accept-or-discard decision at epoch end needs. Any flag set during the
/// construction of a committed artifact invalidates that commitment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FaultFlags {
    /// A value saturated at the positive range limit.
    pub overflow: bool,
    /// A value saturated at the negative range limit.
    pub underflow: bool,
    /// Division by zero was requested.
    pub div_zero: bool,
    /// An argument was outside its contract (shift width, zero range,
    /// exhausted bounded loop, commitment capacity).
    pub domain: bool,
    /// Reserved for precision-loss detection.
    pub precision: bool,
    /// Short read, unreadable file, or insufficient buffer.
    pub io_error: bool,
    /// Malformed on-disk format or malformed decimal text.
    pub format_error: bool,
    /// A commitment failed to verify byte-for-byte.
    pub hash_mismatch: bool,
}

impl FaultFlags {
    /// All flags clear.
    pub const fn new() -> Self {
        Self {
            overflow: false,
            underflow: false,
            div_zero: false,
            domain: false,
            precision: false,
            io_error: false,
            format_error: false,
            hash_mismatch: false,
        }
    }

    /// True when any flag is set.
    pub fn any(&self) -> bool {
        self.overflow
            || self.underflow
            || self.div_zero
            || self.domain
            || self.precision
            || self.io_error
            || self.format_error
            || self.hash_mismatch
    }

    /// Explicitly clears every flag. Nothing else ever clears them.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// ORs another flag set into this one.
    pub fn merge(&mut self, other: &FaultFlags) {
        self.overflow |= other.overflow;
        self.underflow |= other.underflow;
        self.div_zero |= other.div_zero;
        self.domain |= other.domain;
        self.precision |= other.precision;
        self.io_error |= other.io_error;
        self.format_error |= other.format_error;
        self.hash_mismatch |= other.hash_mismatch;
    }
}

impl fmt::Display for FaultFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.any() {
            return write!(f, "clear");
        }
        let mut first = true;
        let mut emit = |f: &mut fmt::Formatter<'_>, set: bool, name: &str| -> fmt::Result {
            if set {
                if !first {
                    write!(f, "|")?;
                }
                first = false;
                write!(f, "{name}")?;
            }
            Ok(())
        };
        emit(f, self.overflow, "overflow")?;
        emit(f, self.underflow, "underflow")?;
        emit(f, self.div_zero, "div_zero")?;
        emit(f, self.domain, "domain")?;
        emit(f, self.precision, "precision")?;
        emit(f, self.io_error, "io_error")?;
        emit(f, self.format_error, "format_error")?;
        emit(f, self.hash_mismatch, "hash_mismatch")?;
        Ok(())
    }
}
