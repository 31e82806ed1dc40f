// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralCert — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Per-feature affine normalization with precomputed statistics.
//!
//! Each covered element becomes `(x − mean_i) · inv_std_i` in saturating
//! Q16.16; elements beyond the statistics table pass through unchanged.
//! Saturation raises the sticky flag and processing continues, so one pass
//! reports every excursion in a sample rather than the first.

use sc_dvm::{mul_q16, sub32, FaultFlags};
use sc_tensor::{FeatureStats, Sample};

/// Precomputed per-feature statistics table.
///
/// Built offline (or loaded from a statistics file); the pipeline never
/// estimates statistics at runtime.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct NormalizeConfig {
    stats: Vec<FeatureStats>,
}

impl NormalizeConfig {
    pub fn new(stats: Vec<FeatureStats>) -> Self {
        Self { stats }
    }

    pub fn num_features(&self) -> u32 {
        self.stats.len() as u32
    }

    pub fn stats(&self) -> &[FeatureStats] {
        &self.stats
    }

    /// Normalizes a sample in place.
    pub fn apply_in_place(&self, sample: &mut Sample, faults: &mut FaultFlags) {
        let covered = (sample.total_elements() as usize).min(self.stats.len());
        let data = sample.data_mut();
        for i in 0..covered {
            let stat = self.stats[i];
            let centered = sub32(data[i], stat.mean, faults);
            data[i] = mul_q16(centered, stat.inv_std, faults);
        }
        // Elements beyond the table are already in place, untouched.
    }

    /// Normalizes `input` into `output`, copying metadata verbatim.
    pub fn apply(&self, input: &Sample, output: &mut Sample, faults: &mut FaultFlags) {
        output.copy_from(input);
        self.apply_in_place(output, faults);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_dvm::{FIXED_HALF, FIXED_MAX, FIXED_ONE};

    fn stats(pairs: &[(i32, i32)]) -> NormalizeConfig {
        NormalizeConfig::new(
            pairs
                .iter()
                .map(|&(mean, inv_std)| FeatureStats { mean, inv_std })
                .collect(),
        )
    }

    #[test]
    fn centers_and_scales_covered_features() {
        let cfg = stats(&[(FIXED_ONE, 2 * FIXED_ONE), (0, FIXED_HALF)]);
        let input = Sample::new(&[2], vec![2 * FIXED_ONE, FIXED_ONE]).unwrap();
        let mut out = Sample::zeros(&[2]).unwrap();
        let mut faults = FaultFlags::new();

        cfg.apply(&input, &mut out, &mut faults);
        // (2 − 1) · 2 = 2, 1 · 0.5 = 0.5.
        assert_eq!(out.data(), &[2 * FIXED_ONE, FIXED_HALF]);
        assert_eq!(out.shape(), input.shape());
        assert!(!faults.any());
    }

    #[test]
    fn elements_past_the_table_pass_through() {
        let cfg = stats(&[(FIXED_ONE, FIXED_ONE)]);
        let input = Sample::new(&[3], vec![FIXED_ONE, 1234, -5678]).unwrap();
        let mut out = Sample::zeros(&[3]).unwrap();
        let mut faults = FaultFlags::new();

        cfg.apply(&input, &mut out, &mut faults);
        assert_eq!(out.data(), &[0, 1234, -5678]);
    }

    #[test]
    fn saturation_flags_and_continues() {
        let cfg = stats(&[(-FIXED_MAX, FIXED_ONE), (0, FIXED_ONE)]);
        let mut sample = Sample::new(&[2], vec![FIXED_MAX, FIXED_HALF]).unwrap();
        let mut faults = FaultFlags::new();

        cfg.apply_in_place(&mut sample, &mut faults);
        assert_eq!(sample.data()[0], FIXED_MAX);
        // The second element is still processed after the overflow.
        assert_eq!(sample.data()[1], FIXED_HALF);
        assert!(faults.overflow);
    }

    #[test]
    fn in_place_matches_out_of_place() {
        let cfg = stats(&[(100, FIXED_HALF), (200, FIXED_ONE), (300, 2 * FIXED_ONE)]);
        let input = Sample::new(&[3], vec![500, -400, 12345]).unwrap();

        let mut out = Sample::zeros(&[3]).unwrap();
        let mut faults = FaultFlags::new();
        cfg.apply(&input, &mut out, &mut faults);

        let mut in_place = input.clone();
        cfg.apply_in_place(&mut in_place, &mut faults);
        assert_eq!(out, in_place);
        assert!(!faults.any());
    }
}
