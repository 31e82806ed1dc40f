// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralCert — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Deterministic augmentation chain.
//!
//! Stages always run in the same order — crop, horizontal flip, vertical
//! flip, brightness, additive noise — and every stage performs its PRF
//! draws whether or not it is enabled. A disabled stage discards the draws
//! and applies the identity (the crop stage falls back to centre
//! placement), so the randomness each stage sees depends only on
//! `(seed, epoch, sample_idx)` and the sample shape, never on which flags
//! happen to be on. Toggling one augmentation can therefore never reshuffle
//! another's behaviour between runs.
//!
//! Each draw is addressed by a packed op id:
//! `(sample_idx & 0xFFFF) << 16 | augment_id << 8 | (element & 0xFF)`,
//! with `element` zero for whole-sample draws. The packing is part of the
//! replay contract.
//!
//! Geometric stages (crop and the flips) treat a sample as `dims[0]` rows of
//! `dims[1]` columns and require that view to cover every element; samples
//! of deeper rank pass through those stages unchanged (draws still happen).
//! Photometric stages are element-wise and apply at any rank.

use sc_dvm::{add32, mul64, prf, prf_uniform, round_shift_rne, FaultFlags, Fixed, FIXED_ONE};
use sc_tensor::Sample;
use serde::{Deserialize, Serialize};

/// Stable augmentation id bytes used in op-id packing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AugmentOp {
    HorizontalFlip = 0x01,
    VerticalFlip = 0x02,
    CropY = 0x03,
    CropX = 0x04,
    Brightness = 0x05,
    Noise = 0x06,
}

/// Packs a PRF op id for one augmentation draw.
pub fn op_id(sample_idx: u32, op: AugmentOp, element: u32) -> u32 {
    (sample_idx & 0xFFFF) << 16 | u32::from(op as u8) << 8 | (element & 0xFF)
}

/// Augmentation settings.
///
/// Crop extents of zero (or larger than the sample) mean "full extent", so
/// an unconfigured crop is the identity. The crop geometry applies whenever
/// it is configured; the `random_crop` flag only chooses between a drawn
/// and a centred placement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    pub h_flip: bool,
    pub v_flip: bool,
    pub random_crop: bool,
    pub additive_noise: bool,
    pub brightness: bool,
    pub crop_height: u32,
    pub crop_width: u32,
    /// Noise amplitude (Q16.16).
    pub noise_std: Fixed,
    /// Maximum relative brightness excursion (Q16.16).
    pub brightness_delta: Fixed,
}

fn effective_extent(requested: u32, extent: u32) -> u32 {
    if requested == 0 || requested > extent {
        extent
    } else {
        requested
    }
}

/// Maps a raw draw to a signed 16-bit excursion in [−32768, 32767].
fn low_word_signed(r: u64) -> i32 {
    ((r & 0xFFFF) as i32) - 32768
}

/// Runs the full augmentation chain for one sample.
///
/// `sample_idx` is the sample's global position in the epoch (batch index ×
/// batch capacity + slot), which makes every draw replayable in isolation.
pub fn augment_sample(
    cfg: &AugmentConfig,
    seed: u64,
    epoch: u32,
    sample_idx: u32,
    input: &Sample,
    output: &mut Sample,
    faults: &mut FaultFlags,
) {
    output.copy_from(input);

    let height = input.height();
    let width = input.width();
    let spatial =
        u64::from(height) * u64::from(width) == u64::from(input.total_elements());

    // Crop: both offsets are always drawn; the flag only decides whether
    // they are used or replaced by the centred placement.
    let crop_h = effective_extent(cfg.crop_height, height);
    let crop_w = effective_extent(cfg.crop_width, width);
    let max_y = height - crop_h;
    let max_x = width - crop_w;
    let drawn_y = prf_uniform(
        seed,
        epoch,
        op_id(sample_idx, AugmentOp::CropY, 0),
        max_y + 1,
        faults,
    );
    let drawn_x = prf_uniform(
        seed,
        epoch,
        op_id(sample_idx, AugmentOp::CropX, 0),
        max_x + 1,
        faults,
    );
    if spatial && (crop_h != height || crop_w != width) {
        let (offset_y, offset_x) = if cfg.random_crop {
            (drawn_y, drawn_x)
        } else {
            (max_y / 2, max_x / 2)
        };
        crop_in_place(output, width, crop_h, crop_w, offset_y, offset_x);
    }
    let height = output.height();
    let width = output.width();

    // Horizontal flip: decision is the low bit of one draw.
    let flip_h =
        prf(seed, epoch, op_id(sample_idx, AugmentOp::HorizontalFlip, 0)) & 1 == 1;
    if cfg.h_flip && flip_h && spatial {
        let w = width as usize;
        let data = output.data_mut();
        for row in 0..height as usize {
            data[row * w..(row + 1) * w].reverse();
        }
    }

    // Vertical flip: symmetric over rows.
    let flip_v = prf(seed, epoch, op_id(sample_idx, AugmentOp::VerticalFlip, 0)) & 1 == 1;
    if cfg.v_flip && flip_v && spatial {
        let w = width as usize;
        let rows = height as usize;
        let data = output.data_mut();
        for row in 0..rows / 2 {
            let (top, bottom) = (row * w, (rows - 1 - row) * w);
            for col in 0..w {
                data.swap(top + col, bottom + col);
            }
        }
    }

    // Brightness: one draw scales every element by 1 + excursion·delta.
    let r = prf(seed, epoch, op_id(sample_idx, AugmentOp::Brightness, 0));
    if cfg.brightness {
        let offset = round_shift_rne(mul64(low_word_signed(r), cfg.brightness_delta), 15, faults);
        let factor = add32(FIXED_ONE, offset, faults);
        for value in output.data_mut() {
            *value = round_shift_rne(mul64(*value, factor), 16, faults);
        }
    }

    // Additive noise: one draw per element, applied post-crop.
    let data = output.data_mut();
    for i in 0..data.len() {
        let r = prf(
            seed,
            epoch,
            op_id(sample_idx, AugmentOp::Noise, i as u32),
        );
        if cfg.additive_noise {
            let noise = round_shift_rne(mul64(low_word_signed(r), cfg.noise_std), 15, faults);
            data[i] = add32(data[i], noise, faults);
        }
    }
}

/// Moves the retained window to the front of the buffer and shrinks the
/// shape. Forward copy is safe in place: every source index is at or after
/// its destination.
fn crop_in_place(
    sample: &mut Sample,
    src_width: u32,
    crop_h: u32,
    crop_w: u32,
    offset_y: u32,
    offset_x: u32,
) {
    let sw = src_width as usize;
    let cw = crop_w as usize;
    let data = sample.data_mut();
    for y in 0..crop_h as usize {
        let src = (y + offset_y as usize) * sw + offset_x as usize;
        let dst = y * cw;
        for x in 0..cw {
            data[dst + x] = data[src + x];
        }
    }
    sample.crop_to(crop_h, crop_w);
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: u64 = 0x0123_4567_89AB_CDEF;

    fn grid4() -> Sample {
        Sample::new(&[4, 4], (0..16).collect()).unwrap()
    }

    fn run(cfg: &AugmentConfig, seed: u64, epoch: u32, idx: u32, input: &Sample) -> Sample {
        let mut out = Sample::zeros(&[1]).unwrap();
        let mut faults = FaultFlags::new();
        augment_sample(cfg, seed, epoch, idx, input, &mut out, &mut faults);
        assert!(!faults.any());
        out
    }

    #[test]
    fn op_ids_pack_the_documented_layout() {
        assert_eq!(op_id(0x0003, AugmentOp::CropY, 0), 0x0003_0300);
        assert_eq!(op_id(0x0003, AugmentOp::Noise, 0x17), 0x0003_0617);
        // Only the low bytes of sample and element survive.
        assert_eq!(
            op_id(0x0001_0002, AugmentOp::Brightness, 0x0101),
            0x0002_0501
        );
    }

    #[test]
    fn all_disabled_is_the_identity() {
        let input = grid4();
        let out = run(&AugmentConfig::default(), SEED, 0, 0, &input);
        assert_eq!(out, input);
    }

    #[test]
    fn augmentation_is_deterministic() {
        let cfg = AugmentConfig {
            h_flip: true,
            v_flip: true,
            additive_noise: true,
            noise_std: 1000,
            ..AugmentConfig::default()
        };
        let input = grid4();
        let a = run(&cfg, SEED, 3, 7, &input);
        let b = run(&cfg, SEED, 3, 7, &input);
        assert_eq!(a, b);
        assert_ne!(run(&cfg, SEED, 4, 7, &input), a);
    }

    #[test]
    fn disabled_crop_uses_the_centre() {
        let cfg = AugmentConfig {
            crop_height: 2,
            crop_width: 2,
            ..AugmentConfig::default()
        };
        let out = run(&cfg, SEED, 0, 0, &grid4());
        assert_eq!(out.shape(), &[2, 2]);
        // Centre window of a 4×4 grid with a 2×2 crop starts at (1, 1).
        assert_eq!(out.data(), &[5, 6, 9, 10]);
    }

    #[test]
    fn random_crop_matches_its_draws() {
        let cfg = AugmentConfig {
            random_crop: true,
            crop_height: 2,
            crop_width: 3,
            ..AugmentConfig::default()
        };
        let input = grid4();
        let mut faults = FaultFlags::new();
        let oy = prf_uniform(SEED, 1, op_id(9, AugmentOp::CropY, 0), 3, &mut faults);
        let ox = prf_uniform(SEED, 1, op_id(9, AugmentOp::CropX, 0), 2, &mut faults);

        let out = run(&cfg, SEED, 1, 9, &input);
        assert_eq!(out.shape(), &[2, 3]);
        let expected: Vec<i32> = (0..2)
            .flat_map(|y| (0..3).map(move |x| ((y + oy) * 4 + x + ox) as i32))
            .collect();
        assert_eq!(out.data(), expected.as_slice());
    }

    #[test]
    fn horizontal_flip_reverses_rows_when_drawn() {
        let cfg = AugmentConfig {
            h_flip: true,
            ..AugmentConfig::default()
        };
        let input = grid4();
        // Find an epoch whose decision bit is set, then pin the behaviour.
        let epoch = (0..64)
            .find(|&e| prf(SEED, e, op_id(0, AugmentOp::HorizontalFlip, 0)) & 1 == 1)
            .expect("some epoch flips");
        let out = run(&cfg, SEED, epoch, 0, &input);
        assert_eq!(&out.data()[..4], &[3, 2, 1, 0]);
        assert_eq!(&out.data()[12..], &[15, 14, 13, 12]);
    }

    #[test]
    fn vertical_flip_reverses_a_vector() {
        let cfg = AugmentConfig {
            v_flip: true,
            ..AugmentConfig::default()
        };
        let input = Sample::new(&[4], vec![1, 2, 3, 4]).unwrap();
        let epoch = (0..64)
            .find(|&e| prf(SEED, e, op_id(0, AugmentOp::VerticalFlip, 0)) & 1 == 1)
            .expect("some epoch flips");
        let out = run(&cfg, SEED, epoch, 0, &input);
        assert_eq!(out.data(), &[4, 3, 2, 1]);
    }

    #[test]
    fn unflipped_draws_leave_data_alone() {
        let cfg = AugmentConfig {
            h_flip: true,
            ..AugmentConfig::default()
        };
        let input = grid4();
        let epoch = (0..64)
            .find(|&e| prf(SEED, e, op_id(0, AugmentOp::HorizontalFlip, 0)) & 1 == 0)
            .expect("some epoch does not flip");
        assert_eq!(run(&cfg, SEED, epoch, 0, &input), input);
    }

    #[test]
    fn noise_is_applied_per_element() {
        let cfg = AugmentConfig {
            additive_noise: true,
            noise_std: 65536,
            ..AugmentConfig::default()
        };
        let input = grid4();
        let out = run(&cfg, SEED, 0, 0, &input);
        assert_eq!(out.shape(), input.shape());
        assert_ne!(out, input);

        let mut faults = FaultFlags::new();
        let r = prf(SEED, 0, op_id(0, AugmentOp::Noise, 5));
        let expected = add32(
            input.data()[5],
            round_shift_rne(mul64(low_word_signed(r), 65536), 15, &mut faults),
            &mut faults,
        );
        assert_eq!(out.data()[5], expected);
    }

    #[test]
    fn zero_amplitude_stages_are_identities_with_identical_draws() {
        // Enabling a stage at zero amplitude must reproduce the disabled
        // output bit for bit: the draws are shared, only the arithmetic
        // differs, and at zero amplitude the arithmetic is exact identity.
        let input = grid4();
        let base = AugmentConfig {
            h_flip: true,
            ..AugmentConfig::default()
        };
        let widened = AugmentConfig {
            additive_noise: true,
            noise_std: 0,
            brightness: true,
            brightness_delta: 0,
            ..base
        };
        for epoch in 0..8 {
            assert_eq!(
                run(&base, SEED, epoch, 2, &input),
                run(&widened, SEED, epoch, 2, &input),
                "epoch {epoch}"
            );
        }
    }

    #[test]
    fn deep_rank_samples_skip_geometric_stages() {
        let cfg = AugmentConfig {
            h_flip: true,
            v_flip: true,
            random_crop: true,
            crop_height: 1,
            crop_width: 1,
            ..AugmentConfig::default()
        };
        let input = Sample::new(&[2, 2, 2], (0..8).collect()).unwrap();
        let out = run(&cfg, SEED, 0, 0, &input);
        assert_eq!(out, input);
    }
}
