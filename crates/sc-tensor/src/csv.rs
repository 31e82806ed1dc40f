// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralCert — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Strict ASCII CSV ingestion.
//!
//! One sample per row, comma-separated plain decimals: optional leading `-`,
//! digits `0-9`, at most one `.`. No exponents, no locale digits, no grouping
//! separators; edge whitespace is trimmed, an empty field is a format fault.
//! Conversion to Q16.16 is exact integer arithmetic — the field is read as
//! the rational (int·10ᵏ + frac) / 10ᵏ, scaled by 65536, and divided with
//! round-to-nearest-even at the tie — so a file parses to identical bits on
//! every platform regardless of locale or float environment.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use sc_dvm::{clamp32, FaultFlags, Fixed};
use tracing::debug;

use crate::io::LoadError;
use crate::sample::Sample;

/// Fractional digits retained during conversion; later digits are dropped.
const MAX_FRAC_DIGITS: u32 = 16;

/// Converts one trimmed decimal field to Q16.16.
///
/// Returns `None` for malformed text (the caller owns error context); range
/// excursions saturate through [`clamp32`] with the usual sticky flags.
fn parse_field(field: &str, faults: &mut FaultFlags) -> Option<Fixed> {
    let bytes = field.as_bytes();
    if bytes.is_empty() || !field.is_ascii() {
        return None;
    }

    let mut idx = 0;
    let negative = bytes[0] == b'-';
    if negative {
        idx = 1;
    }

    let mut int_part: u64 = 0;
    let mut frac_part: u64 = 0;
    let mut frac_scale: u32 = 0;
    let mut digits = 0u32;
    let mut seen_dot = false;

    while idx < bytes.len() {
        match bytes[idx] {
            b @ b'0'..=b'9' => {
                let d = u64::from(b - b'0');
                digits += 1;
                if !seen_dot {
                    // Anything with an integer part beyond the Q16.16 range
                    // saturates later; capping here keeps the accumulator
                    // exact without widening.
                    int_part = int_part.saturating_mul(10).saturating_add(d).min(65536);
                } else if frac_scale < MAX_FRAC_DIGITS {
                    frac_part = frac_part * 10 + d;
                    frac_scale += 1;
                }
            }
            b'.' if !seen_dot => seen_dot = true,
            _ => return None,
        }
        idx += 1;
    }
    if digits == 0 {
        return None;
    }

    let frac_scaled = if frac_scale == 0 {
        0
    } else {
        let num = u128::from(frac_part) << 16;
        let den = 10u128.pow(frac_scale);
        let quot = num / den;
        let rem = num % den;
        // Ties round to even; the integer contribution is always even in
        // the scaled domain, so parity of the fractional quotient decides.
        if rem * 2 > den || (rem * 2 == den && quot & 1 == 1) {
            quot + 1
        } else {
            quot
        }
    };

    let magnitude = ((int_part as i64) << 16) + frac_scaled as i64;
    let value = if negative { -magnitude } else { magnitude };
    Some(clamp32(value, faults))
}

/// Parses one CSV row into Q16.16 values.
pub fn parse_row(line: &str, row: usize, faults: &mut FaultFlags) -> Result<Vec<Fixed>, LoadError> {
    let mut values = Vec::new();
    for (col, raw) in line.split(',').enumerate() {
        let field = raw.trim_matches(|c: char| c.is_ascii_whitespace());
        match parse_field(field, faults) {
            Some(value) => values.push(value),
            None => {
                let err = LoadError::MalformedDecimal {
                    row,
                    col,
                    field: field.to_string(),
                };
                err.mirror(faults);
                return Err(err);
            }
        }
    }
    Ok(values)
}

/// Reads an entire CSV stream into rank-1 samples, one per row.
///
/// Every row must have the width of the first row.
pub fn read_csv<R: BufRead>(reader: R, faults: &mut FaultFlags) -> Result<Vec<Sample>, LoadError> {
    let mut samples = Vec::new();
    let mut width: Option<usize> = None;

    for (row, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| {
            faults.io_error = true;
            LoadError::Io(err)
        })?;
        let values = parse_row(&line, row, faults)?;

        match width {
            None => width = Some(values.len()),
            Some(expected) if expected != values.len() => {
                let err = LoadError::RaggedRow {
                    row,
                    expected,
                    got: values.len(),
                };
                err.mirror(faults);
                return Err(err);
            }
            Some(_) => {}
        }

        let sample = Sample::new(&[values.len() as u32], values).map_err(|err| {
            faults.format_error = true;
            LoadError::Shape(err)
        })?;
        samples.push(sample);
    }

    if samples.is_empty() {
        let err = LoadError::EmptyCsv;
        err.mirror(faults);
        return Err(err);
    }
    Ok(samples)
}

/// Reads a CSV file from disk.
pub fn load_csv(path: &Path, faults: &mut FaultFlags) -> Result<Vec<Sample>, LoadError> {
    let file = File::open(path).map_err(|err| {
        faults.io_error = true;
        LoadError::Io(err)
    })?;
    let samples = read_csv(BufReader::new(file), faults)?;
    debug!(path = %path.display(), rows = samples.len(), "loaded csv dataset");
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_dvm::{FIXED_HALF, FIXED_MAX, FIXED_MIN, FIXED_ONE};

    fn parse_one(text: &str) -> (Option<Fixed>, FaultFlags) {
        let mut faults = FaultFlags::new();
        let value = parse_field(text, &mut faults);
        (value, faults)
    }

    #[test]
    fn plain_decimals_convert_exactly() {
        assert_eq!(parse_one("1").0, Some(FIXED_ONE));
        assert_eq!(parse_one("0.5").0, Some(FIXED_HALF));
        assert_eq!(parse_one("1.5").0, Some(98304));
        assert_eq!(parse_one("-0.5").0, Some(-(FIXED_HALF)));
        assert_eq!(parse_one("-2").0, Some(-2 * FIXED_ONE));
        assert_eq!(parse_one(".25").0, Some(16384));
        assert_eq!(parse_one("3.").0, Some(3 * FIXED_ONE));
    }

    #[test]
    fn smallest_step_is_representable() {
        // 2⁻¹⁶ written out in decimal.
        assert_eq!(parse_one("0.0000152587890625").0, Some(1));
    }

    #[test]
    fn inexact_decimals_round_to_nearest() {
        // 0.1 · 65536 = 6553.6 → 6554.
        assert_eq!(parse_one("0.1").0, Some(6554));
        // 0.3 · 65536 = 19660.8 → 19661.
        assert_eq!(parse_one("0.3").0, Some(19661));
        // 0.2 · 65536 = 13107.2 → 13107.
        assert_eq!(parse_one("-0.2").0, Some(-13107));
    }

    #[test]
    fn out_of_range_values_saturate_with_flags() {
        let (value, faults) = parse_one("40000");
        assert_eq!(value, Some(FIXED_MAX));
        assert!(faults.overflow);

        let (value, faults) = parse_one("-40000.25");
        assert_eq!(value, Some(FIXED_MIN));
        assert!(faults.underflow);

        // −32768.0 is exactly the bottom of the range, no fault.
        let (value, faults) = parse_one("-32768");
        assert_eq!(value, Some(FIXED_MIN));
        assert!(!faults.any());

        let (_, faults) = parse_one("32768");
        assert!(faults.overflow);
    }

    #[test]
    fn malformed_fields_are_rejected() {
        for bad in ["", "-", ".", "1.2.3", "1e5", "1,000", "abc", "½", "1-2"] {
            assert_eq!(parse_one(bad).0, None, "{bad:?} should not parse");
        }
    }

    #[test]
    fn rows_trim_edges_and_flag_empty_fields() {
        let mut faults = FaultFlags::new();
        let values = parse_row(" 1.0 ,\t-2.5 , 3", 0, &mut faults).unwrap();
        assert_eq!(values, vec![65536, -163840, 196608]);
        assert!(!faults.any());

        assert!(matches!(
            parse_row("1.0,,2.0", 0, &mut faults),
            Err(LoadError::MalformedDecimal { col: 1, .. })
        ));
        assert!(faults.format_error);
    }

    #[test]
    fn csv_streams_become_uniform_rank_one_samples() {
        let text = "1.0,2.0\r\n-0.5,0.25\n";
        let mut faults = FaultFlags::new();
        let samples = read_csv(text.as_bytes(), &mut faults).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].shape(), &[2]);
        assert_eq!(samples[0].data(), &[65536, 131072]);
        assert_eq!(samples[1].data(), &[-32768, 16384]);
        assert!(!faults.any());
    }

    #[test]
    fn ragged_rows_are_format_faults() {
        let mut faults = FaultFlags::new();
        assert!(matches!(
            read_csv("1,2\n3\n".as_bytes(), &mut faults),
            Err(LoadError::RaggedRow {
                row: 1,
                expected: 2,
                got: 1
            })
        ));
        assert!(faults.format_error);
    }

    #[test]
    fn empty_input_is_a_format_fault() {
        let mut faults = FaultFlags::new();
        assert!(matches!(
            read_csv("".as_bytes(), &mut faults),
            Err(LoadError::EmptyCsv)
        ));
        assert!(faults.format_error);
    }
}
