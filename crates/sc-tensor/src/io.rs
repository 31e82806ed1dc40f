// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralCert — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Binary tensor and statistics formats.
//!
//! Both formats are little-endian throughout and carry a fixed-width header,
//! so a conforming file parses identically on every platform. Loader
//! failures are reported twice on purpose: as a typed [`LoadError`] for the
//! call site, and as a sticky `io_error` / `format_error` flag for the
//! end-of-run accounting.
//!
//! Tensor file: `"TENS"` ‖ version u8 ‖ dtype u8 ‖ ndims u8 ‖ pad u8 ‖
//! four u32 dims (unused slots zero) ‖ elements as i32.
//!
//! Statistics file: `"STAT"` ‖ version u8 ‖ num_channels u8 ‖ pad u8×2 ‖
//! per channel: mean i32 ‖ inv_std i32.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use sc_dvm::{FaultFlags, Fixed};
use thiserror::Error;
use tracing::debug;

use crate::sample::{Sample, SampleError, DTYPE_Q16_16, MAX_DIMS, MAX_SAMPLE_ELEMENTS};
use crate::FeatureStats;

/// Magic prefix of a tensor file.
pub const TENSOR_MAGIC: [u8; 4] = *b"TENS";
/// Magic prefix of a statistics file.
pub const STATS_MAGIC: [u8; 4] = *b"STAT";
/// On-disk format version accepted by the loaders.
pub const FORMAT_VERSION: u8 = 1;

/// Loader failures, all mirrored into [`FaultFlags`] as well.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad magic {found:?}, expected {expected:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),
    #[error("unsupported dtype {0}")]
    UnsupportedDtype(u8),
    #[error("invalid sample shape: {0}")]
    Shape(#[from] SampleError),
    #[error("malformed decimal {field:?} at row {row}, field {col}")]
    MalformedDecimal {
        row: usize,
        col: usize,
        field: String,
    },
    #[error("row {row} has {got} fields, previous rows have {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("no rows in csv input")]
    EmptyCsv,
}

impl LoadError {
    /// Records this failure in the sticky flag set.
    pub(crate) fn mirror(&self, faults: &mut FaultFlags) {
        match self {
            LoadError::Io(_) => faults.io_error = true,
            _ => faults.format_error = true,
        }
    }
}

fn read_exact<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    faults: &mut FaultFlags,
) -> Result<(), LoadError> {
    reader.read_exact(buf).map_err(|err| {
        let err = LoadError::from(err);
        err.mirror(faults);
        err
    })
}

/// Parses one sample from a tensor stream.
pub fn read_sample<R: Read>(reader: &mut R, faults: &mut FaultFlags) -> Result<Sample, LoadError> {
    let mut header = [0u8; 8];
    read_exact(reader, &mut header, faults)?;

    let fail = |err: LoadError, faults: &mut FaultFlags| {
        err.mirror(faults);
        err
    };

    let magic = [header[0], header[1], header[2], header[3]];
    if magic != TENSOR_MAGIC {
        return Err(fail(
            LoadError::BadMagic {
                expected: TENSOR_MAGIC,
                found: magic,
            },
            faults,
        ));
    }
    if header[4] != FORMAT_VERSION {
        return Err(fail(LoadError::UnsupportedVersion(header[4]), faults));
    }
    if u32::from(header[5]) != DTYPE_Q16_16 {
        return Err(fail(LoadError::UnsupportedDtype(header[5]), faults));
    }
    let ndims = header[6] as usize;
    if ndims == 0 || ndims > MAX_DIMS {
        return Err(fail(
            LoadError::Shape(SampleError::InvalidRank { ndims }),
            faults,
        ));
    }

    let mut dim_bytes = [0u8; 4 * MAX_DIMS];
    read_exact(reader, &mut dim_bytes, faults)?;
    let mut dims = [0u32; MAX_DIMS];
    for (slot, chunk) in dims.iter_mut().zip(dim_bytes.chunks_exact(4)) {
        *slot = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }

    let used = &dims[..ndims];
    let mut total: u64 = 1;
    for (axis, &d) in used.iter().enumerate() {
        if d == 0 {
            return Err(fail(LoadError::Shape(SampleError::ZeroDim { axis }), faults));
        }
        total *= u64::from(d);
    }
    if total > u64::from(MAX_SAMPLE_ELEMENTS) {
        return Err(fail(
            LoadError::Shape(SampleError::TooLarge {
                total,
                max: MAX_SAMPLE_ELEMENTS,
            }),
            faults,
        ));
    }

    let mut payload = vec![0u8; total as usize * 4];
    read_exact(reader, &mut payload, faults)?;
    let data: Vec<Fixed> = payload
        .chunks_exact(4)
        .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    let sample = Sample::new(used, data).map_err(|err| fail(LoadError::Shape(err), faults))?;
    Ok(sample)
}

/// Serializes one sample in the tensor format.
pub fn write_sample<W: Write>(writer: &mut W, sample: &Sample) -> Result<(), LoadError> {
    writer.write_all(&TENSOR_MAGIC)?;
    writer.write_all(&[
        FORMAT_VERSION,
        sample.dtype() as u8,
        sample.ndims() as u8,
        0,
    ])?;
    for dim in sample.dims() {
        writer.write_all(&dim.to_le_bytes())?;
    }
    for value in sample.data() {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

/// Reads a tensor file from disk.
pub fn load_sample(path: &Path, faults: &mut FaultFlags) -> Result<Sample, LoadError> {
    let file = File::open(path).map_err(|err| {
        let err = LoadError::from(err);
        err.mirror(faults);
        err
    })?;
    let sample = read_sample(&mut BufReader::new(file), faults)?;
    debug!(
        path = %path.display(),
        shape = ?sample.shape(),
        "loaded tensor file"
    );
    Ok(sample)
}

/// Parses per-channel normalization statistics from a stream.
pub fn read_stats<R: Read>(
    reader: &mut R,
    faults: &mut FaultFlags,
) -> Result<Vec<FeatureStats>, LoadError> {
    let mut header = [0u8; 8];
    read_exact(reader, &mut header, faults)?;

    let magic = [header[0], header[1], header[2], header[3]];
    if magic != STATS_MAGIC {
        let err = LoadError::BadMagic {
            expected: STATS_MAGIC,
            found: magic,
        };
        err.mirror(faults);
        return Err(err);
    }
    if header[4] != FORMAT_VERSION {
        let err = LoadError::UnsupportedVersion(header[4]);
        err.mirror(faults);
        return Err(err);
    }
    let num_channels = header[5] as usize;

    let mut body = vec![0u8; num_channels * 8];
    read_exact(reader, &mut body, faults)?;
    let stats = body
        .chunks_exact(8)
        .map(|chunk| FeatureStats {
            mean: i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
            inv_std: i32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]),
        })
        .collect();
    Ok(stats)
}

/// Serializes per-channel statistics. Channel counts above 255 do not fit
/// the format.
pub fn write_stats<W: Write>(writer: &mut W, stats: &[FeatureStats]) -> Result<(), LoadError> {
    writer.write_all(&STATS_MAGIC)?;
    writer.write_all(&[FORMAT_VERSION, stats.len().min(255) as u8, 0, 0])?;
    for stat in stats.iter().take(255) {
        writer.write_all(&stat.mean.to_le_bytes())?;
        writer.write_all(&stat.inv_std.to_le_bytes())?;
    }
    Ok(())
}

/// Reads a statistics file from disk.
pub fn load_stats(path: &Path, faults: &mut FaultFlags) -> Result<Vec<FeatureStats>, LoadError> {
    let file = File::open(path).map_err(|err| {
        let err = LoadError::from(err);
        err.mirror(faults);
        err
    })?;
    let stats = read_stats(&mut BufReader::new(file), faults)?;
    debug!(path = %path.display(), channels = stats.len(), "loaded statistics file");
    Ok(stats)
}

/// Writes a tensor file to disk, for tooling and tests.
pub fn store_sample(path: &Path, sample: &Sample) -> Result<(), LoadError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_sample(&mut writer, sample)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor_bytes(sample: &Sample) -> Vec<u8> {
        let mut bytes = Vec::new();
        write_sample(&mut bytes, sample).unwrap();
        bytes
    }

    #[test]
    fn sample_survives_serialization() {
        let sample = Sample::new(&[2, 3], vec![1, -2, 3, -4, 5, -6]).unwrap();
        let bytes = tensor_bytes(&sample);
        assert_eq!(&bytes[..4], b"TENS");
        assert_eq!(bytes.len(), 8 + 16 + 6 * 4);

        let mut faults = FaultFlags::new();
        let parsed = read_sample(&mut bytes.as_slice(), &mut faults).unwrap();
        assert_eq!(parsed, sample);
        assert!(!faults.any());
    }

    #[test]
    fn bad_magic_is_a_format_fault() {
        let sample = Sample::zeros(&[2]).unwrap();
        let mut bytes = tensor_bytes(&sample);
        bytes[0] = b'X';
        let mut faults = FaultFlags::new();
        assert!(matches!(
            read_sample(&mut bytes.as_slice(), &mut faults),
            Err(LoadError::BadMagic { .. })
        ));
        assert!(faults.format_error);
        assert!(!faults.io_error);
    }

    #[test]
    fn truncated_payload_is_an_io_fault() {
        let sample = Sample::new(&[2, 2], vec![1, 2, 3, 4]).unwrap();
        let bytes = tensor_bytes(&sample);
        let mut faults = FaultFlags::new();
        assert!(matches!(
            read_sample(&mut &bytes[..bytes.len() - 3], &mut faults),
            Err(LoadError::Io(_))
        ));
        assert!(faults.io_error);
    }

    #[test]
    fn wrong_version_and_dtype_are_rejected() {
        let sample = Sample::zeros(&[1]).unwrap();
        let mut faults = FaultFlags::new();

        let mut bytes = tensor_bytes(&sample);
        bytes[4] = 9;
        assert!(matches!(
            read_sample(&mut bytes.as_slice(), &mut faults),
            Err(LoadError::UnsupportedVersion(9))
        ));

        let mut bytes = tensor_bytes(&sample);
        bytes[5] = 7;
        assert!(matches!(
            read_sample(&mut bytes.as_slice(), &mut faults),
            Err(LoadError::UnsupportedDtype(7))
        ));
        assert!(faults.format_error);
    }

    #[test]
    fn oversized_header_refuses_before_allocating() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"TENS");
        bytes.extend_from_slice(&[FORMAT_VERSION, 0, 2, 0]);
        for dim in [u32::MAX, u32::MAX, 0, 0] {
            bytes.extend_from_slice(&dim.to_le_bytes());
        }
        let mut faults = FaultFlags::new();
        assert!(matches!(
            read_sample(&mut bytes.as_slice(), &mut faults),
            Err(LoadError::Shape(SampleError::TooLarge { .. }))
        ));
        assert!(faults.format_error);
    }

    #[test]
    fn stats_survive_serialization() {
        let stats = vec![
            FeatureStats {
                mean: 65536,
                inv_std: 32768,
            },
            FeatureStats {
                mean: -5,
                inv_std: 131072,
            },
        ];
        let mut bytes = Vec::new();
        write_stats(&mut bytes, &stats).unwrap();
        assert_eq!(&bytes[..4], b"STAT");

        let mut faults = FaultFlags::new();
        let parsed = read_stats(&mut bytes.as_slice(), &mut faults).unwrap();
        assert_eq!(parsed, stats);
        assert!(!faults.any());
    }

    #[test]
    fn truncated_stats_body_is_an_io_fault() {
        let stats = vec![FeatureStats {
            mean: 1,
            inv_std: 2,
        }];
        let mut bytes = Vec::new();
        write_stats(&mut bytes, &stats).unwrap();
        let mut faults = FaultFlags::new();
        assert!(matches!(
            read_stats(&mut &bytes[..bytes.len() - 1], &mut faults),
            Err(LoadError::Io(_))
        ));
        assert!(faults.io_error);
    }
}
