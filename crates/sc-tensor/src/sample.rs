// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralCert — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use sc_dvm::Fixed;
use thiserror::Error;

/// Maximum tensor rank. The dimension header always carries this many
/// slots; unused slots are zero.
pub const MAX_DIMS: usize = 4;

/// Maximum number of elements a single sample may hold.
pub const MAX_SAMPLE_ELEMENTS: u32 = 1024 * 1024;

/// Current sample format version.
pub const SAMPLE_VERSION: u32 = 1;

/// Element type tag for Q16.16 fixed point, the only supported dtype.
pub const DTYPE_Q16_16: u32 = 0;

/// Shape violations detected when constructing a sample.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SampleError {
    #[error("sample rank {ndims} is outside 1..=4")]
    InvalidRank { ndims: usize },
    #[error("dimension {axis} is zero")]
    ZeroDim { axis: usize },
    #[error("dims imply {expected} elements but {got} were provided")]
    ElementCountMismatch { expected: u32, got: usize },
    #[error("sample holds {total} elements, above the {max} limit")]
    TooLarge { total: u64, max: u32 },
}

/// A row-major Q16.16 tensor with a fixed-width dimension header.
///
/// Construction validates the shape invariant (the element count equals the
/// product of the used dims) once; afterwards the only mutations offered are
/// shape-preserving element writes and [`crop_to`](Sample::crop_to), both of
/// which keep the invariant. The buffer is sized at construction and reused
/// by [`copy_from`](Sample::copy_from), so steady-state pipeline work does
/// not allocate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    version: u32,
    dtype: u32,
    ndims: u32,
    dims: [u32; MAX_DIMS],
    data: Vec<Fixed>,
}

impl Sample {
    /// Builds a sample from its used dims and element data.
    pub fn new(dims: &[u32], data: Vec<Fixed>) -> Result<Self, SampleError> {
        if dims.is_empty() || dims.len() > MAX_DIMS {
            return Err(SampleError::InvalidRank { ndims: dims.len() });
        }
        let mut header = [0u32; MAX_DIMS];
        let mut total: u64 = 1;
        for (axis, &d) in dims.iter().enumerate() {
            if d == 0 {
                return Err(SampleError::ZeroDim { axis });
            }
            header[axis] = d;
            total *= u64::from(d);
        }
        if total > u64::from(MAX_SAMPLE_ELEMENTS) {
            return Err(SampleError::TooLarge {
                total,
                max: MAX_SAMPLE_ELEMENTS,
            });
        }
        if total != data.len() as u64 {
            return Err(SampleError::ElementCountMismatch {
                expected: total as u32,
                got: data.len(),
            });
        }
        Ok(Self {
            version: SAMPLE_VERSION,
            dtype: DTYPE_Q16_16,
            ndims: dims.len() as u32,
            dims: header,
            data,
        })
    }

    /// A zero-filled sample of the given shape.
    pub fn zeros(dims: &[u32]) -> Result<Self, SampleError> {
        let total: u64 = dims.iter().map(|&d| u64::from(d)).product();
        if total > u64::from(MAX_SAMPLE_ELEMENTS) {
            return Err(SampleError::TooLarge {
                total,
                max: MAX_SAMPLE_ELEMENTS,
            });
        }
        Self::new(dims, vec![0; total as usize])
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn dtype(&self) -> u32 {
        self.dtype
    }

    pub fn ndims(&self) -> u32 {
        self.ndims
    }

    /// The full four-slot dimension header (unused slots are zero).
    pub fn dims(&self) -> &[u32; MAX_DIMS] {
        &self.dims
    }

    /// The used dims.
    pub fn shape(&self) -> &[u32] {
        &self.dims[..self.ndims as usize]
    }

    /// First axis extent.
    pub fn height(&self) -> u32 {
        self.dims[0]
    }

    /// Second axis extent, or 1 for rank-1 samples.
    pub fn width(&self) -> u32 {
        if self.ndims >= 2 {
            self.dims[1]
        } else {
            1
        }
    }

    pub fn total_elements(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn data(&self) -> &[Fixed] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [Fixed] {
        &mut self.data
    }

    /// Overwrites this sample with `src`, reusing the existing buffer when
    /// its capacity suffices.
    pub fn copy_from(&mut self, src: &Sample) {
        self.version = src.version;
        self.dtype = src.dtype;
        self.ndims = src.ndims;
        self.dims = src.dims;
        self.data.clear();
        self.data.extend_from_slice(&src.data);
    }

    /// Shrinks the spatial extent to `height` × `width`, truncating the
    /// element buffer to match. The caller is responsible for having moved
    /// the retained elements to the front (the crop stage does this).
    /// Trailing axes, if any, must have extent 1 for the invariant to hold.
    pub fn crop_to(&mut self, height: u32, width: u32) {
        self.dims[0] = height;
        if self.ndims >= 2 {
            self.dims[1] = width;
        }
        let total = (height as usize) * (width as usize);
        self.data.truncate(total);
        debug_assert_eq!(
            self.shape().iter().map(|&d| d as usize).product::<usize>(),
            self.data.len()
        );
    }
}
