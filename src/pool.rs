use std::ops::Range;

use log::debug;

use crate::*;

/// What the pool does when an append does not fit in the reserved rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Growth {
    /// Reject the append with [`BowErr::CapacityExceeded`].
    Fixed,
    /// Grow the buffer by amortized doubling.
    #[default]
    Double,
}

/// Row-major buffer of `dim`-dimensional descriptors, filled image by image.
///
/// The whole buffer is reserved (and zeroed) up front because the number of descriptors
/// in a corpus is only known after every image was processed. Rows past [`rows`](Self::rows)
/// are never visible downstream: [`finalize`](Self::finalize) trims them off and is the
/// only way to obtain the [`PooledDescriptors`] the vocabulary is built from.
#[derive(Debug)]
pub struct DescriptorPool {
    data: Vec<f32>,
    dim: usize,
    rows: usize,
    growth: Growth,
}

impl DescriptorPool {
    /// Allocate `capacity` zeroed rows of `dim` columns.
    pub fn reserve(capacity: usize, dim: usize, growth: Growth) -> Self {
        assert!(dim > 0, "descriptor dimension must be positive");
        Self {
            data: vec![0.; capacity * dim],
            dim,
            rows: 0,
            growth,
        }
    }

    /// Copy the descriptors of one image into the next free rows.
    ///
    /// Returns the `[start, end)` row range the image occupies. An image without
    /// descriptors gets an empty range at the current end of the pool.
    pub fn append(&mut self, descriptors: &[f32]) -> BowResult<Range<usize>> {
        // Rows are flattened, so the length has to be a whole number of rows
        if descriptors.len() % self.dim != 0 {
            return Err(BowErr::DimensionMismatch {
                expected: self.dim,
                found: descriptors.len(),
            });
        }
        let n = descriptors.len() / self.dim;
        let start = self.rows;
        let end = start + n;

        if end > self.capacity() {
            match self.growth {
                Growth::Fixed => {
                    return Err(BowErr::CapacityExceeded {
                        capacity: self.capacity(),
                        requested: end,
                    })
                }
                Growth::Double => {
                    let new_capacity = end.max(self.capacity() * 2);
                    debug!(
                        "Growing descriptor pool from {} to {} rows",
                        self.capacity(),
                        new_capacity
                    );
                    self.data.resize(new_capacity * self.dim, 0.);
                }
            }
        }

        self.data[start * self.dim..end * self.dim].copy_from_slice(descriptors);
        self.rows = end;
        Ok(start..end)
    }

    /// Trim the pool to the rows actually written and release the unused tail.
    pub fn finalize(mut self) -> PooledDescriptors {
        self.data.truncate(self.rows * self.dim);
        self.data.shrink_to_fit();
        PooledDescriptors {
            data: self.data,
            dim: self.dim,
        }
    }

    /// Number of occupied rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of rows currently backed by the buffer.
    pub fn capacity(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn dim(&self) -> usize {
        self.dim
    }
}

/// Descriptor pool after trimming; every row was written by some image.
#[derive(Debug, Clone, PartialEq)]
pub struct PooledDescriptors {
    data: Vec<f32>,
    dim: usize,
}

impl PooledDescriptors {
    pub fn rows(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}
