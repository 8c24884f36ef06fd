//! # Compact Distance Vectors
//!
//! Stores the strict lower triangle of a square, symmetric relation matrix (typically
//! pairwise distances) as a flat vector of length `n(n-1)/2`, column by column:
//!
//! ```text
//! [m(1,0), m(2,0), .., m(n-1,0), m(2,1), .., m(n-1,1), .., m(n-1,n-2)]
//! ```
//!
//! This is the canonical ordering expected by hierarchical clustering routines. The
//! diagonal is assumed to be zero and the upper triangle to mirror the lower one.

use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::{AlgebraError, Result};

/// Describes how a [`CondensedMatrix`] maps back onto the full matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistMetadata {
    /// Dimension of the full square matrix.
    pub size: usize,
    /// Whether the diagonal is stored. Always `false`.
    pub diagonal: bool,
    /// Whether the upper triangle is stored. Always `false`.
    pub upper: bool,
}

/// Strict lower triangle of an `n × n` matrix in column-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct CondensedMatrix {
    values: Array1<f64>,
    size: usize,
}

/// Number of strictly-lower entries of an `n × n` matrix.
fn condensed_len(size: usize) -> usize {
    size * size.saturating_sub(1) / 2
}

impl CondensedMatrix {
    /// Wraps an existing condensed vector of a `size × size` matrix.
    ///
    /// # Errors
    /// [`AlgebraError::DimensionMismatch`] if `values.len() != size * (size - 1) / 2`.
    pub fn from_vec(size: usize, values: Vec<f64>) -> Result<Self> {
        let expected = condensed_len(size);
        if values.len() != expected {
            return Err(AlgebraError::dimension_mismatch(
                "condensed vector length",
                expected,
                values.len(),
            ));
        }
        Ok(CondensedMatrix {
            values: Array1::from(values),
            size,
        })
    }

    pub fn values(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }

    pub fn into_values(self) -> Array1<f64> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn metadata(&self) -> DistMetadata {
        DistMetadata {
            size: self.size,
            diagonal: false,
            upper: false,
        }
    }

    /// Position of entry `(i, j)` in the condensed vector.
    ///
    /// The pair is unordered: `(i, j)` and `(j, i)` share an offset. Returns `None` on the
    /// diagonal or when an index is out of range.
    pub fn offset(&self, i: usize, j: usize) -> Option<usize> {
        if i >= self.size || j >= self.size || i == j {
            return None;
        }
        let (row, col) = if i > j { (i, j) } else { (j, i) };
        // Columns before `col` hold (n-1) + (n-2) + .. + (n-col) entries
        Some(col * self.size - col * (col + 1) / 2 + (row - col - 1))
    }

    /// Inverse of [`offset`](Self::offset): the `(row, col)` pair stored at `offset`,
    /// with `row > col`.
    pub fn index_of(&self, offset: usize) -> Option<(usize, usize)> {
        if offset >= self.len() {
            return None;
        }
        let mut remaining = offset;
        for col in 0..self.size {
            let in_column = self.size - col - 1;
            if remaining < in_column {
                return Some((col + 1 + remaining, col));
            }
            remaining -= in_column;
        }
        None
    }

    /// Entry `(i, j)` of the full symmetric matrix; the diagonal reads as zero.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i >= self.size || j >= self.size {
            return None;
        }
        if i == j {
            return Some(0.0);
        }
        self.offset(i, j).map(|k| self.values[k])
    }

    /// Iterates over `((row, col), value)` in storage order.
    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), f64)> + '_ {
        let n = self.size;
        (0..n)
            .flat_map(move |col| ((col + 1)..n).map(move |row| (row, col)))
            .zip(self.values.iter().copied())
    }

    /// Rebuilds the full symmetric matrix with a zero diagonal.
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::<f64>::zeros((self.size, self.size));
        for ((row, col), value) in self.iter() {
            dense[[row, col]] = value;
            dense[[col, row]] = value;
        }
        dense
    }
}

/// Extracts the strict lower triangle of a square matrix.
///
/// Entries are emitted column by column: for each column `j` in `0..n-1`, rows `j+1..n`.
/// A matrix of dimension 0 or 1 yields an empty vector.
///
/// # Errors
/// [`AlgebraError::DimensionMismatch`] if the matrix is not square.
pub fn as_dist(matrix: ArrayView2<f64>) -> Result<CondensedMatrix> {
    let (n, ncols) = matrix.dim();
    if n != ncols {
        return Err(AlgebraError::dimension_mismatch(
            "distance matrix columns",
            n,
            ncols,
        ));
    }
    debug!("Condensing a {}x{} matrix", n, n);

    let mut values = Vec::with_capacity(condensed_len(n));
    for j in 0..n.saturating_sub(1) {
        for i in (j + 1)..n {
            values.push(matrix[[i, j]]);
        }
    }

    Ok(CondensedMatrix {
        values: Array1::from(values),
        size: n,
    })
}
