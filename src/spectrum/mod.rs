//! # Symmetric Spectrum
//!
//! Eigendecomposition of a symmetric matrix, ordered by decreasing eigenvalue.
//!
//! The output layout follows what the clustering workflow consumes: `values[i]` is the
//! i-th largest eigenvalue and `vectors.row(i)` is its eigenvector. Eigenvector signs are
//! fixed by a [`SignConvention`]; the default negates the solver's native sign.
//!
//! Only the lower triangle (including the diagonal) of the input is read.

use log::debug;
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use nshare::IntoNalgebra;
use std::sync::Arc;

use crate::error::{AlgebraError, Result};

/// Backend computing a symmetric eigendecomposition.
pub trait EigenSolver: Send + Sync {
    /// Returns the eigenvalues and the eigenvectors (as columns) in the solver's own order.
    fn decompose(&self, matrix: DMatrix<f64>) -> Result<(DVector<f64>, DMatrix<f64>)>;
}

/// Pure-Rust solver from `nalgebra` (implicit symmetric QR).
#[derive(Debug, Clone, Copy, Default)]
pub struct NalgebraEigen;

impl EigenSolver for NalgebraEigen {
    fn decompose(&self, matrix: DMatrix<f64>) -> Result<(DVector<f64>, DMatrix<f64>)> {
        let eigen = nalgebra::SymmetricEigen::new(matrix);
        Ok((eigen.eigenvalues, eigen.eigenvectors))
    }
}

/// LAPACK `dsyev` through `nalgebra-lapack`.
#[cfg(feature = "lapack")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LapackEigen;

#[cfg(feature = "lapack")]
impl EigenSolver for LapackEigen {
    fn decompose(&self, matrix: DMatrix<f64>) -> Result<(DVector<f64>, DMatrix<f64>)> {
        let eigen = nalgebra_lapack::SymmetricEigen::try_new(matrix).ok_or_else(|| {
            AlgebraError::decomposition_failed("LAPACK dsyev did not converge")
        })?;
        Ok((eigen.eigenvalues, eigen.eigenvectors))
    }
}

/// How eigenvector signs are fixed after sorting.
///
/// Eigenvectors are only defined up to sign. `Negated` reproduces the convention existing
/// consumers were built against; the others are equally valid deterministic choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignConvention {
    /// Negate every coefficient relative to the solver's output.
    Negated,
    /// Keep the solver's output as is.
    Native,
    /// Flip each eigenvector so that its largest-magnitude coefficient is positive.
    PositiveDominant,
}

impl Default for SignConvention {
    fn default() -> Self {
        Self::Negated
    }
}

/// Eigenvalues in decreasing order and their eigenvectors, one per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub values: Array1<f64>,
    pub vectors: Array2<f64>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Eigenvector belonging to `values[i]`.
    ///
    /// # Panics
    /// If `i >= self.len()`.
    pub fn axis(&self, i: usize) -> ArrayView1<'_, f64> {
        self.vectors.row(i)
    }

    /// Iterates over `(eigenvalue, eigenvector)` pairs, largest eigenvalue first.
    pub fn pairs(&self) -> impl Iterator<Item = (f64, ArrayView1<'_, f64>)> + '_ {
        self.values.iter().copied().zip(self.vectors.rows())
    }

    /// Share of the total eigenvalue sum carried by each axis.
    ///
    /// Returns zeros when the eigenvalues do not sum to a positive number.
    pub fn explained_variance_ratio(&self) -> Array1<f64> {
        let total = self.values.sum();
        if total > 0.0 {
            &self.values / total
        } else {
            Array1::zeros(self.values.len())
        }
    }
}

pub struct SpectrumBuilder<S: EigenSolver> {
    solver: Arc<S>,
    sign_convention: SignConvention,
}

impl<S: EigenSolver> SpectrumBuilder<S> {
    pub fn new(solver: S) -> Self {
        SpectrumBuilder {
            solver: Arc::new(solver),
            sign_convention: SignConvention::default(),
        }
    }

    pub fn sign_convention(mut self, sign_convention: SignConvention) -> Self {
        self.sign_convention = sign_convention;
        self
    }

    pub fn build(self) -> SymmetricSpectrum<S> {
        SymmetricSpectrum {
            solver: self.solver,
            sign_convention: self.sign_convention,
        }
    }
}

/// Configured symmetric eigendecomposition.
pub struct SymmetricSpectrum<S: EigenSolver> {
    solver: Arc<S>,
    sign_convention: SignConvention,
}

impl Default for SymmetricSpectrum<NalgebraEigen> {
    fn default() -> Self {
        SpectrumBuilder::new(NalgebraEigen).build()
    }
}

impl<S: EigenSolver> SymmetricSpectrum<S> {
    pub fn sign_convention(&self) -> SignConvention {
        self.sign_convention
    }

    /// Decomposes a symmetric `p × p` matrix.
    ///
    /// Ties between equal eigenvalues keep the reverse of the solver's order, which is
    /// implementation-defined.
    ///
    /// # Errors
    /// - [`AlgebraError::DimensionMismatch`] if the matrix is not square
    /// - [`AlgebraError::NonFiniteInput`] if any entry is NaN or infinite
    pub fn compute(&self, matrix: ArrayView2<f64>) -> Result<Spectrum> {
        let (rows, cols) = matrix.dim();
        if rows != cols {
            return Err(AlgebraError::dimension_mismatch(
                "spectrum input columns",
                rows,
                cols,
            ));
        }
        if let Some(((i, j), v)) = matrix.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(AlgebraError::non_finite(format!(
                "entry ({}, {}) of the spectrum input is {}",
                i, j, v
            )));
        }
        debug!("Symmetric eigendecomposition of a {}x{} matrix", rows, cols);

        let p = rows;
        if p == 0 {
            return Ok(Spectrum {
                values: Array1::zeros(0),
                vectors: Array2::zeros((0, 0)),
            });
        }

        // nshare only accepts positive strides; reversed or permuted views are copied first
        let standard = matrix.as_standard_layout();
        let (raw_values, raw_vectors) = self
            .solver
            .decompose(standard.view().into_nalgebra().clone_owned())?;

        // Ascending first, then reversed, so ties end up in reverse solver order
        let mut order: Vec<usize> = (0..p).collect();
        order.sort_by(|&a, &b| raw_values[a].total_cmp(&raw_values[b]));
        order.reverse();

        let values = Array1::from_iter(order.iter().map(|&idx| raw_values[idx]));
        let mut vectors = Array2::<f64>::zeros((p, p));
        for (r, &idx) in order.iter().enumerate() {
            let column = raw_vectors.column(idx);
            let sign = match self.sign_convention {
                SignConvention::Negated => -1.0,
                SignConvention::Native => 1.0,
                SignConvention::PositiveDominant => dominant_sign(column.iter().copied()),
            };
            for k in 0..p {
                vectors[[r, k]] = sign * column[k];
            }
        }

        let negative = values.iter().filter(|&&v| v < 0.0).count();
        if negative > 0 {
            debug!(
                "Spectrum contains {} negative eigenvalue(s), smallest {}",
                negative,
                values[p - 1]
            );
        }

        Ok(Spectrum { values, vectors })
    }
}

/// Sign that makes the first largest-magnitude coefficient positive.
fn dominant_sign(coefficients: impl Iterator<Item = f64>) -> f64 {
    let mut best = 0.0f64;
    for c in coefficients {
        if c.abs() > best.abs() {
            best = c;
        }
    }
    if best < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Decomposes `matrix` with the default solver and sign convention.
pub fn symmetric_spectrum(matrix: ArrayView2<f64>) -> Result<Spectrum> {
    SymmetricSpectrum::default().compute(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moments::weighted_moments;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, s, Array1, Array2};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn assert_orthonormal(vectors: &Array2<f64>) {
        let gram = vectors.dot(&vectors.t());
        for i in 0..gram.nrows() {
            for j in 0..gram.ncols() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(gram[[i, j]], expected, epsilon = 1e-10);
            }
        }
    }

    fn assert_reconstructs(matrix: &Array2<f64>, spectrum: &Spectrum) {
        // Rows of `vectors` are eigenvectors: A = Vᵗ · diag(λ) · V
        let diag = Array2::from_diag(&spectrum.values);
        let rebuilt = spectrum.vectors.t().dot(&diag).dot(&spectrum.vectors);
        for i in 0..matrix.nrows() {
            for j in 0..matrix.ncols() {
                assert_abs_diff_eq!(rebuilt[[i, j]], matrix[[i, j]], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_identity_spectrum() -> anyhow::Result<()> {
        init();
        let identity = array![[1.0, 0.0], [0.0, 1.0]];
        let spectrum = symmetric_spectrum(identity.view())?;

        assert_eq!(spectrum.len(), 2);
        assert_abs_diff_eq!(spectrum.values[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(spectrum.values[1], 1.0, epsilon = 1e-12);
        assert_orthonormal(&spectrum.vectors);
        Ok(())
    }

    #[test]
    fn test_known_two_by_two() -> anyhow::Result<()> {
        let matrix = array![[2.0, 1.0], [1.0, 2.0]];
        let spectrum = symmetric_spectrum(matrix.view())?;

        assert_abs_diff_eq!(spectrum.values[0], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(spectrum.values[1], 1.0, epsilon = 1e-12);

        let half_sqrt = 0.5f64.sqrt();
        let top = spectrum.axis(0);
        assert_abs_diff_eq!(top[0].abs(), half_sqrt, epsilon = 1e-12);
        assert_abs_diff_eq!(top[1].abs(), half_sqrt, epsilon = 1e-12);
        assert_abs_diff_eq!(top[0], top[1], epsilon = 1e-12);
        assert_reconstructs(&matrix, &spectrum);
        Ok(())
    }

    #[test]
    fn test_values_sorted_descending() -> anyhow::Result<()> {
        let matrix = array![[1.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 2.0]];
        let spectrum = symmetric_spectrum(matrix.view())?;

        assert_abs_diff_eq!(spectrum.values[0], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(spectrum.values[1], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(spectrum.values[2], 1.0, epsilon = 1e-12);

        // The axis of the largest eigenvalue is the second coordinate axis
        assert_abs_diff_eq!(spectrum.axis(0)[1].abs(), 1.0, epsilon = 1e-12);
        assert_reconstructs(&matrix, &spectrum);
        Ok(())
    }

    #[test]
    fn test_random_covariance_spectrum() -> anyhow::Result<()> {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let x = Array2::from_shape_fn((60, 5), |_| rng.random_range(-3.0..3.0));
        let w = Array1::from_shape_fn(60, |_| rng.random_range(0.1..1.0));
        let cov = weighted_moments(x.view(), w.view())?.cov;

        let spectrum = symmetric_spectrum(cov.view())?;

        for i in 0..spectrum.len() - 1 {
            assert!(spectrum.values[i] >= spectrum.values[i + 1]);
        }
        for &v in spectrum.values.iter() {
            assert!(v >= -1e-10);
        }
        assert_orthonormal(&spectrum.vectors);
        assert_reconstructs(&cov, &spectrum);
        Ok(())
    }

    #[test]
    fn test_sign_conventions() -> anyhow::Result<()> {
        let matrix = array![[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 1.0]];

        let negated = symmetric_spectrum(matrix.view())?;
        let native = SpectrumBuilder::new(NalgebraEigen)
            .sign_convention(SignConvention::Native)
            .build()
            .compute(matrix.view())?;
        let dominant = SpectrumBuilder::new(NalgebraEigen)
            .sign_convention(SignConvention::PositiveDominant)
            .build()
            .compute(matrix.view())?;

        assert_eq!(negated.values, native.values);
        assert_eq!(negated.vectors, native.vectors.mapv(|v| -v));

        for (_, axis) in dominant.pairs() {
            let largest = axis
                .iter()
                .copied()
                .fold(0.0f64, |best, c| if c.abs() > best.abs() { c } else { best });
            assert!(largest > 0.0);
        }
        assert_reconstructs(&matrix, &dominant);
        Ok(())
    }

    #[test]
    fn test_reversed_and_transposed_views() -> anyhow::Result<()> {
        let matrix = array![[2.0, 1.0], [1.0, 3.0]];
        let expected_top = (5.0 + 5.0f64.sqrt()) / 2.0;
        let expected_bottom = (5.0 - 5.0f64.sqrt()) / 2.0;

        let reversed = matrix.slice(s![..;-1, ..;-1]);
        let spectrum = symmetric_spectrum(reversed)?;
        assert_abs_diff_eq!(spectrum.values[0], expected_top, epsilon = 1e-12);
        assert_abs_diff_eq!(spectrum.values[1], expected_bottom, epsilon = 1e-12);
        assert_reconstructs(&reversed.to_owned(), &spectrum);

        let transposed = symmetric_spectrum(matrix.t())?;
        assert_abs_diff_eq!(transposed.values[0], expected_top, epsilon = 1e-12);
        assert_abs_diff_eq!(transposed.values[1], expected_bottom, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_explained_variance_ratio() -> anyhow::Result<()> {
        let matrix = array![[3.0, 0.0], [0.0, 1.0]];
        let ratio = symmetric_spectrum(matrix.view())?.explained_variance_ratio();

        assert_abs_diff_eq!(ratio[0], 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(ratio[1], 0.25, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_empty_matrix() -> anyhow::Result<()> {
        let matrix = Array2::<f64>::zeros((0, 0));
        let spectrum = symmetric_spectrum(matrix.view())?;
        assert!(spectrum.is_empty());
        Ok(())
    }

    #[test]
    fn test_non_square_rejected() {
        let matrix = Array2::<f64>::zeros((2, 3));
        let err = symmetric_spectrum(matrix.view()).unwrap_err();
        assert!(matches!(err, AlgebraError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_non_finite_rejected() {
        let matrix = array![[1.0, f64::NAN], [f64::NAN, 1.0]];
        let err = symmetric_spectrum(matrix.view()).unwrap_err();
        assert!(matches!(err, AlgebraError::NonFiniteInput(_)));

        let matrix = array![[f64::INFINITY, 0.0], [0.0, 1.0]];
        assert!(symmetric_spectrum(matrix.view()).is_err());
    }

    #[cfg(feature = "lapack")]
    #[test]
    fn test_lapack_matches_nalgebra() -> anyhow::Result<()> {
        let matrix = array![[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 1.0]];
        let reference = symmetric_spectrum(matrix.view())?;
        let lapack = SpectrumBuilder::new(LapackEigen).build().compute(matrix.view())?;

        for i in 0..3 {
            assert_abs_diff_eq!(lapack.values[i], reference.values[i], epsilon = 1e-10);
        }
        assert_reconstructs(&matrix, &lapack);
        Ok(())
    }
}
