//! # Mahalanobis Distance
//!
//! Squared generalised distance of every observation to a reference distribution:
//!
//! ```text
//! D²_i = (x_i - center)ᵗ · cov⁻¹ · (x_i - center)
//! ```
//!
//! The covariance is inverted once per call. Each distance is the row sum of the
//! elementwise product `(cx · cov⁻¹) ∘ cx`, where `cx` holds the centered rows.

use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use nshare::{IntoNalgebra, IntoNdarray2};
use rayon::prelude::*;

use crate::error::{AlgebraError, Result};

/// Smallest accepted ratio between the smallest and largest LU pivot magnitude of the
/// correlation-scaled covariance.
pub const DEFAULT_SINGULAR_TOLERANCE: f64 = 1e-12;

/// Configures the singularity tolerance of a [`Mahalanobis`] distance.
pub struct MahalanobisBuilder {
    tolerance: f64,
}

impl MahalanobisBuilder {
    pub fn new() -> Self {
        MahalanobisBuilder {
            tolerance: DEFAULT_SINGULAR_TOLERANCE,
        }
    }

    /// Covariances whose correlation-scaled pivot ratio `min|U_ii| / max|U_ii|` is at or
    /// below this value are rejected as singular.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn build(self) -> Mahalanobis {
        Mahalanobis {
            tolerance: self.tolerance,
        }
    }
}

impl Default for MahalanobisBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Configured squared Mahalanobis distance with a checked covariance inverse.
pub struct Mahalanobis {
    tolerance: f64,
}

impl Default for Mahalanobis {
    fn default() -> Self {
        MahalanobisBuilder::new().build()
    }
}

impl Mahalanobis {
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Squared Mahalanobis distance of each row of `x` (n × p) to `center` (p) under `cov` (p × p).
    ///
    /// # Errors
    /// - [`AlgebraError::DimensionMismatch`] if `center` or `cov` disagree with the columns of `x`
    /// - [`AlgebraError::SingularCovariance`] if `cov` cannot be inverted reliably
    /// - [`AlgebraError::NonFiniteInput`] if `cov` holds NaN or infinite entries
    pub fn distances(
        &self,
        x: ArrayView2<f64>,
        center: ArrayView1<f64>,
        cov: ArrayView2<f64>,
    ) -> Result<Array1<f64>> {
        let (n, p) = x.dim();
        if center.len() != p {
            return Err(AlgebraError::dimension_mismatch(
                "center length",
                p,
                center.len(),
            ));
        }
        if cov.nrows() != p {
            return Err(AlgebraError::dimension_mismatch(
                "covariance rows",
                p,
                cov.nrows(),
            ));
        }
        if cov.ncols() != p {
            return Err(AlgebraError::dimension_mismatch(
                "covariance columns",
                p,
                cov.ncols(),
            ));
        }
        debug!("Mahalanobis distances of {} observations in {} dimensions", n, p);

        if p == 0 {
            return Ok(Array1::zeros(n));
        }

        let inverse = self.invert(cov)?;

        let mut centered = x.to_owned();
        centered
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(|mut row| {
                row -= &center;
            });

        let projected = centered.dot(&inverse);
        Ok((&projected * &centered).sum_axis(Axis(1)))
    }

    /// Inverts a covariance matrix, rejecting singular or ill-conditioned input.
    pub fn invert(&self, cov: ArrayView2<f64>) -> Result<Array2<f64>> {
        if let Some(((i, j), v)) = cov.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(AlgebraError::non_finite(format!(
                "covariance entry ({}, {}) is {}",
                i, j, v
            )));
        }

        let p = cov.nrows();
        let variances = cov.diag();
        if let Some(i) = variances.iter().position(|&v| v <= 0.0) {
            return Err(AlgebraError::singular_covariance(format!(
                "variance at index {} is not positive ({})",
                i, variances[i]
            )));
        }

        // Conditioning is judged on the correlation matrix so that units do not matter
        let scale = variances.mapv(|v| 1.0 / v.sqrt());
        let correlation =
            Array2::from_shape_fn((p, p), |(i, j)| cov[[i, j]] * scale[i] * scale[j]);

        let lu = correlation.view().into_nalgebra().clone_owned().lu();
        let pivots = lu.u().diagonal();
        let largest = pivots.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        let smallest = pivots.iter().fold(f64::INFINITY, |acc, v| acc.min(v.abs()));

        if largest == 0.0 {
            return Err(AlgebraError::singular_covariance(
                "all LU pivots are zero",
            ));
        }
        let ratio = smallest / largest;
        if ratio <= self.tolerance {
            return Err(AlgebraError::singular_covariance(format!(
                "LU pivot ratio {:e} is at or below tolerance {:e}",
                ratio, self.tolerance
            )));
        }
        if ratio <= self.tolerance * 1e3 {
            warn!(
                "Covariance is close to singular (pivot ratio {:e}, tolerance {:e})",
                ratio, self.tolerance
            );
        }

        let correlation_inverse = lu
            .try_inverse()
            .ok_or_else(|| AlgebraError::singular_covariance("LU inversion failed"))?
            .into_ndarray2();

        // cov⁻¹ = D^-1/2 · corr⁻¹ · D^-1/2
        let inverse = Array2::from_shape_fn((p, p), |(i, j)| {
            correlation_inverse[[i, j]] * scale[i] * scale[j]
        });
        if inverse.iter().any(|v| !v.is_finite()) {
            return Err(AlgebraError::singular_covariance(
                "inverse contains non-finite entries",
            ));
        }

        Ok(inverse)
    }
}

/// Squared Mahalanobis distances with the default singularity tolerance.
pub fn mahalanobis(
    x: ArrayView2<f64>,
    center: ArrayView1<f64>,
    cov: ArrayView2<f64>,
) -> Result<Array1<f64>> {
    Mahalanobis::default().distances(x, center, cov)
}
