//! # Weighted Moments
//!
//! Weighted center and weighted (population) covariance of an observation matrix.
//!
//! Observations are rows, variables are columns. The covariance uses the weight sum as
//! its denominator, i.e. the maximum-likelihood estimator without Bessel correction:
//!
//! ```text
//! center[k] = Σ_i w[i] · x[i,k] / Σ w
//! cov[k,l]  = Σ_i (w[i] / Σ w) · (x[i,k] - center[k]) · (x[i,l] - center[l])
//! ```

use log::{debug, trace};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

use crate::error::{AlgebraError, Result};
use crate::spectrum::{symmetric_spectrum, Spectrum};

/// Weighted center and covariance of a set of observations.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedMoments {
    /// Weighted mean of each column (length p).
    pub center: Array1<f64>,
    /// Weighted covariance (p × p), exactly symmetric.
    pub cov: Array2<f64>,
}

impl WeightedMoments {
    /// Moments with every observation weighted equally.
    pub fn from_uniform(x: ArrayView2<f64>) -> Result<Self> {
        let w = Array1::<f64>::ones(x.nrows());
        weighted_moments(x, w.view())
    }

    /// Principal axes of the covariance, largest eigenvalue first.
    pub fn spectrum(&self) -> Result<Spectrum> {
        symmetric_spectrum(self.cov.view())
    }

    /// Squared Mahalanobis distance of each row of `x` to this distribution.
    pub fn mahalanobis(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        crate::mahalanobis::mahalanobis(x, self.center.view(), self.cov.view())
    }
}

/// Checks that every weight is finite and non-negative and that the total is positive.
///
/// Returns the weights divided by their maximum together with their sum, so that large
/// finite weights cannot overflow when summed.
fn validate_weights(w: ArrayView1<f64>) -> Result<(Array1<f64>, f64)> {
    for (i, &wi) in w.iter().enumerate() {
        if !wi.is_finite() {
            return Err(AlgebraError::invalid_weights(format!(
                "weight at index {} is not finite ({})",
                i, wi
            )));
        }
        if wi < 0.0 {
            return Err(AlgebraError::invalid_weights(format!(
                "weight at index {} is negative ({})",
                i, wi
            )));
        }
    }

    let max = w.fold(0.0_f64, |acc, &wi| acc.max(wi));
    if max <= 0.0 {
        return Err(AlgebraError::invalid_weights(format!(
            "sum of weights must be strictly positive, got {}",
            w.sum()
        )));
    }
    let normalized = w.mapv(|wi| wi / max);
    let ws = normalized.sum();
    Ok((normalized, ws))
}

pub fn weighted_moments(x: ArrayView2<f64>, w: ArrayView1<f64>) -> Result<WeightedMoments> {
    let (n, p) = x.dim();
    if w.len() != n {
        return Err(AlgebraError::dimension_mismatch(
            "weight vector length",
            n,
            w.len(),
        ));
    }
    let (w, ws) = validate_weights(w)?;
    debug!("Weighted moments of {} observations x {} variables", n, p);

    let center: Array1<f64> = x.t().dot(&w) / ws;

    // Center each row and scale it by sqrt(w_i / ws)
    let scale = w.mapv(|wi| (wi / ws).sqrt());
    let mut scaled = x.to_owned();
    scaled
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(i, mut row)| {
            row -= &center;
            row *= scale[i];
        });
    trace!("Centered and scaled observation matrix, weight sum {}", ws);

    // Only the lower triangle is computed; the upper one is mirrored from it.
    let lower: Vec<Vec<f64>> = (0..p)
        .into_par_iter()
        .map(|k| {
            let col_k = scaled.column(k);
            (0..=k).map(|l| col_k.dot(&scaled.column(l))).collect()
        })
        .collect();

    let mut cov = Array2::<f64>::zeros((p, p));
    for (k, row) in lower.iter().enumerate() {
        for (l, &value) in row.iter().enumerate() {
            cov[[k, l]] = value;
            cov[[l, k]] = value;
        }
    }

    Ok(WeightedMoments { center, cov })
}
