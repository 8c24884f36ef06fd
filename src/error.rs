//! Error types shared by all operations in this crate.

use thiserror::Error;

/// Failure modes of the moment, spectrum, distance and vectorisation routines.
///
/// Every operation is pure, so a given input always fails the same way.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlgebraError {
    /// Weight vector has a negative or non-finite entry, or a non-positive sum.
    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    /// Two paired inputs disagree on a dimension.
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Covariance matrix could not be inverted reliably.
    #[error("Singular covariance matrix: {0}")]
    SingularCovariance(String),

    /// Input contains NaN or infinite entries.
    #[error("Non-finite input: {0}")]
    NonFiniteInput(String),

    /// Eigen solver backend reported a failure.
    #[error("Decomposition failed: {0}")]
    DecompositionFailed(String),
}

pub type Result<T> = std::result::Result<T, AlgebraError>;

impl AlgebraError {
    #[must_use]
    pub fn invalid_weights(msg: impl Into<String>) -> Self {
        Self::InvalidWeights(msg.into())
    }

    #[must_use]
    pub const fn dimension_mismatch(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            context,
            expected,
            actual,
        }
    }

    #[must_use]
    pub fn singular_covariance(msg: impl Into<String>) -> Self {
        Self::SingularCovariance(msg.into())
    }

    #[must_use]
    pub fn non_finite(msg: impl Into<String>) -> Self {
        Self::NonFiniteInput(msg.into())
    }

    #[must_use]
    pub fn decomposition_failed(msg: impl Into<String>) -> Self {
        Self::DecompositionFailed(msg.into())
    }
}
