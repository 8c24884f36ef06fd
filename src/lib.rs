//! Statistical primitives for distance-based clustering.
//!
//! - [`moments`]: weighted center and biased weighted covariance
//! - [`spectrum`]: symmetric eigendecomposition, largest eigenvalue first
//! - [`mahalanobis`]: squared Mahalanobis distance of each observation
//! - [`dist`]: compact lower-triangle vector of a pairwise-distance matrix
//!
//! All operations are pure functions over `ndarray` views.

pub mod dist;
pub mod error;
pub mod mahalanobis;
pub mod moments;
pub mod spectrum;

pub use dist::{as_dist, CondensedMatrix, DistMetadata};
pub use error::{AlgebraError, Result};
pub use mahalanobis::{mahalanobis, Mahalanobis, MahalanobisBuilder};
pub use moments::{weighted_moments, WeightedMoments};
pub use spectrum::{
    symmetric_spectrum, EigenSolver, NalgebraEigen, SignConvention, Spectrum, SpectrumBuilder,
    SymmetricSpectrum,
};

#[cfg(feature = "lapack")]
pub use spectrum::LapackEigen;
