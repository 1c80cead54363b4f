//! Measurement and Estimate value types shared by every updater.
//!
//! State ordering is fixed crate-wide: `(north, ṅorth, east, ėast)`. The
//! measurement matrix H picks off the two position components.

use nalgebra::{Cholesky, Matrix2, Matrix2x4, Vector2, Vector4};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::track::TrackIndex;

/// Fixed measurement matrix H = [[1,0,0,0],[0,0,1,0]].
pub fn measurement_matrix() -> Matrix2x4<f64> {
    Matrix2x4::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0)
}

/// A single noisy 2D position observation from one scan.
///
/// Immutable once constructed; `covariance` is checked to be symmetric
/// positive-definite at construction time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Measurement {
    pub value: Vector2<f64>,
    pub timestamp: f64,
    pub covariance: Matrix2<f64>,
}

impl Measurement {
    pub fn new(
        value: Vector2<f64>,
        timestamp: f64,
        covariance: Matrix2<f64>,
    ) -> Result<Self, ConfigError> {
        const TOL: f64 = 1e-9;
        if (covariance[(0, 1)] - covariance[(1, 0)]).abs() > TOL {
            return Err(ConfigError::NonPsdCovariance);
        }
        if Cholesky::new(covariance).is_none() {
            return Err(ConfigError::NonPsdCovariance);
        }
        Ok(Measurement {
            value,
            timestamp,
            covariance,
        })
    }
}

/// Whether an `Estimate` is a raw time-propagation or an association update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimateKind {
    Prior,
    Posterior,
}

/// One step of a track's filter output.
///
/// Produced exclusively by `Updater` implementations (and, for seeding a
/// replay's first scan, by [`Estimate::posterior`]); never mutated after
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Estimate {
    pub timestamp: f64,
    pub mean: Vector4<f64>,
    pub covariance: nalgebra::Matrix4<f64>,
    pub kind: EstimateKind,
    /// Existence probability, set only by the IPDA family.
    pub existence_probability: Option<f64>,
    pub track_index: TrackIndex,
}

impl Estimate {
    /// Build a posterior estimate directly — the one case library users
    /// construct an `Estimate` themselves, to seed the first scan of a
    /// replay from a recorded track file.
    pub fn posterior(
        timestamp: f64,
        mean: Vector4<f64>,
        covariance: nalgebra::Matrix4<f64>,
        existence_probability: Option<f64>,
        track_index: TrackIndex,
    ) -> Self {
        Estimate {
            timestamp,
            mean,
            covariance,
            kind: EstimateKind::Posterior,
            existence_probability,
            track_index,
        }
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.mean[0], self.mean[2])
    }

    pub fn velocity(&self) -> Vector2<f64> {
        Vector2::new(self.mean[1], self.mean[3])
    }

    /// True iff `covariance` is finite, symmetric (within tolerance), and
    /// positive-semidefinite (no negative eigenvalues beyond tolerance).
    pub fn has_well_formed_covariance(&self) -> bool {
        const TOL: f64 = 1e-6;
        if !self.covariance.iter().all(|x| x.is_finite()) || !self.mean.iter().all(|x| x.is_finite())
        {
            return false;
        }
        for i in 0..4 {
            for j in 0..4 {
                if (self.covariance[(i, j)] - self.covariance[(j, i)]).abs() > TOL {
                    return false;
                }
            }
        }
        let eig = self.covariance.symmetric_eigenvalues();
        eig.iter().all(|&v| v >= -TOL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix4;

    #[test]
    fn rejects_non_symmetric_covariance() {
        let cov = Matrix2::new(1.0, 2.0, 0.0, 1.0);
        assert_eq!(
            Measurement::new(Vector2::zeros(), 0.0, cov),
            Err(ConfigError::NonPsdCovariance)
        );
    }

    #[test]
    fn rejects_non_positive_definite_covariance() {
        let cov = Matrix2::new(1.0, 2.0, 2.0, 1.0); // indefinite
        assert!(Measurement::new(Vector2::zeros(), 0.0, cov).is_err());
    }

    #[test]
    fn accepts_valid_covariance() {
        let cov = Matrix2::new(25.0, 0.0, 0.0, 25.0);
        assert!(Measurement::new(Vector2::new(1.0, 2.0), 0.0, cov).is_ok());
    }

    #[test]
    fn well_formed_covariance_detects_asymmetry_and_nan() {
        let good = Estimate::posterior(
            0.0,
            Vector4::zeros(),
            Matrix4::identity(),
            None,
            TrackIndex(0),
        );
        assert!(good.has_well_formed_covariance());

        let mut bad_cov = Matrix4::identity();
        bad_cov[(0, 1)] = 5.0;
        let bad = Estimate::posterior(0.0, Vector4::zeros(), bad_cov, None, TrackIndex(0));
        assert!(!bad.has_well_formed_covariance());

        let mut nan_cov = Matrix4::identity();
        nan_cov[(0, 0)] = f64::NAN;
        let nan = Estimate::posterior(0.0, Vector4::zeros(), nan_cov, None, TrackIndex(0));
        assert!(!nan.has_well_formed_covariance());
    }
}
