//! Discrete White-Noise Acceleration (DWNA) motion model.
//!
//! A nearly-constant-velocity model per axis, composed into the 4-state
//! (north, ṅorth, east, ėast) ordering used throughout this crate.

use nalgebra::Matrix4;

use crate::error::ConfigError;

/// Process-noise strength `q` and sampling interval `dt`, the two knobs that
/// fully determine the transition matrix F and process-noise covariance Q.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionModel {
    q: f64,
    dt: f64,
}

impl MotionModel {
    /// Validates `dt > 0`. `q` is the process-noise strength (²√accel
    /// variance); the spec does not bound it beyond requiring the resulting
    /// Q to be well-formed, which holds for any finite `q`.
    pub fn new(dt: f64, q: f64) -> Result<Self, ConfigError> {
        if !(dt > 0.0) {
            return Err(ConfigError::InvalidSamplingInterval(dt));
        }
        Ok(MotionModel { q, dt })
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn q(&self) -> f64 {
        self.q
    }

    /// State transition matrix F, block-diagonal over the (north, east) axes.
    pub fn transition(&self) -> Matrix4<f64> {
        let dt = self.dt;
        #[rustfmt::skip]
        let f = Matrix4::new(
            1.0, dt,  0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, dt,
            0.0, 0.0, 0.0, 1.0,
        );
        f
    }

    /// Process-noise covariance Q, block-diagonal over the (north, east) axes.
    pub fn process_noise(&self) -> Matrix4<f64> {
        let dt = self.dt;
        let q = self.q;
        let dt2 = dt * dt;
        let dt3 = dt2 * dt;
        let a = q * dt3 / 3.0;
        let b = q * dt2 / 2.0;
        let c = q * dt;
        #[rustfmt::skip]
        let qm = Matrix4::new(
            a,   b,   0.0, 0.0,
            b,   c,   0.0, 0.0,
            0.0, 0.0, a,   b,
            0.0, 0.0, b,   c,
        );
        qm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nonpositive_dt() {
        assert_eq!(
            MotionModel::new(0.0, 0.25),
            Err(ConfigError::InvalidSamplingInterval(0.0))
        );
        assert!(MotionModel::new(-1.0, 0.25).is_err());
    }

    #[test]
    fn transition_matches_closed_form() {
        let m = MotionModel::new(2.0, 0.25).unwrap();
        let f = m.transition();
        assert_eq!(f[(0, 1)], 2.0);
        assert_eq!(f[(2, 3)], 2.0);
        assert_eq!(f[(0, 0)], 1.0);
        assert_eq!(f[(1, 1)], 1.0);
        assert_eq!(f[(0, 2)], 0.0);
        assert!((f.determinant() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn process_noise_matches_closed_form() {
        let m = MotionModel::new(1.0, 0.25).unwrap();
        let q = m.process_noise();
        assert!((q[(0, 0)] - 0.25 / 3.0).abs() < 1e-12);
        assert!((q[(0, 1)] - 0.25 / 2.0).abs() < 1e-12);
        assert!((q[(1, 1)] - 0.25).abs() < 1e-12);
        assert_eq!(q[(0, 2)], 0.0);
    }

    #[test]
    fn transition_is_invertible_with_unit_determinant() {
        let m = MotionModel::new(0.37, 1.0).unwrap();
        assert!((m.transition().determinant() - 1.0).abs() < 1e-10);
    }
}
