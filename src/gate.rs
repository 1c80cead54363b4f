//! Per-track validation gate (§4.C).

use nalgebra::{Matrix2, Matrix4, Vector2};

use crate::error::ConfigError;
use crate::types::{measurement_matrix, Measurement};

/// Result of gating a predicted track against a scan's measurements.
#[derive(Debug, Clone)]
pub struct GateResult {
    /// Indices into the `measurements` slice that fell inside the gate.
    pub admitted: Vec<usize>,
    pub innovation_covariance: Matrix2<f64>,
    pub predicted_measurement: Vector2<f64>,
}

/// Computes the validation region around a predicted measurement and
/// decides which candidate measurements fall inside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackGate {
    p_g: f64,
    v_max: f64,
    gamma: f64,
}

impl TrackGate {
    pub fn new(p_g: f64, v_max: f64) -> Result<Self, ConfigError> {
        if !(p_g > 0.0 && p_g < 1.0) {
            return Err(ConfigError::InvalidGatingProbability(p_g));
        }
        if !(v_max >= 0.0) {
            return Err(ConfigError::InvalidVelocityCap(v_max));
        }
        // Inverse chi-square CDF at confidence p_g on 2 degrees of freedom
        // has the closed form F(x) = 1 - exp(-x/2), so the inverse is
        // gamma = -2 * ln(1 - p_g). No external statistics dependency needed.
        let gamma = -2.0 * (1.0 - p_g).ln();
        Ok(TrackGate { p_g, v_max, gamma })
    }

    pub fn p_g(&self) -> f64 {
        self.p_g
    }

    pub fn v_max(&self) -> f64 {
        self.v_max
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Gates `measurements` against a predicted kinematic state.
    ///
    /// `previous_position` and `dt` are used only for the velocity cap: a
    /// candidate whose implied speed from the last posterior position
    /// exceeds `v_max` is rejected even if it falls inside the Mahalanobis
    /// ellipse. Returns `None` if the innovation covariance is singular (the
    /// caller should treat that as `NumericalInstability`).
    pub fn gate(
        &self,
        predicted_mean: &nalgebra::Vector4<f64>,
        predicted_cov: &Matrix4<f64>,
        r: &Matrix2<f64>,
        previous_position: &Vector2<f64>,
        dt: f64,
        measurements: &[Measurement],
    ) -> Option<GateResult> {
        let h = measurement_matrix();
        let predicted_measurement = h * predicted_mean;
        let s = h * predicted_cov * h.transpose() + r;
        let s_inv = s.try_inverse()?;

        let mut admitted = Vec::new();
        for (i, m) in measurements.iter().enumerate() {
            let innovation = m.value - predicted_measurement;
            let d2 = (innovation.transpose() * s_inv * innovation)[(0, 0)];
            if d2 > self.gamma {
                continue;
            }
            if dt > 0.0 {
                let implied_speed = (m.value - previous_position).norm() / dt;
                if implied_speed > self.v_max {
                    continue;
                }
            }
            admitted.push(i);
        }

        Some(GateResult {
            admitted,
            innovation_covariance: s,
            predicted_measurement,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector4;

    #[test]
    fn rejects_bad_parameters() {
        assert!(TrackGate::new(0.0, 1.0).is_err());
        assert!(TrackGate::new(1.0, 1.0).is_err());
        assert!(TrackGate::new(0.99, -1.0).is_err());
        assert!(TrackGate::new(0.99, 10.0).is_ok());
    }

    #[test]
    fn gamma_matches_closed_form() {
        let gate = TrackGate::new(0.99, 100.0).unwrap();
        let expected = -2.0 * (0.01_f64).ln();
        assert!((gate.gamma() - expected).abs() < 1e-12);
    }

    #[test]
    fn admits_measurement_near_prediction_and_rejects_far_one() {
        let gate = TrackGate::new(0.99, 1000.0).unwrap();
        let mean = Vector4::new(0.0, 0.0, 0.0, 0.0);
        let cov = Matrix4::identity() * 10.0;
        let r = Matrix2::identity() * 25.0;
        let prev_pos = Vector2::new(0.0, 0.0);

        let close = Measurement::new(Vector2::new(1.0, 1.0), 1.0, Matrix2::identity() * 25.0)
            .unwrap();
        let far = Measurement::new(Vector2::new(500.0, 500.0), 1.0, Matrix2::identity() * 25.0)
            .unwrap();

        let result = gate
            .gate(&mean, &cov, &r, &prev_pos, 1.0, &[close, far])
            .unwrap();
        assert_eq!(result.admitted, vec![0]);
    }

    #[test]
    fn velocity_cap_rejects_implausible_jump() {
        let gate = TrackGate::new(0.9999999, 1.0).unwrap(); // huge gate, tight v_max
        let mean = Vector4::new(0.0, 0.0, 0.0, 0.0);
        let cov = Matrix4::identity() * 1000.0;
        let r = Matrix2::identity() * 25.0;
        let prev_pos = Vector2::new(0.0, 0.0);

        let fast = Measurement::new(Vector2::new(100.0, 0.0), 1.0, Matrix2::identity() * 25.0)
            .unwrap();
        let result = gate
            .gate(&mean, &cov, &r, &prev_pos, 1.0, &[fast])
            .unwrap();
        assert!(result.admitted.is_empty());
    }
}
