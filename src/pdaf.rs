//! Probabilistic Data Association Filter (§4.D).

use std::f64::consts::PI;

use nalgebra::{Matrix2, Matrix4, Vector2, Vector4};

use crate::error::{ConfigError, TrackingError};
use crate::gate::TrackGate;
use crate::motion::MotionModel;
use crate::track::Track;
use crate::types::{measurement_matrix, Estimate, EstimateKind, Measurement};
use crate::updater::{predict, StepOutcome, Updater};

/// Association parameters for a clutter-rate PDAF: detection probability
/// `p_d` and Poisson clutter density `lambda` (expected false returns per
/// unit area).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdafUpdater {
    p_d: f64,
    lambda: f64,
}

impl PdafUpdater {
    pub fn new(p_d: f64, lambda: f64) -> Result<Self, ConfigError> {
        if !(p_d > 0.0 && p_d <= 1.0) {
            return Err(ConfigError::InvalidDetectionProbability(p_d));
        }
        if !(lambda > 0.0) {
            return Err(ConfigError::InvalidClutterDensity(lambda));
        }
        Ok(PdafUpdater { p_d, lambda })
    }

    pub fn p_d(&self) -> f64 {
        self.p_d
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }
}

fn gaussian_likelihood(innovation: &Vector2<f64>, s: &Matrix2<f64>, s_inv: &Matrix2<f64>) -> f64 {
    let d2 = (innovation.transpose() * s_inv * innovation)[(0, 0)];
    let det_s = s.determinant();
    let norm = 1.0 / (2.0 * PI * det_s.sqrt());
    norm * (-0.5 * d2).exp()
}

/// Sum of Gaussian innovation likelihoods over the admitted measurements.
/// Exposed so IPDAF can fold it into the existence likelihood ratio without
/// recomputing the Mahalanobis distances a second time.
pub(crate) fn summed_likelihood(
    s: &Matrix2<f64>,
    predicted_measurement: &Vector2<f64>,
    admitted_values: &[Vector2<f64>],
) -> Option<f64> {
    let s_inv = s.try_inverse()?;
    Some(
        admitted_values
            .iter()
            .map(|z| gaussian_likelihood(&(z - predicted_measurement), s, &s_inv))
            .sum(),
    )
}

/// Computes PDAF association weights `(beta_0, beta_i...)` and the fused
/// posterior mean/covariance, given the predicted state and the admitted
/// measurements' innovations. Shared by `PdafUpdater` and `IpdafUpdater`
/// (the latter additionally uses `beta_0` to update existence).
pub(crate) fn fuse(
    p_d: f64,
    p_g: f64,
    lambda: f64,
    predicted_mean: &Vector4<f64>,
    predicted_cov: &Matrix4<f64>,
    s: &Matrix2<f64>,
    predicted_measurement: &Vector2<f64>,
    admitted_values: &[Vector2<f64>],
) -> Option<(f64, Vec<f64>, Vector4<f64>, Matrix4<f64>)> {
    let s_inv = s.try_inverse()?;
    let h = measurement_matrix();
    let k = predicted_cov * h.transpose() * s_inv;

    let innovations: Vec<Vector2<f64>> = admitted_values
        .iter()
        .map(|z| z - predicted_measurement)
        .collect();
    let likelihoods: Vec<f64> = innovations
        .iter()
        .map(|v| gaussian_likelihood(v, s, &s_inv))
        .collect();

    let sum_l: f64 = likelihoods.iter().sum();
    let miss_term = 1.0 - p_d * p_g;
    let denom = miss_term + (p_d / lambda) * sum_l;
    if !(denom.is_finite()) || denom <= 0.0 {
        return None;
    }
    let beta_0 = miss_term / denom;
    let betas: Vec<f64> = likelihoods
        .iter()
        .map(|l| (p_d / lambda) * l / denom)
        .collect();

    let combined_innovation: Vector2<f64> = innovations
        .iter()
        .zip(betas.iter())
        .map(|(v, b)| v * *b)
        .fold(Vector2::zeros(), |acc, v| acc + v);

    let posterior_mean = predicted_mean + k * combined_innovation;

    let p_c = predicted_cov - k * s * k.transpose();

    let spread: Matrix2<f64> = innovations
        .iter()
        .zip(betas.iter())
        .map(|(v, b)| *b * (v * v.transpose()))
        .fold(Matrix2::zeros(), |acc, m| acc + m)
        - combined_innovation * combined_innovation.transpose();
    let p_tilde = k * spread * k.transpose();

    let mut posterior_cov = beta_0 * predicted_cov + (1.0 - beta_0) * p_c + p_tilde;
    posterior_cov = 0.5 * (posterior_cov + posterior_cov.transpose());

    Some((beta_0, betas, posterior_mean, posterior_cov))
}

impl Updater for PdafUpdater {
    fn step(
        &self,
        motion: &MotionModel,
        gate: &TrackGate,
        r: &Matrix2<f64>,
        track: &Track,
        measurements: &[Measurement],
        timestamp: f64,
    ) -> Result<StepOutcome, TrackingError> {
        let last = track.last();
        let (predicted_mean, predicted_cov) = predict(motion, &last.mean, &last.covariance);

        let gate_result = gate
            .gate(
                &predicted_mean,
                &predicted_cov,
                r,
                &last.position(),
                timestamp - last.timestamp,
                measurements,
            )
            .ok_or_else(|| TrackingError::NumericalInstability {
                track: track.index,
                reason: "singular innovation covariance".to_string(),
            })?;

        if gate_result.admitted.is_empty() {
            return Ok(StepOutcome {
                estimate: Estimate {
                    timestamp,
                    mean: predicted_mean,
                    covariance: predicted_cov,
                    kind: EstimateKind::Prior,
                    existence_probability: None,
                    track_index: track.index,
                },
                missed: true,
            });
        }

        let admitted_values: Vec<Vector2<f64>> = gate_result
            .admitted
            .iter()
            .map(|&i| measurements[i].value)
            .collect();

        let (_, _, posterior_mean, posterior_cov) = fuse(
            self.p_d,
            gate.p_g(),
            self.lambda,
            &predicted_mean,
            &predicted_cov,
            &gate_result.innovation_covariance,
            &gate_result.predicted_measurement,
            &admitted_values,
        )
        .ok_or_else(|| TrackingError::NumericalInstability {
            track: track.index,
            reason: "singular innovation covariance during fusion".to_string(),
        })?;

        if !posterior_mean.iter().all(|v| v.is_finite())
            || !posterior_cov.iter().all(|v| v.is_finite())
        {
            return Err(TrackingError::NumericalInstability {
                track: track.index,
                reason: "non-finite posterior".to_string(),
            });
        }

        Ok(StepOutcome {
            estimate: Estimate {
                timestamp,
                mean: posterior_mean,
                covariance: posterior_cov,
                kind: EstimateKind::Posterior,
                existence_probability: None,
                track_index: track.index,
            },
            missed: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackIndex;
    use approx::assert_relative_eq;

    fn seed_track() -> Track {
        let estimate = Estimate::posterior(
            0.0,
            Vector4::new(0.0, 1.0, 0.0, 1.0),
            Matrix4::identity() * 10.0,
            None,
            TrackIndex(0),
        );
        Track::new(TrackIndex(0), estimate)
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(PdafUpdater::new(0.0, 1e-5).is_err());
        assert!(PdafUpdater::new(1.1, 1e-5).is_err());
        assert!(PdafUpdater::new(0.9, 0.0).is_err());
        assert!(PdafUpdater::new(0.9, 1e-5).is_ok());
    }

    #[test]
    fn single_measurement_posterior_is_finite_and_symmetric() {
        let updater = PdafUpdater::new(0.9, 1e-5).unwrap();
        let motion = MotionModel::new(1.0, 0.25).unwrap();
        let gate = TrackGate::new(0.99, 20.0).unwrap();
        let r = Matrix2::identity() * 25.0;
        let track = seed_track();
        let measurement = Measurement::new(Vector2::new(1.0, 1.0), 1.0, r).unwrap();

        let outcome = updater
            .step(&motion, &gate, &r, &track, &[measurement], 1.0)
            .unwrap();
        assert!(!outcome.missed);
        assert!(outcome.estimate.has_well_formed_covariance());
    }

    #[test]
    fn empty_scan_produces_prior_miss() {
        let updater = PdafUpdater::new(0.9, 1e-5).unwrap();
        let motion = MotionModel::new(1.0, 0.25).unwrap();
        let gate = TrackGate::new(0.99, 20.0).unwrap();
        let r = Matrix2::identity() * 25.0;
        let track = seed_track();

        let outcome = updater.step(&motion, &gate, &r, &track, &[], 1.0).unwrap();
        assert!(outcome.missed);
        assert_eq!(outcome.estimate.kind, EstimateKind::Prior);
    }

    #[test]
    fn betas_sum_to_one() {
        let predicted_mean = Vector4::new(0.0, 0.0, 0.0, 0.0);
        let predicted_cov = Matrix4::identity() * 10.0;
        let s = Matrix2::identity() * 25.0;
        let z_hat = Vector2::new(0.0, 0.0);
        let admitted = vec![Vector2::new(1.0, 0.0), Vector2::new(-1.0, 2.0)];

        let (beta_0, betas, _, _) =
            fuse(0.9, 0.99, 1e-5, &predicted_mean, &predicted_cov, &s, &z_hat, &admitted).unwrap();
        let total = beta_0 + betas.iter().sum::<f64>();
        assert_relative_eq!(total, 1.0, epsilon = 1e-9);
    }
}
