//! Integrated PDAF: PDAF kinematics plus a track existence probability
//! evolved by a 2-state Markov chain (§4.E).

use std::f64::consts::PI;

use nalgebra::{Matrix2, Vector2, Vector4};

use crate::error::{ConfigError, TrackingError};
use crate::gate::TrackGate;
use crate::motion::MotionModel;
use crate::pdaf::{fuse, summed_likelihood};
use crate::track::Track;
use crate::types::{Estimate, EstimateKind, Measurement};
use crate::updater::{predict, StepOutcome, Updater};

/// The spec leaves open what "scan area" means in the nonparametric
/// clutter-density term of the existence update; this picks the convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClutterAreaSource {
    /// A fixed area supplied by the caller (e.g. sensor coverage area).
    Explicit(f64),
    /// `pi * gamma`, a gate area that ignores the innovation covariance's
    /// shape, a cheap unit-circle-scaled approximation.
    GateGamma,
    /// `pi * gamma * sqrt(det(S))`, the true area of this scan's validation
    /// ellipse.
    GateVolume,
}

impl ClutterAreaSource {
    fn area(&self, gamma: f64, s: &Matrix2<f64>) -> f64 {
        match self {
            ClutterAreaSource::Explicit(a) => *a,
            ClutterAreaSource::GateGamma => PI * gamma,
            ClutterAreaSource::GateVolume => PI * gamma * s.determinant().sqrt(),
        }
    }
}

/// Two-state Markov chain governing target existence: `p11` is
/// P(exists at k | existed at k-1), `p21` is P(exists at k | did not exist
/// at k-1) (spawn/birth rate).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExistenceMarkov {
    p11: f64,
    p21: f64,
}

impl ExistenceMarkov {
    pub fn new(p11: f64, p21: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&p11) || !(0.0..=1.0).contains(&p21) {
            return Err(ConfigError::InvalidMarkovProbabilities { p11, p21 });
        }
        Ok(ExistenceMarkov { p11, p21 })
    }

    pub fn p11(&self) -> f64 {
        self.p11
    }

    pub fn p21(&self) -> f64 {
        self.p21
    }

    /// Time-propagates an existence probability one scan ahead.
    pub fn predict(&self, posterior: f64) -> f64 {
        self.p11 * posterior + self.p21 * (1.0 - posterior)
    }

    /// Bayes-updates a predicted existence probability against the
    /// measurement likelihood ratio `lambda_k` (1.0 means "no information").
    pub fn update(&self, predicted: f64, lambda_k: f64) -> f64 {
        let denom = 1.0 - predicted * (1.0 - lambda_k);
        (lambda_k * predicted) / denom
    }
}

/// IPDAF association/existence parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IpdafUpdater {
    p_d: f64,
    markov: ExistenceMarkov,
    area_source: ClutterAreaSource,
}

impl IpdafUpdater {
    pub fn new(
        p_d: f64,
        markov: ExistenceMarkov,
        area_source: ClutterAreaSource,
    ) -> Result<Self, ConfigError> {
        if !(p_d > 0.0 && p_d <= 1.0) {
            return Err(ConfigError::InvalidDetectionProbability(p_d));
        }
        if let ClutterAreaSource::Explicit(a) = area_source {
            if !(a > 0.0) {
                return Err(ConfigError::InvalidScanArea(a));
            }
        }
        Ok(IpdafUpdater {
            p_d,
            markov,
            area_source,
        })
    }

    pub fn markov(&self) -> ExistenceMarkov {
        self.markov
    }
}

impl Updater for IpdafUpdater {
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
        let existence_prev =
            last.existence_probability
                .ok_or_else(|| TrackingError::NumericalInstability {
                    track: track.index,
                    reason: "missing existence probability on an IPDA track".to_string(),
                })?;
        let existence_pred = self.markov.predict(existence_prev);

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

        let p_g = gate.p_g();
        let m_k = gate_result.admitted.len();

        if m_k == 0 {
            let lambda_k = 1.0 - self.p_d * p_g;
            let existence_post = self.markov.update(existence_pred, lambda_k);
            return Ok(StepOutcome {
                estimate: Estimate {
                    timestamp,
                    mean: predicted_mean,
                    covariance: predicted_cov,
                    kind: EstimateKind::Prior,
                    existence_probability: Some(existence_post),
                    track_index: track.index,
                },
                missed: true,
            });
        }

        let area = self
            .area_source
            .area(gate.gamma(), &gate_result.innovation_covariance);
        let lambda_hat = m_k as f64 / area;

        let admitted_values: Vec<Vector2<f64>> = gate_result
            .admitted
            .iter()
            .map(|&i| measurements[i].value)
            .collect();

        let (_, _, posterior_mean, posterior_cov) = fuse(
            self.p_d,
            p_g,
            lambda_hat,
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

        let sum_l = summed_likelihood(
            &gate_result.innovation_covariance,
            &gate_result.predicted_measurement,
            &admitted_values,
        )
        .ok_or_else(|| TrackingError::NumericalInstability {
            track: track.index,
            reason: "singular innovation covariance during existence update".to_string(),
        })?;
        let lambda_k = 1.0 - self.p_d * p_g + self.p_d * p_g * (area / m_k as f64) * sum_l;
        let existence_post = self.markov.update(existence_pred, lambda_k);

        Ok(StepOutcome {
            estimate: Estimate {
                timestamp,
                mean: posterior_mean,
                covariance: posterior_cov,
                kind: EstimateKind::Posterior,
                existence_probability: Some(existence_post),
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
    use nalgebra::Matrix4;

    fn seed_track(existence: f64) -> Track {
        let estimate = Estimate::posterior(
            0.0,
            Vector4::new(0.0, 1.0, 0.0, 1.0),
            Matrix4::identity() * 10.0,
            Some(existence),
            TrackIndex(0),
        );
        Track::new(TrackIndex(0), estimate)
    }

    #[test]
    fn rejects_bad_markov_probabilities() {
        assert!(ExistenceMarkov::new(1.1, 0.0).is_err());
        assert!(ExistenceMarkov::new(0.9, -0.1).is_err());
        assert!(ExistenceMarkov::new(0.98, 0.0).is_ok());
    }

    #[test]
    fn existence_decays_monotonically_under_repeated_misses() {
        let markov = ExistenceMarkov::new(0.98, 0.0).unwrap();
        let updater = IpdafUpdater::new(0.9, markov, ClutterAreaSource::Explicit(1.0e6)).unwrap();
        let motion = MotionModel::new(1.0, 0.25).unwrap();
        let gate = TrackGate::new(0.99, 20.0).unwrap();
        let r = Matrix2::identity() * 25.0;

        let mut track = seed_track(0.9);
        let mut previous = 0.9;
        for i in 1..6 {
            let outcome = updater
                .step(&motion, &gate, &r, &track, &[], i as f64)
                .unwrap();
            let existence = outcome.estimate.existence_probability.unwrap();
            assert!(existence <= previous);
            previous = existence;
            track.push_estimate(outcome.estimate).unwrap();
        }
    }

    #[test]
    fn measurement_near_prediction_raises_existence_when_predicted_low() {
        let markov = ExistenceMarkov::new(0.98, 0.0).unwrap();
        let updater = IpdafUpdater::new(0.9, markov, ClutterAreaSource::Explicit(1.0e6)).unwrap();
        let motion = MotionModel::new(1.0, 0.25).unwrap();
        let gate = TrackGate::new(0.99, 20.0).unwrap();
        let r = Matrix2::identity() * 25.0;

        let track = seed_track(0.3);
        let measurement = Measurement::new(Vector2::new(1.0, 1.0), 1.0, r).unwrap();
        let outcome = updater
            .step(&motion, &gate, &r, &track, &[measurement], 1.0)
            .unwrap();
        assert!(outcome.estimate.existence_probability.unwrap() > 0.3);
    }
}
