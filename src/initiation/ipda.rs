//! IPDA existence-probability track initiation (§4.G).

use nalgebra::{Matrix2, Matrix4, Vector2, Vector4};

use crate::error::ConfigError;
use crate::gate::TrackGate;
use crate::ipdaf::IpdafUpdater;
use crate::motion::MotionModel;
use crate::track::{Track, TrackIndex};
use crate::types::{Estimate, Measurement};
use crate::updater::Updater;

use super::{Initiator, PromotedSeed};

/// Confirms a tentative track once its existence probability crosses
/// `initiate_threshold`; drops it once existence falls to
/// `terminate_threshold`. Reuses [`IpdafUpdater`] for the per-scan
/// predict/gate/fuse/existence-update cycle, with each tentative track held
/// as an ordinary single-estimate `Track`.
pub struct IpdaInitiator {
    motion: MotionModel,
    gate: TrackGate,
    r: Matrix2<f64>,
    updater: IpdafUpdater,
    initial_existence: f64,
    initiate_threshold: f64,
    terminate_threshold: f64,
    tentative: Vec<Track>,
}

impl IpdaInitiator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        motion: MotionModel,
        gate: TrackGate,
        r: Matrix2<f64>,
        updater: IpdafUpdater,
        initial_existence: f64,
        initiate_threshold: f64,
        terminate_threshold: f64,
    ) -> Result<Self, ConfigError> {
        if !(0.0 < terminate_threshold && terminate_threshold < initiate_threshold && initiate_threshold < 1.0)
        {
            return Err(ConfigError::InvalidIpdaThresholds {
                initiate: initiate_threshold,
                terminate: terminate_threshold,
            });
        }
        if !(0.0..=1.0).contains(&initial_existence) {
            return Err(ConfigError::InvalidInitialExistence(initial_existence));
        }
        Ok(IpdaInitiator {
            motion,
            gate,
            r,
            updater,
            initial_existence,
            initiate_threshold,
            terminate_threshold,
            tentative: Vec::new(),
        })
    }
}

impl Initiator for IpdaInitiator {
    fn step(&mut self, timestamp: f64, measurements: &[Measurement]) -> Vec<PromotedSeed> {
        let mut admitted_anywhere = vec![false; measurements.len()];
        let mut promoted = Vec::new();
        let mut survivors = Vec::new();

        for mut t in self.tentative.drain(..) {
            if let Some(admitted) = self.updater.gated_indices(
                &self.motion,
                &self.gate,
                &self.r,
                &t,
                measurements,
                timestamp,
            ) {
                for i in admitted {
                    admitted_anywhere[i] = true;
                }
            }

            let outcome = match self
                .updater
                .step(&self.motion, &self.gate, &self.r, &t, measurements, timestamp)
            {
                Ok(o) => o,
                Err(_) => continue, // numerical instability: drop the tentative track
            };
            let existence = outcome
                .estimate
                .existence_probability
                .expect("IpdafUpdater always reports existence");

            if existence >= self.initiate_threshold {
                promoted.push(PromotedSeed {
                    estimate: outcome.estimate,
                });
                continue;
            }
            if existence <= self.terminate_threshold {
                continue;
            }
            if t.push_estimate(outcome.estimate).is_ok() {
                survivors.push(t);
            }
        }

        for (i, m) in measurements.iter().enumerate() {
            if admitted_anywhere[i] {
                continue;
            }
            let estimate = Estimate::posterior(
                timestamp,
                Vector4::new(m.value[0], 0.0, m.value[1], 0.0),
                Matrix4::identity() * 1.0e4,
                Some(self.initial_existence),
                TrackIndex(0),
            );
            survivors.push(Track::new(TrackIndex(0), estimate));
        }

        self.tentative = survivors;
        promoted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipdaf::{ClutterAreaSource, ExistenceMarkov};

    fn build() -> IpdaInitiator {
        let motion = MotionModel::new(1.0, 0.25).unwrap();
        let gate = TrackGate::new(0.99, 20.0).unwrap();
        let r = Matrix2::identity() * 25.0;
        let markov = ExistenceMarkov::new(0.98, 0.0).unwrap();
        let updater = IpdafUpdater::new(0.9, markov, ClutterAreaSource::Explicit(1.0e6)).unwrap();
        IpdaInitiator::new(motion, gate, r, updater, 0.3, 0.98, 0.10).unwrap()
    }

    fn meas(x: f64, y: f64, t: f64) -> Measurement {
        Measurement::new(Vector2::new(x, y), t, Matrix2::identity() * 25.0).unwrap()
    }

    #[test]
    fn rejects_bad_thresholds() {
        let motion = MotionModel::new(1.0, 0.25).unwrap();
        let gate = TrackGate::new(0.99, 20.0).unwrap();
        let r = Matrix2::identity() * 25.0;
        let markov = ExistenceMarkov::new(0.98, 0.0).unwrap();
        let updater = IpdafUpdater::new(0.9, markov, ClutterAreaSource::Explicit(1.0e6)).unwrap();
        assert!(IpdaInitiator::new(motion, gate, r, updater, 0.3, 0.10, 0.98).is_err());
    }

    #[test]
    fn consistent_detections_eventually_promote() {
        let mut init = build();
        let mut promoted_total = 0;
        for i in 0..10 {
            let t = i as f64;
            let out = init.step(t, &[meas(10.0 * t, 0.0, t)]);
            promoted_total += out.len();
        }
        assert!(promoted_total >= 1);
    }

    #[test]
    fn no_detections_eventually_drop_seed() {
        let mut init = build();
        init.step(0.0, &[meas(0.0, 0.0, 0.0)]);
        for i in 1..10 {
            init.step(i as f64, &[]);
        }
        assert!(init.tentative.is_empty());
    }
}
