//! M-of-N sliding-window track initiation (§4.F).

use nalgebra::{Matrix2, Matrix4, Vector2, Vector4};

use crate::error::ConfigError;
use crate::gate::TrackGate;
use crate::motion::MotionModel;
use crate::pdaf::PdafUpdater;
use crate::track::{Track, TrackIndex};
use crate::types::{Estimate, Measurement};
use crate::updater::Updater;

use super::{Initiator, PromotedSeed};

/// A tentative track: a PDAF-filtered Kalman state plus a bounded bitfield
/// recording the last `n` scans' hit/miss outcomes (bit 0 most recent).
struct Tentative {
    track: Track,
    window: u64,
    observed: u32,
}

/// Confirms a track once it has been detected in at least `m` of the last
/// `n` scans since being seeded; drops it once that becomes impossible.
/// Holds its own `PdafUpdater` — the updater carries no per-track state, so
/// there is no reason for the tentative population to share the confirmed
/// tracks' instance.
pub struct MofNInitiator {
    m: u32,
    n: u32,
    motion: MotionModel,
    gate: TrackGate,
    r: Matrix2<f64>,
    updater: PdafUpdater,
    tentative: Vec<Tentative>,
}

impl MofNInitiator {
    pub fn new(
        m: u32,
        n: u32,
        motion: MotionModel,
        gate: TrackGate,
        r: Matrix2<f64>,
        updater: PdafUpdater,
    ) -> Result<Self, ConfigError> {
        if m == 0 || m > n {
            return Err(ConfigError::InvalidMofN { m, n });
        }
        Ok(MofNInitiator {
            m,
            n,
            motion,
            gate,
            r,
            updater,
            tentative: Vec::new(),
        })
    }

    fn window_mask(&self) -> u64 {
        if self.n >= 64 {
            u64::MAX
        } else {
            (1u64 << self.n) - 1
        }
    }
}

impl Initiator for MofNInitiator {
    fn step(&mut self, timestamp: f64, measurements: &[Measurement]) -> Vec<PromotedSeed> {
        let mask = self.window_mask();
        let mut claimed = vec![false; measurements.len()];
        let mut promoted = Vec::new();
        let mut survivors = Vec::new();

        for mut t in self.tentative.drain(..) {
            // A measurement claimed by more than one tentative track still
            // sets each track's hit bit — ties are not resolved by unique
            // assignment here, only at confirmed-track association.
            if let Some(admitted) = self.updater.gated_indices(
                &self.motion,
                &self.gate,
                &self.r,
                &t.track,
                measurements,
                timestamp,
            ) {
                for i in admitted {
                    claimed[i] = true;
                }
            }

            let outcome = match self.updater.step(
                &self.motion,
                &self.gate,
                &self.r,
                &t.track,
                measurements,
                timestamp,
            ) {
                Ok(o) => o,
                Err(_) => continue, // numerical instability: drop the seed
            };
            let hit = !outcome.missed;
            if t.track.push_estimate(outcome.estimate).is_err() {
                continue;
            }

            t.window = ((t.window << 1) | (hit as u64)) & mask;
            t.observed = (t.observed + 1).min(self.n);
            let hits = (t.window & mask).count_ones();

            if hits >= self.m {
                promoted.push(PromotedSeed {
                    estimate: t.track.last().clone(),
                });
                continue;
            }

            if t.observed >= self.n {
                continue; // can't reach m within the remaining window
            }

            survivors.push(t);
        }

        // Seed a fresh tentative track for every measurement no existing
        // tentative track's gate claimed this scan.
        for (i, m) in measurements.iter().enumerate() {
            if claimed[i] {
                continue;
            }
            let estimate = Estimate::posterior(
                timestamp,
                Vector4::new(m.value[0], 0.0, m.value[1], 0.0),
                Matrix4::identity() * 1.0e4,
                None,
                TrackIndex(0),
            );
            survivors.push(Tentative {
                track: Track::new(TrackIndex(0), estimate),
                window: 1,
                observed: 1,
            });
        }

        self.tentative = survivors;
        promoted
    }
}
