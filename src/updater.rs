//! The `Updater` seam: predict/associate/fuse for one track, one scan.

use nalgebra::{Matrix4, Vector4};

use crate::error::TrackingError;
use crate::gate::TrackGate;
use crate::motion::MotionModel;
use crate::track::Track;
use crate::types::{Estimate, Measurement};

/// Runs the DWNA time update: `x' = F x`, `P' = F P F^T + Q`.
pub fn predict(motion: &MotionModel, mean: &Vector4<f64>, cov: &Matrix4<f64>) -> (Vector4<f64>, Matrix4<f64>) {
    let f = motion.transition();
    let q = motion.process_noise();
    (f * mean, f * cov * f.transpose() + q)
}

/// What a single track's step produced.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// The new estimate to append to the track (prior on a miss, posterior
    /// once at least one measurement is incorporated).
    pub estimate: Estimate,
    /// True when the gate admitted nothing this scan — the caller treats
    /// this as a miss for M-of-N/IPDA bookkeeping.
    pub missed: bool,
}

/// Predicts, gates, and fuses one track's estimate against one scan's
/// measurements. PDAF and IPDAF differ only in the association weighting
/// and in whether an existence probability is tracked alongside the state.
pub trait Updater {
    #[allow(clippy::too_many_arguments)]
    fn step(
        &self,
        motion: &MotionModel,
        gate: &TrackGate,
        r: &nalgebra::Matrix2<f64>,
        track: &Track,
        measurements: &[Measurement],
        timestamp: f64,
    ) -> Result<StepOutcome, TrackingError>;

    /// Read-only dry run of gating, with no state update: which
    /// `measurements` would fall inside this track's validation region this
    /// scan. Used by the `Manager`'s double-use policy and by initiators
    /// deciding which measurements are already claimed by an existing track,
    /// without paying for a full predict/fuse.
    #[allow(clippy::too_many_arguments)]
    fn gated_indices(
        &self,
        motion: &MotionModel,
        gate: &TrackGate,
        r: &nalgebra::Matrix2<f64>,
        track: &Track,
        measurements: &[Measurement],
        timestamp: f64,
    ) -> Option<Vec<usize>> {
        let last = track.last();
        let (predicted_mean, predicted_cov) = predict(motion, &last.mean, &last.covariance);
        gate.gate(
            &predicted_mean,
            &predicted_cov,
            r,
            &last.position(),
            timestamp - last.timestamp,
            measurements,
        )
        .map(|g| g.admitted)
    }
}
