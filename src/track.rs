//! `Track`: identity plus an append-only sequence of `Estimate`s.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::TrackingError;
use crate::initiation::PromotedSeed;
use crate::types::Estimate;

/// Foreign key into the `TrackFile`. Assigned once, monotonically, by the
/// `Manager`; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackIndex(pub u64);

/// Whether a confirmed track is still being updated.
///
/// Termination is "stop updating", not delete: a `Terminated` track's
/// history stays in the `TrackFile` so downstream readers can still see its
/// last known state. This field is what they check instead of inferring
/// liveness from, say, whether the terminator still mentions the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackStatus {
    Live,
    Terminated,
}

/// A confirmed target: identity plus an append-only ordered sequence of
/// `Estimate`s, plus the bookkeeping the `Manager`/terminators need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub index: TrackIndex,
    pub status: TrackStatus,
    estimates: Vec<Estimate>,
    /// Scans in a row with no validated measurement (an empty `StepOutcome`).
    pub consecutive_misses: u32,
    /// Scans in a row where the updater reported `NumericalInstability`.
    pub consecutive_instability: u32,
}

impl Track {
    /// Build a new confirmed track from its first (posterior) estimate.
    pub fn new(index: TrackIndex, first_estimate: Estimate) -> Self {
        Track {
            index,
            status: TrackStatus::Live,
            estimates: vec![first_estimate],
            consecutive_misses: 0,
            consecutive_instability: 0,
        }
    }

    /// Append a new estimate. Enforces the strictly-increasing-timestamp
    /// invariant; returns `TimestampViolation` rather than silently
    /// accepting an out-of-order scan.
    pub fn push_estimate(&mut self, estimate: Estimate) -> Result<(), TrackingError> {
        let previous = self.estimates.last().map(|e| e.timestamp);
        if let Some(previous) = previous {
            if !(estimate.timestamp > previous) {
                return Err(TrackingError::TimestampViolation {
                    previous,
                    new: estimate.timestamp,
                });
            }
        }
        self.estimates.push(estimate);
        Ok(())
    }

    pub fn last(&self) -> &Estimate {
        self.estimates
            .last()
            .expect("a Track always has at least one estimate")
    }

    pub fn estimates(&self) -> &[Estimate] {
        &self.estimates
    }

    pub fn is_live(&self) -> bool {
        self.status == TrackStatus::Live
    }
}

/// The full set of tracks a `Manager` has ever created, keyed by their
/// never-reused `TrackIndex`. The `Manager` is the sole owner: initiators
/// hand back `PromotedSeed`s instead of constructing `Track`s themselves so
/// that index assignment stays centralized here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackFile {
    tracks: HashMap<TrackIndex, Track>,
    next_index: u64,
}

impl TrackFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: TrackIndex) -> Option<&Track> {
        self.tracks.get(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn live_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values().filter(|t| t.is_live())
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Assigns the next monotonic index to a promoted seed and inserts it.
    pub(crate) fn insert_seed(&mut self, seed: PromotedSeed) -> TrackIndex {
        let index = TrackIndex(self.next_index);
        self.next_index += 1;
        let mut estimate = seed.estimate;
        estimate.track_index = index;
        self.tracks.insert(index, Track::new(index, estimate));
        index
    }

    pub(crate) fn get_mut(&mut self, index: TrackIndex) -> Option<&mut Track> {
        self.tracks.get_mut(&index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EstimateKind;
    use nalgebra::{Matrix4, Vector4};

    fn est(t: f64) -> Estimate {
        Estimate {
            timestamp: t,
            mean: Vector4::zeros(),
            covariance: Matrix4::identity(),
            kind: EstimateKind::Posterior,
            existence_probability: None,
            track_index: TrackIndex(0),
        }
    }

    #[test]
    fn rejects_out_of_order_timestamps() {
        let mut track = Track::new(TrackIndex(0), est(1.0));
        assert!(track.push_estimate(est(1.0)).is_err());
        assert!(track.push_estimate(est(0.5)).is_err());
        assert!(track.push_estimate(est(2.0)).is_ok());
        assert_eq!(track.estimates().len(), 2);
    }

    #[test]
    fn new_track_has_one_estimate() {
        let track = Track::new(TrackIndex(3), est(0.0));
        assert_eq!(track.estimates().len(), 1);
        assert_eq!(track.index, TrackIndex(3));
        assert!(track.is_live());
    }

    #[test]
    fn track_file_survives_a_bincode_round_trip() {
        let mut file = TrackFile::new();
        let index = file.insert_seed(PromotedSeed { estimate: est(0.0) });
        file.get_mut(index).unwrap().push_estimate(est(1.0)).unwrap();

        let encoded = bincode::serialize(&file).expect("bincode encode");
        let decoded: TrackFile = bincode::deserialize(&encoded).expect("bincode decode");

        assert_eq!(decoded.len(), file.len());
        let original = file.get(index).unwrap();
        let restored = decoded.get(index).unwrap();
        assert_eq!(restored.estimates().len(), original.estimates().len());
        assert_eq!(restored.last().timestamp, original.last().timestamp);
    }
}
