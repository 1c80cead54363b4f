//! The track manager: owns the `TrackFile` and the per-scan orchestration
//! of predict/gate/update, termination, and initiation (§4.H, §4.I).

use std::collections::HashSet;

use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

use crate::config::{DetectionConfig, GatingConfig, IpdaConfig, MofNConfig, MotionConfig};
use crate::error::TrackingError;
use crate::gate::TrackGate;
use crate::initiation::ipda::IpdaInitiator;
use crate::initiation::mofn::MofNInitiator;
use crate::initiation::Initiator;
use crate::ipdaf::{ExistenceMarkov, IpdafUpdater};
use crate::motion::MotionModel;
use crate::pdaf::PdafUpdater;
use crate::terminator::{IpdaTerminator, MofNTerminator, Terminator};
use crate::track::{TrackFile, TrackIndex, TrackStatus};
use crate::types::Measurement;
use crate::updater::Updater;

/// Whether a measurement that updated a confirmed track this scan may also
/// be handed to the initiator for starting/growing tentative tracks.
///
/// The spec leaves this open; exposing it as a policy rather than picking
/// one silently lets a caller match whatever convention their sensor
/// pipeline already assumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoubleUsePolicy {
    /// The initiator sees every measurement in the scan, regardless of
    /// whether a confirmed track also associated with it.
    Allow,
    /// Measurements that fell inside a live confirmed track's gate this
    /// scan are withheld from the initiator.
    ExcludeConfirmedFromInitiation,
}

/// A structured record of what happened to one track during one `step`.
/// The core does not log; this is how callers observe it instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagerEvent {
    TrackInitiated(TrackIndex),
    TrackUpdated(TrackIndex),
    TrackMissed(TrackIndex),
    TrackUnstable(TrackIndex),
    TrackTerminated(TrackIndex),
}

/// Drives a population of tracks through repeated scans.
///
/// Generic over the three swappable policies (`U`pdater, `I`nitiator,
/// `T`erminator) so the PDAF/M-of-N and IPDAF/IPDA pipelines share one
/// orchestration loop through static dispatch rather than a tagged enum —
/// the two configurations don't share any state that would make an enum's
/// shared-variant fields pull their weight.
pub struct Manager<U: Updater, I: Initiator, T: Terminator> {
    motion: MotionModel,
    gate: TrackGate,
    r: Matrix2<f64>,
    updater: U,
    initiator: I,
    terminator: T,
    double_use_policy: DoubleUsePolicy,
    track_file: TrackFile,
    last_timestamp: Option<f64>,
}

impl<U: Updater, I: Initiator, T: Terminator> Manager<U, I, T> {
    pub fn new(
        motion: MotionModel,
        gate: TrackGate,
        r: Matrix2<f64>,
        updater: U,
        initiator: I,
        terminator: T,
        double_use_policy: DoubleUsePolicy,
    ) -> Self {
        Manager {
            motion,
            gate,
            r,
            updater,
            initiator,
            terminator,
            double_use_policy,
            track_file: TrackFile::new(),
            last_timestamp: None,
        }
    }

    pub fn track_file(&self) -> &TrackFile {
        &self.track_file
    }

    /// Advances every live track and the tentative-track population by one
    /// scan. Returns the events produced, in no particular cross-track
    /// order; a track newly promoted this scan is not itself stepped until
    /// the next call.
    pub fn step(
        &mut self,
        timestamp: f64,
        measurements: &[Measurement],
    ) -> Result<Vec<ManagerEvent>, TrackingError> {
        if let Some(previous) = self.last_timestamp {
            if !(timestamp > previous) {
                return Err(TrackingError::TimestampViolation {
                    previous,
                    new: timestamp,
                });
            }
        }

        let mut events = Vec::new();

        let live_indices: Vec<TrackIndex> = self
            .track_file
            .live_tracks()
            .map(|t| t.index)
            .collect();

        // Phase 1: read-only dry run of confirmed-track gating, used only to
        // decide what the initiator gets to see this scan.
        let initiation_measurements: Vec<Measurement> = match self.double_use_policy {
            DoubleUsePolicy::Allow => measurements.to_vec(),
            DoubleUsePolicy::ExcludeConfirmedFromInitiation => {
                let mut confirmed_admitted: HashSet<usize> = HashSet::new();
                for &index in &live_indices {
                    let track = self
                        .track_file
                        .get(index)
                        .expect("index came from live_tracks on self.track_file");
                    if let Some(admitted) = self.updater.gated_indices(
                        &self.motion,
                        &self.gate,
                        &self.r,
                        track,
                        measurements,
                        timestamp,
                    ) {
                        confirmed_admitted.extend(admitted);
                    }
                }
                measurements
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !confirmed_admitted.contains(i))
                    .map(|(_, m)| *m)
                    .collect()
            }
        };

        // Phase 2: initiate/promote. A track promoted this scan is not
        // additionally stepped below — its seed estimate already reflects
        // this scan's evidence.
        for seed in self.initiator.step(timestamp, &initiation_measurements) {
            let index = self.track_file.insert_seed(seed);
            events.push(ManagerEvent::TrackInitiated(index));
        }

        // Phase 3: predict/gate/fuse every confirmed track that was live
        // before this scan, against the full, unfiltered measurement set.
        for index in live_indices {
            let track = self
                .track_file
                .get(index)
                .expect("index came from live_tracks on self.track_file");

            match self
                .updater
                .step(&self.motion, &self.gate, &self.r, track, measurements, timestamp)
            {
                Ok(outcome) => {
                    let missed = outcome.missed;
                    let track_mut = self
                        .track_file
                        .get_mut(index)
                        .expect("index came from live_tracks on self.track_file");
                    track_mut.push_estimate(outcome.estimate)?;
                    track_mut.consecutive_instability = 0;
                    if missed {
                        track_mut.consecutive_misses += 1;
                        events.push(ManagerEvent::TrackMissed(index));
                    } else {
                        track_mut.consecutive_misses = 0;
                        events.push(ManagerEvent::TrackUpdated(index));
                    }
                }
                Err(TrackingError::NumericalInstability { .. }) => {
                    let track_mut = self
                        .track_file
                        .get_mut(index)
                        .expect("index came from live_tracks on self.track_file");
                    track_mut.consecutive_instability += 1;
                    events.push(ManagerEvent::TrackUnstable(index));

                    // Two consecutive instability failures terminate a track
                    // regardless of the configured terminator.
                    if track_mut.consecutive_instability >= 2 {
                        track_mut.status = TrackStatus::Terminated;
                        events.push(ManagerEvent::TrackTerminated(index));
                        continue;
                    }
                }
                Err(other) => return Err(other),
            }

            let track = self
                .track_file
                .get(index)
                .expect("index came from live_tracks on self.track_file");
            if track.is_live() && self.terminator.should_terminate(track) {
                let track_mut = self
                    .track_file
                    .get_mut(index)
                    .expect("index came from live_tracks on self.track_file");
                track_mut.status = TrackStatus::Terminated;
                events.push(ManagerEvent::TrackTerminated(index));
            }
        }

        self.last_timestamp = Some(timestamp);
        Ok(events)
    }
}

/// Assembles a PDAF + M-of-N tracker from declarative configuration.
pub fn build_mofn_manager(
    motion_cfg: MotionConfig,
    gating_cfg: GatingConfig,
    detection_cfg: DetectionConfig,
    mofn_cfg: MofNConfig,
    double_use_policy: DoubleUsePolicy,
) -> Result<Manager<PdafUpdater, MofNInitiator, MofNTerminator>, TrackingError> {
    let motion = motion_cfg.build()?;
    let gate = gating_cfg.build()?;
    let r = Matrix2::identity() * detection_cfg.measurement_variance;
    let updater = PdafUpdater::new(detection_cfg.p_d, detection_cfg.clutter_density)?;
    let initiator = MofNInitiator::new(
        mofn_cfg.m_initiate,
        mofn_cfg.n_initiate,
        motion,
        gate,
        r,
        updater,
    )?;
    let terminator = MofNTerminator::new(mofn_cfg.n_terminate)?;
    Ok(Manager::new(
        motion,
        gate,
        r,
        updater,
        initiator,
        terminator,
        double_use_policy,
    ))
}

/// Assembles an IPDAF + IPDA tracker from declarative configuration.
pub fn build_ipda_manager(
    motion_cfg: MotionConfig,
    gating_cfg: GatingConfig,
    detection_cfg: DetectionConfig,
    ipda_cfg: IpdaConfig,
    double_use_policy: DoubleUsePolicy,
) -> Result<Manager<IpdafUpdater, IpdaInitiator, IpdaTerminator>, TrackingError> {
    let motion = motion_cfg.build()?;
    let gate = gating_cfg.build()?;
    let r = Matrix2::identity() * detection_cfg.measurement_variance;
    let markov = ExistenceMarkov::new(ipda_cfg.p11, ipda_cfg.p21)?;
    let updater = IpdafUpdater::new(detection_cfg.p_d, markov, ipda_cfg.clutter_area.into())?;
    let initiator = IpdaInitiator::new(
        motion,
        gate,
        r,
        updater,
        ipda_cfg.initial_existence,
        ipda_cfg.initiate_threshold,
        ipda_cfg.terminate_threshold,
    )?;
    let terminator = IpdaTerminator::new(ipda_cfg.terminate_threshold)?;
    Ok(Manager::new(
        motion,
        gate,
        r,
        updater,
        initiator,
        terminator,
        double_use_policy,
    ))
}
