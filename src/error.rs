//! Error types for the tracking core.
//!
//! Two families: [`ConfigError`] is raised at construction time and is
//! always fatal to the caller. [`TrackingError`] wraps it and adds the two
//! scan-time faults a `Manager` can encounter while stepping.

use thiserror::Error;

use crate::track::TrackIndex;

/// Errors raised when constructing a component with out-of-range parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("gating probability p_g must be in (0,1), got {0}")]
    InvalidGatingProbability(f64),

    #[error("velocity cap v_max must be >= 0, got {0}")]
    InvalidVelocityCap(f64),

    #[error("detection probability p_d must be in (0,1], got {0}")]
    InvalidDetectionProbability(f64),

    #[error("clutter density lambda must be > 0, got {0}")]
    InvalidClutterDensity(f64),

    #[error("scan area must be > 0, got {0}")]
    InvalidScanArea(f64),

    #[error("sampling interval dt must be > 0, got {0}")]
    InvalidSamplingInterval(f64),

    #[error("M-of-N initiation requires n >= m >= 1, got m={m}, n={n}")]
    InvalidMofN { m: u32, n: u32 },

    #[error("n_terminate must be >= 1, got {0}")]
    InvalidTerminationWindow(u32),

    #[error("IPDA Markov probabilities must be in [0,1], got p11={p11}, p21={p21}")]
    InvalidMarkovProbabilities { p11: f64, p21: f64 },

    #[error(
        "IPDA thresholds require 0 < terminate_threshold < initiate_threshold < 1, \
         got initiate={initiate}, terminate={terminate}"
    )]
    InvalidIpdaThresholds { initiate: f64, terminate: f64 },

    #[error("initial existence probability must be in [0,1], got {0}")]
    InvalidInitialExistence(f64),

    #[error("measurement covariance is not symmetric positive-definite")]
    NonPsdCovariance,
}

/// Errors that can occur while the `Manager` steps a scan.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackingError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// Non-finite entries after predict/update, or a singular innovation
    /// covariance. The `Manager` treats this as a miss and continues; two
    /// consecutive failures on the same track terminate it (§7).
    #[error("numerical instability in track {track:?}: {reason}")]
    NumericalInstability { track: TrackIndex, reason: String },

    /// Scan timestamp did not strictly increase past the previous one.
    /// Fatal: the manager has not mutated any state when this is returned.
    #[error("scan timestamp {new} did not strictly increase past {previous}")]
    TimestampViolation { previous: f64, new: f64 },
}
