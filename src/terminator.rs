//! Track termination policies (§4.F, §4.G).

use crate::error::ConfigError;
use crate::track::Track;

/// Decides whether a live, confirmed track should be terminated.
pub trait Terminator {
    fn should_terminate(&self, track: &Track) -> bool;
}

/// Terminates after `n_terminate` consecutive scans with no validated
/// measurement. Two consecutive numerically unstable updates terminate a
/// track regardless of which `Terminator` is configured — the `Manager`
/// enforces that rule itself rather than asking the terminator about it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MofNTerminator {
    n_terminate: u32,
}

impl MofNTerminator {
    pub fn new(n_terminate: u32) -> Result<Self, ConfigError> {
        if n_terminate == 0 {
            return Err(ConfigError::InvalidTerminationWindow(n_terminate));
        }
        Ok(MofNTerminator { n_terminate })
    }
}

impl Terminator for MofNTerminator {
    fn should_terminate(&self, track: &Track) -> bool {
        track.consecutive_misses >= self.n_terminate
    }
}

/// Terminates once a track's existence probability falls to or below
/// `terminate_threshold`. As with `MofNTerminator`, the numerical-instability
/// rule is enforced by the `Manager`, not here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IpdaTerminator {
    terminate_threshold: f64,
}

impl IpdaTerminator {
    pub fn new(terminate_threshold: f64) -> Result<Self, ConfigError> {
        if !(terminate_threshold > 0.0 && terminate_threshold < 1.0) {
            return Err(ConfigError::InvalidIpdaThresholds {
                initiate: 1.0,
                terminate: terminate_threshold,
            });
        }
        Ok(IpdaTerminator {
            terminate_threshold,
        })
    }
}

impl Terminator for IpdaTerminator {
    fn should_terminate(&self, track: &Track) -> bool {
        track
            .last()
            .existence_probability
            .map(|e| e <= self.terminate_threshold)
            .unwrap_or(false)
    }
}
