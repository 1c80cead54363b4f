//! Declarative configuration for assembling a `Manager`.
//!
//! These types are the serializable surface callers use to describe a
//! tracker setup (e.g. loaded from a JSON config file via `serde_json`);
//! `manager::build_mofn_manager`/`build_ipda_manager` turn them into the
//! validated component types.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gate::TrackGate;
use crate::ipdaf::ClutterAreaSource;
use crate::motion::MotionModel;

/// DWNA motion model parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    pub dt: f64,
    pub q: f64,
}

impl MotionConfig {
    pub fn build(&self) -> Result<MotionModel, ConfigError> {
        MotionModel::new(self.dt, self.q)
    }
}

/// Validation gate parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GatingConfig {
    pub p_g: f64,
    pub v_max: f64,
}

impl GatingConfig {
    pub fn build(&self) -> Result<TrackGate, ConfigError> {
        TrackGate::new(self.p_g, self.v_max)
    }
}

/// Detection/clutter parameters shared by PDAF and IPDAF.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub p_d: f64,
    pub clutter_density: f64,
    pub measurement_variance: f64,
}

/// IPDA existence-model parameters, including M-of-N-style initiation
/// knobs reused for the tentative-track window before promotion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IpdaConfig {
    pub p11: f64,
    pub p21: f64,
    pub initial_existence: f64,
    pub initiate_threshold: f64,
    pub terminate_threshold: f64,
    #[serde(default)]
    pub clutter_area: ClutterAreaConfig,
}

/// Serializable mirror of [`ClutterAreaSource`] (that type is not `Default`
/// because `Explicit` has no sensible zero value).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClutterAreaConfig {
    Explicit { area: f64 },
    GateGamma,
    GateVolume,
}

impl Default for ClutterAreaConfig {
    fn default() -> Self {
        ClutterAreaConfig::GateVolume
    }
}

impl From<ClutterAreaConfig> for ClutterAreaSource {
    fn from(value: ClutterAreaConfig) -> Self {
        match value {
            ClutterAreaConfig::Explicit { area } => ClutterAreaSource::Explicit(area),
            ClutterAreaConfig::GateGamma => ClutterAreaSource::GateGamma,
            ClutterAreaConfig::GateVolume => ClutterAreaSource::GateVolume,
        }
    }
}

/// M-of-N initiation/termination window parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MofNConfig {
    pub m_initiate: u32,
    pub n_initiate: u32,
    pub n_terminate: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clutter_area_config_round_trips_through_json() {
        let cfg = ClutterAreaConfig::Explicit { area: 1000.0 };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ClutterAreaConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn default_clutter_area_is_gate_volume() {
        assert_eq!(ClutterAreaConfig::default(), ClutterAreaConfig::GateVolume);
    }
}
