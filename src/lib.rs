//! A multi-target radar tracking core: DWNA motion model, gated
//! Kalman predict/update, PDAF/IPDAF probabilistic data association, and
//! M-of-N/IPDA track initiation and termination, orchestrated by a
//! `Manager` over a generation-counted `TrackFile`.
//!
//! ```text
//! Measurement ─┬─▶ gate (§per-track validation region)
//!              │
//!  Track ──────┴─▶ Updater (PDAF/IPDAF) ──▶ Estimate ──▶ Track (appended)
//!                       │
//!                       ▼
//!                  Terminator (M-of-N misses / IPDA existence floor)
//!
//!  unassociated
//!  Measurements ──▶ Initiator (M-of-N window / IPDA existence) ──▶ PromotedSeed
//!                                                                       │
//!                                                                       ▼
//!                                                              Manager::TrackFile
//! ```
//!
//! This crate performs no I/O and holds no sockets, threads, or timers: it
//! consumes measurements and timestamps a caller already has in hand and
//! returns estimates and a structured event log. Concurrency, scheduling,
//! and persistence policy belong to the caller.

pub mod config;
pub mod error;
pub mod gate;
pub mod initiation;
pub mod ipdaf;
pub mod manager;
pub mod motion;
pub mod pdaf;
pub mod terminator;
pub mod track;
pub mod types;
pub mod updater;

pub use config::{
    ClutterAreaConfig, DetectionConfig, GatingConfig, IpdaConfig, MofNConfig, MotionConfig,
};
pub use error::{ConfigError, TrackingError};
pub use gate::{GateResult, TrackGate};
pub use initiation::ipda::IpdaInitiator;
pub use initiation::mofn::MofNInitiator;
pub use initiation::{Initiator, PromotedSeed};
pub use ipdaf::{ClutterAreaSource, ExistenceMarkov, IpdafUpdater};
pub use manager::{build_ipda_manager, build_mofn_manager, DoubleUsePolicy, Manager, ManagerEvent};
pub use motion::MotionModel;
pub use pdaf::PdafUpdater;
pub use terminator::{IpdaTerminator, MofNTerminator, Terminator};
pub use track::{Track, TrackFile, TrackIndex, TrackStatus};
pub use types::{measurement_matrix, Estimate, EstimateKind, Measurement};
pub use updater::{predict, StepOutcome, Updater};
