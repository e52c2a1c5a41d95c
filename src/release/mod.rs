//! Release schedule and emission calibration (`SPEC_FULL.md` §4.2).

pub mod manager;
pub mod phase;

pub use manager::ReleaseManager;
pub use phase::{ReleasePhase, Unit};
