//! The particle engine and its advection strategies (`SPEC_FULL.md` §4.5).

pub mod engine;
pub mod integrator;
pub mod stats;

pub use engine::{EngineState, ParticleEngine};
pub use integrator::{Euler, Integrator, Rk4};
pub use stats::EngineStats;
