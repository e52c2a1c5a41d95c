//! # tracer_drift
//!
//! A Lagrangian particle-transport engine for radionuclide dispersion in a
//! gridded ocean. An ensemble of particles is released from a source
//! location following a multi-phase emission schedule, advected by
//! interpolated currents, scattered by stochastic horizontal and vertical
//! mixing, constrained to ocean cells, and attenuated by radioactive decay.
//!
//! There is no CLI or rendering layer here; a composition root constructs
//! the field services, builds an [`EngineConfig`](config::EngineConfig),
//! and drives [`ParticleEngine::advance`](engine::ParticleEngine::advance)
//! at whatever cadence it chooses. A typical engine configuration, in TOML:
//!
//! ```toml
//! diffusivity_scale = 1.0
//! rk4_enabled = true
//!
//! [rk4]
//! adaptive = true
//! min_step = 0.01
//! max_step = 1.0
//!
//! [land]
//! enabled = true
//! max_search_radius = 10
//!
//! [kz_profile]
//! mixed_layer = 0.01
//! upper_ocean = 0.0001
//! deep_ocean = 0.00005
//! ```
//!
//! Unknown keys in this document are a parse error rather than a silently
//! ignored option: [`EngineConfig`](config::EngineConfig) is a closed
//! struct, one field per recognized option.

pub mod bake;
pub mod config;
pub mod engine;
pub mod error;
pub mod field;
pub mod math;
pub mod particle;
pub mod release;
pub mod tracer;
