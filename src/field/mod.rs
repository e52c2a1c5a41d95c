//! Streaming gridded field services: current velocity and eddy diffusivity
//! (`SPEC_FULL.md` §4.3, §4.4).

pub mod bucket_grid;
pub mod cache;
pub mod diffusivity;
pub mod format;
pub mod kdtree;
pub mod velocity;

pub use diffusivity::{DiffusivityFieldService, DiffusivitySample};
pub use velocity::{CurrentFieldService, VelocitySample};
