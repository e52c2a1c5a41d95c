//! Aggregate ensemble statistics, updated once per `advance` (`SPEC_FULL.md` §4.5, §5).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    pub total_released: u64,
    pub total_decayed: u64,
    pub max_concentration: f64,
    pub max_depth_reached: f64,
    pub particles_on_land: u64,
    pub active_particles: u64,
    pub simulation_days: f64,
}

impl EngineStats {
    pub fn new() -> Self {
        EngineStats::default()
    }

    pub fn reset(&mut self) {
        *self = EngineStats::default();
    }

    pub fn observe_concentration(&mut self, concentration: f64) {
        if concentration > self.max_concentration {
            self.max_concentration = concentration;
        }
    }

    pub fn observe_depth(&mut self, depth: f64) {
        if depth > self.max_depth_reached {
            self.max_depth_reached = depth;
        }
    }
}
