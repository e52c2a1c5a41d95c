//! Multi-phase emission schedule and per-particle activity calibration
//! (`SPEC_FULL.md` §4.2).

use tracing::{debug, info};

use crate::error::ConfigError;
use crate::release::phase::{find_overlap, ReleasePhase, Unit};
use crate::tracer::TracerLibrary;

/// Owns the active tracer selection, the release schedule, and the carry
/// accumulator that lets sub-integer particle counts accrue across steps.
#[derive(Debug, Clone)]
pub struct ReleaseManager {
    tracer_id: String,
    phases: Vec<ReleasePhase>,
    fractional_particle_accumulator: f64,
}

impl ReleaseManager {
    pub fn new(tracer_id: impl Into<String>) -> Self {
        ReleaseManager {
            tracer_id: tracer_id.into(),
            phases: Vec::new(),
            fractional_particle_accumulator: 0.0,
        }
    }

    pub fn tracer_id(&self) -> &str {
        &self.tracer_id
    }

    /// Rebinds the active tracer. Does not touch the phase schedule.
    pub fn set_tracer(
        &mut self,
        library: &TracerLibrary,
        id: impl Into<String>,
    ) -> Result<(), ConfigError> {
        let id = id.into();
        if !library.contains(&id) {
            return Err(ConfigError::UnknownTracer(id));
        }
        self.tracer_id = id;
        Ok(())
    }

    /// Seeds a single phase covering `[0, 30]` days with the tracer's default
    /// inventory expressed in PBq.
    pub fn add_default_phase(&mut self, library: &TracerLibrary) {
        let tracer = library.lookup(&self.tracer_id);
        let total_pbq = tracer.default_inventory_bq / 1e9 / 1e6;
        self.phases = vec![ReleasePhase::new(0.0, 30.0, total_pbq, Unit::PBq)];
        info!(tracer = %self.tracer_id, total_pbq, "seeded default release phase");
    }

    /// Replaces the schedule wholesale. Validation never partially applies:
    /// on any failure the existing schedule is left untouched.
    pub fn set_phases(&mut self, phases: Vec<ReleasePhase>) -> Result<(), ConfigError> {
        for (index, phase) in phases.iter().enumerate() {
            if !phase.is_valid() {
                return Err(ConfigError::InvalidPhaseBounds {
                    index,
                    start: phase.start_day,
                    end: phase.end_day,
                });
            }
        }
        if let Some((a, b)) = find_overlap(&phases) {
            return Err(ConfigError::OverlappingPhases { a, b });
        }
        debug!(count = phases.len(), "accepted release schedule");
        self.phases = phases;
        Ok(())
    }

    pub fn phases(&self) -> &[ReleasePhase] {
        &self.phases
    }

    /// Rate, in the active phase's own declared unit, of the first phase
    /// containing `day`; zero if no phase is active.
    pub fn rate_at(&self, day: f64) -> f64 {
        self.active_phase(day).map(|p| p.rate()).unwrap_or(0.0)
    }

    fn active_phase(&self, day: f64) -> Option<&ReleasePhase> {
        self.phases.iter().find(|p| p.contains(day))
    }

    /// Total released across all phases, normalized to GBq.
    pub fn total_release_in_gbq(&self) -> f64 {
        self.phases.iter().map(|p| p.total_in_gbq()).sum()
    }

    /// Per-particle mass, in Bq, assigned on activation for a pool of
    /// `n_particles`.
    pub fn particle_activity_bq(&self, n_particles: usize) -> f64 {
        if n_particles == 0 {
            return 0.0;
        }
        self.total_release_in_gbq() * 1e9 / n_particles as f64
    }

    /// Rate, in GBq/day, of whichever phase is active at `day`.
    pub fn rate_at_gbq(&self, day: f64) -> f64 {
        self.active_phase(day)
            .map(|p| p.unit.to_gbq(p.rate()))
            .unwrap_or(0.0)
    }

    /// Carries fractional particle counts across steps. Returns the integer
    /// number of particles to release this call; the remainder stays in the
    /// accumulator for the next call.
    pub fn accumulate_particles(&mut self, delta_n: f64) -> u64 {
        self.fractional_particle_accumulator += delta_n;
        let whole = self.fractional_particle_accumulator.floor().max(0.0);
        self.fractional_particle_accumulator -= whole;
        whole as u64
    }

    pub fn fractional_accumulator(&self) -> f64 {
        self.fractional_particle_accumulator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with_phase() -> ReleaseManager {
        let mut m = ReleaseManager::new("Cs-137");
        m.set_phases(vec![ReleasePhase::new(0.0, 30.0, 16.2, Unit::PBq)])
            .unwrap();
        m
    }

    #[test]
    fn rate_at_boundaries() {
        let m = manager_with_phase();
        assert!(m.rate_at(0.0) > 0.0);
        assert!(m.rate_at(30.0) > 0.0);
        assert_eq!(m.rate_at(30.0 + 1e-6), 0.0);
    }

    #[test]
    fn total_release_conversion() {
        let m = manager_with_phase();
        assert!((m.total_release_in_gbq() - 16.2e6).abs() < 1e-6);
    }

    #[test]
    fn particle_activity_calibration() {
        let m = manager_with_phase();
        let n = 10_000;
        let mass_per_particle_bq = m.particle_activity_bq(n);
        let total_bq = mass_per_particle_bq * n as f64;
        assert!((total_bq - m.total_release_in_gbq() * 1e9).abs() < 1.0);
    }

    #[test]
    fn overlapping_phases_rejected_without_partial_apply() {
        let mut m = manager_with_phase();
        let before = m.phases().to_vec();
        let result = m.set_phases(vec![
            ReleasePhase::new(0.0, 10.0, 1.0, Unit::GBq),
            ReleasePhase::new(5.0, 15.0, 1.0, Unit::GBq),
        ]);
        assert!(matches!(result, Err(ConfigError::OverlappingPhases { .. })));
        assert_eq!(m.phases(), before.as_slice());
    }

    #[test]
    fn fractional_accumulator_carries() {
        let mut m = manager_with_phase();
        assert_eq!(m.accumulate_particles(0.4), 0);
        assert_eq!(m.accumulate_particles(0.4), 0);
        // 0.8 + 0.4 = 1.2 -> releases 1, keeps 0.2
        assert_eq!(m.accumulate_particles(0.4), 1);
        assert!((m.fractional_accumulator() - 0.2).abs() < 1e-9);
    }
}
