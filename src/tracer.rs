//! Immutable catalog of radionuclide parameters (`SPEC_FULL.md` §4.1).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Parameters for a single radionuclide tracer. Immutable once loaded into the
/// catalog; a `Tracer` is cheap to `Clone` so the engine can hand each particle
/// its own copy without borrowing from the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracer {
    pub id: String,
    pub display_name: String,
    /// `None` means the tracer does not decay (e.g. a conservative dye tracer).
    pub half_life_days: Option<f64>,
    pub default_inventory_bq: f64,
    pub diffusivity_scale: f64,
    /// Settling velocity, m/s. Zero for the radionuclides this spec targets.
    pub settling_velocity_m_s: f64,
    pub sigma_h_m: f64,
    pub sigma_v_m: f64,
}

impl Tracer {
    pub fn decays(&self) -> bool {
        self.half_life_days.is_some()
    }
}

const DAYS_PER_YEAR: f64 = 365.25;

fn cs137() -> Tracer {
    Tracer {
        id: "Cs-137".to_string(),
        display_name: "Caesium-137".to_string(),
        half_life_days: Some(30.1 * DAYS_PER_YEAR),
        default_inventory_bq: 16.2e6 * 1e9, // 16.2 PBq default inventory, in Bq
        diffusivity_scale: 1.0,
        settling_velocity_m_s: 0.0,
        sigma_h_m: 20_000.0,
        sigma_v_m: 50.0,
    }
}

fn cs134() -> Tracer {
    Tracer {
        id: "Cs-134".to_string(),
        display_name: "Caesium-134".to_string(),
        half_life_days: Some(2.06 * DAYS_PER_YEAR),
        default_inventory_bq: 1.0e6 * 1e9,
        diffusivity_scale: 1.0,
        settling_velocity_m_s: 0.0,
        sigma_h_m: 20_000.0,
        sigma_v_m: 50.0,
    }
}

fn i131() -> Tracer {
    Tracer {
        id: "I-131".to_string(),
        display_name: "Iodine-131".to_string(),
        half_life_days: Some(8.0),
        default_inventory_bq: 1.0e6 * 1e9,
        diffusivity_scale: 1.1,
        settling_velocity_m_s: 0.0,
        sigma_h_m: 18_000.0,
        sigma_v_m: 40.0,
    }
}

fn sr90() -> Tracer {
    Tracer {
        id: "Sr-90".to_string(),
        display_name: "Strontium-90".to_string(),
        half_life_days: Some(28.8 * DAYS_PER_YEAR),
        default_inventory_bq: 0.5e6 * 1e9,
        diffusivity_scale: 0.9,
        settling_velocity_m_s: 0.0,
        sigma_h_m: 22_000.0,
        sigma_v_m: 55.0,
    }
}

fn h3() -> Tracer {
    Tracer {
        id: "H-3".to_string(),
        display_name: "Tritium".to_string(),
        half_life_days: Some(12.3 * DAYS_PER_YEAR),
        default_inventory_bq: 2.0e6 * 1e9,
        diffusivity_scale: 1.3,
        settling_velocity_m_s: 0.0,
        sigma_h_m: 25_000.0,
        sigma_v_m: 60.0,
    }
}

/// Read-only mapping from tracer id to tracer record.
#[derive(Debug, Clone)]
pub struct TracerLibrary {
    tracers: HashMap<String, Tracer>,
}

impl TracerLibrary {
    /// Build the catalog containing the five required entries.
    pub fn standard() -> Self {
        let mut tracers = HashMap::new();
        for tracer in [cs137(), cs134(), i131(), sr90(), h3()] {
            tracers.insert(tracer.id.clone(), tracer);
        }
        TracerLibrary { tracers }
    }

    /// Returns the tracer for `id`, falling back to the default Cs-137 entry
    /// when the id is not in the catalog.
    pub fn lookup(&self, id: &str) -> Tracer {
        self.tracers
            .get(id)
            .cloned()
            .unwrap_or_else(|| self.tracers.get("Cs-137").cloned().unwrap())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tracers.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tracers.keys().map(|s| s.as_str())
    }
}

impl Default for TracerLibrary {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_entries_present() {
        let lib = TracerLibrary::standard();
        for id in ["Cs-137", "Cs-134", "I-131", "Sr-90", "H-3"] {
            assert!(lib.contains(id), "missing tracer {id}");
        }
    }

    #[test]
    fn half_lives_match_canonical_values() {
        let lib = TracerLibrary::standard();
        let cs137 = lib.lookup("Cs-137");
        assert!((cs137.half_life_days.unwrap() / DAYS_PER_YEAR - 30.1).abs() < 1e-9);

        let i131 = lib.lookup("I-131");
        assert!((i131.half_life_days.unwrap() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_id_falls_back_to_cs137() {
        let lib = TracerLibrary::standard();
        let fallback = lib.lookup("not-a-real-isotope");
        assert_eq!(fallback.id, "Cs-137");
    }
}
