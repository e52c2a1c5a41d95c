//! Closed, TOML-deserializable configuration structs (`SPEC_FULL.md` §4.5, §10.3).
//!
//! Replaces the source's dynamic configuration map: every recognized option is
//! a typed field with a documented default, so an unknown TOML key is a parse
//! error rather than a silently ignored entry.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_diffusivity_scale() -> f64 {
    1.0
}

fn default_simulation_speed() -> f64 {
    1.0
}

fn default_ekman_pumping() -> f64 {
    5e-6
}

fn default_convective_mixing() -> f64 {
    2e-6
}

/// Step-size policy for the RK4 integrator (§4.5.2).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rk4Config {
    #[serde(default = "default_time_step_safety")]
    pub time_step_safety: f64,
    #[serde(default = "default_min_step")]
    pub min_step: f64,
    #[serde(default = "default_max_step")]
    pub max_step: f64,
    #[serde(default = "default_true")]
    pub adaptive: bool,
}

fn default_time_step_safety() -> f64 {
    0.5
}

fn default_min_step() -> f64 {
    0.01
}

fn default_max_step() -> f64 {
    1.0
}

impl Default for Rk4Config {
    fn default() -> Self {
        Rk4Config {
            time_step_safety: default_time_step_safety(),
            min_step: default_min_step(),
            max_step: default_max_step(),
            adaptive: true,
        }
    }
}

/// Land reflection policy (§4.5.5).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LandConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_search_radius")]
    pub max_search_radius: u32,
}

fn default_max_search_radius() -> u32 {
    10
}

impl Default for LandConfig {
    fn default() -> Self {
        LandConfig {
            enabled: true,
            max_search_radius: default_max_search_radius(),
        }
    }
}

/// Piecewise vertical diffusivity, m²/s, by depth band (§4.5.4).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KzProfile {
    #[serde(default = "default_kz_mixed_layer")]
    pub mixed_layer: f64,
    #[serde(default = "default_kz_upper_ocean")]
    pub upper_ocean: f64,
    #[serde(default = "default_kz_deep_ocean")]
    pub deep_ocean: f64,
}

fn default_kz_mixed_layer() -> f64 {
    1e-2
}

fn default_kz_upper_ocean() -> f64 {
    1e-4
}

fn default_kz_deep_ocean() -> f64 {
    5e-5
}

impl Default for KzProfile {
    fn default() -> Self {
        KzProfile {
            mixed_layer: default_kz_mixed_layer(),
            upper_ocean: default_kz_upper_ocean(),
            deep_ocean: default_kz_deep_ocean(),
        }
    }
}

impl KzProfile {
    /// Resolves Kz at a given depth in metres, per the depth bands in §4.5.4.
    pub fn kz_at(&self, depth_m: f64) -> f64 {
        if depth_m < 50.0 {
            self.mixed_layer
        } else if depth_m < 200.0 {
            self.upper_ocean
        } else {
            self.deep_ocean
        }
    }
}

/// The full set of options recognized by the particle engine (§4.5's option
/// table). Every field here appears in exactly one table row; there is no
/// escape hatch for an untyped key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default = "default_diffusivity_scale")]
    pub diffusivity_scale: f64,
    #[serde(default = "default_simulation_speed")]
    pub simulation_speed: f64,
    #[serde(default = "default_true")]
    pub vertical_mixing: bool,
    #[serde(default = "default_ekman_pumping")]
    pub ekman_pumping: f64,
    #[serde(default = "default_convective_mixing")]
    pub convective_mixing: f64,
    #[serde(default)]
    pub rk4_enabled: bool,
    #[serde(default)]
    pub rk4: Rk4Config,
    #[serde(default)]
    pub land: LandConfig,
    #[serde(default)]
    pub kz_profile: KzProfile,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            diffusivity_scale: default_diffusivity_scale(),
            simulation_speed: default_simulation_speed(),
            vertical_mixing: true,
            ekman_pumping: default_ekman_pumping(),
            convective_mixing: default_convective_mixing(),
            rk4_enabled: false,
            rk4: Rk4Config::default(),
            land: LandConfig::default(),
            kz_profile: KzProfile::default(),
        }
    }
}

impl EngineConfig {
    /// Parses an `EngineConfig` from a TOML document, the same way the
    /// composition root loads every other configuration struct.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

fn default_max_days_in_memory() -> usize {
    2
}

fn default_base_date() -> (i32, u32, u32) {
    (2011, 1, 1)
}

/// Field-service configuration: cache size, base date for `sim_day`
/// resolution, and optional bounding-box overrides (§4.3, §5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldServiceConfig {
    #[serde(default = "default_max_days_in_memory")]
    pub max_days_in_memory: usize,
    #[serde(default = "default_base_date")]
    pub base_date: (i32, u32, u32),
    pub bounding_box: Option<BoundingBoxOverride>,
}

impl Default for FieldServiceConfig {
    fn default() -> Self {
        FieldServiceConfig {
            max_days_in_memory: default_max_days_in_memory(),
            base_date: default_base_date(),
            bounding_box: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundingBoxOverride {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.diffusivity_scale, 1.0);
        assert_eq!(cfg.ekman_pumping, 5e-6);
        assert_eq!(cfg.convective_mixing, 2e-6);
        assert!(!cfg.rk4_enabled);
        assert_eq!(cfg.rk4.min_step, 0.01);
        assert_eq!(cfg.land.max_search_radius, 10);
        assert_eq!(cfg.kz_profile.upper_ocean, 1e-4);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let text = r#"
            rk4_enabled = true

            [rk4]
            max_step = 0.5
        "#;
        let cfg = EngineConfig::from_toml(text).unwrap();
        assert!(cfg.rk4_enabled);
        assert_eq!(cfg.rk4.max_step, 0.5);
        assert_eq!(cfg.rk4.min_step, 0.01);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let text = "bogus_option = 5";
        assert!(EngineConfig::from_toml(text).is_err());
    }

    #[test]
    fn kz_profile_depth_bands() {
        let kz = KzProfile::default();
        assert_eq!(kz.kz_at(10.0), kz.mixed_layer);
        assert_eq!(kz.kz_at(100.0), kz.upper_ocean);
        assert_eq!(kz.kz_at(500.0), kz.deep_ocean);
    }
}
