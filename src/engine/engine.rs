//! The particle engine: owns the pool, runs the per-step pipeline, and
//! tracks aggregate statistics (`SPEC_FULL.md` §4.5, §5).

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::engine::integrator::{Euler, Integrator, Rk4, StepResult};
use crate::engine::stats::EngineStats;
use crate::error::ConfigError;
use crate::field::{CurrentFieldService, DiffusivityFieldService};
use crate::math::{from_local_plane_km, is_winter, LAT_SCALE_KM_PER_DEG, LON_SCALE_KM_PER_DEG};
use crate::particle::{HistorySample, ParticleRecord, Velocity};
use crate::release::ReleaseManager;
use crate::tracer::TracerLibrary;

const PATH_CHECK_SAMPLES: u32 = 5;

/// Index into `depths` whose value is closest to `depth_m` (§4.5.8 grouping key).
fn nearest_depth_index(depths: &[f64], depth_m: f64) -> usize {
    depths
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (**a - depth_m).abs().partial_cmp(&(**b - depth_m).abs()).unwrap())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Engine lifecycle state (§4.6): `advance` is a no-op unless `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Paused,
}

/// Owns the particle pool, the release schedule, and the two field service
/// handles the integration pipeline consumes. Constructed by the
/// composition root; borrows the field services rather than owning them, so
/// multiple engines (e.g. a live run and a bake) can share one cache.
pub struct ParticleEngine {
    config: EngineConfig,
    tracer_library: TracerLibrary,
    release_manager: ReleaseManager,
    pool: Vec<ParticleRecord>,
    current_field: Arc<CurrentFieldService>,
    diffusivity_field: Arc<DiffusivityFieldService>,
    stats: EngineStats,
    state: EngineState,
    sim_day: f64,
    ref_lon: f64,
    ref_lat: f64,
    base_year: i32,
    rng: StdRng,
}

impl ParticleEngine {
    /// Rejects a non-positive pool size at this configuration boundary
    /// (§7's `InvalidConfiguration`); every other argument is assumed
    /// already validated by its own constructor.
    pub fn new(
        config: EngineConfig,
        tracer_library: TracerLibrary,
        release_manager: ReleaseManager,
        current_field: Arc<CurrentFieldService>,
        diffusivity_field: Arc<DiffusivityFieldService>,
        pool_size: usize,
        ref_lon: f64,
        ref_lat: f64,
        base_year: i32,
    ) -> Result<Self, ConfigError> {
        if pool_size == 0 {
            return Err(ConfigError::NonPositivePoolSize(0));
        }
        let tracer_id = release_manager.tracer_id().to_string();
        let pool = (0..pool_size)
            .map(|id| ParticleRecord::inactive(id as u64, tracer_id.clone()))
            .collect();
        info!(pool_size, tracer = %tracer_id, "particle engine constructed");
        Ok(ParticleEngine {
            config,
            tracer_library,
            release_manager,
            pool,
            current_field,
            diffusivity_field,
            stats: EngineStats::new(),
            state: EngineState::Idle,
            sim_day: 0.0,
            ref_lon,
            ref_lat,
            base_year,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn sim_day(&self) -> f64 {
        self.sim_day
    }

    pub fn pool(&self) -> &[ParticleRecord] {
        &self.pool
    }

    pub fn release_manager(&self) -> &ReleaseManager {
        &self.release_manager
    }

    pub fn release_manager_mut(&mut self) -> &mut ReleaseManager {
        &mut self.release_manager
    }

    pub fn start(&mut self) {
        if self.state == EngineState::Idle {
            self.state = EngineState::Running;
            info!("engine started");
        }
    }

    pub fn pause(&mut self) {
        if self.state == EngineState::Running {
            self.state = EngineState::Paused;
            info!("engine paused");
        }
    }

    pub fn resume(&mut self) {
        if self.state == EngineState::Paused {
            self.state = EngineState::Running;
            info!("engine resumed");
        }
    }

    pub fn reset(&mut self) {
        let tracer_id = self.release_manager.tracer_id().to_string();
        for p in self.pool.iter_mut() {
            *p = ParticleRecord::inactive(p.id, tracer_id.clone());
        }
        self.stats.reset();
        self.sim_day = 0.0;
        self.state = EngineState::Idle;
        info!("engine reset");
    }

    /// Activates up to `n` inactive particles at a position sampled around
    /// the reference release location (§4.5.1). Returns the number actually
    /// activated (0 if the pool has no inactive slots).
    pub fn release(&mut self, n: u64) -> u64 {
        let sigma_deg = 20.0 / LON_SCALE_KM_PER_DEG;
        let normal = Normal::new(0.0, sigma_deg).expect("sigma > 0");
        let mass = self
            .release_manager
            .particle_activity_bq(self.pool.len());

        let mut activated = 0u64;
        for particle in self.pool.iter_mut() {
            if activated >= n {
                break;
            }
            if particle.active {
                continue;
            }
            let dlon = normal.sample(&mut self.rng).clamp(-3.0 * sigma_deg, 3.0 * sigma_deg);
            let dlat = normal.sample(&mut self.rng).clamp(-3.0 * sigma_deg, 3.0 * sigma_deg);
            let x = dlon * LON_SCALE_KM_PER_DEG;
            let y = dlat * LAT_SCALE_KM_PER_DEG;
            particle.activate(x, y, mass, self.sim_day);
            activated += 1;
        }
        if activated > 0 {
            self.stats.total_released += activated;
            debug!(activated, "released particles");
        }
        activated
    }

    /// Determines the active phase's rate at the pre-increment `sim_day`,
    /// converts it to a particle count via the fractional accumulator, and
    /// releases the resulting whole count (§4.5.1).
    pub fn continuous_release(&mut self, delta_days: f64) -> u64 {
        let mass_per_particle = self
            .release_manager
            .particle_activity_bq(self.pool.len());
        if mass_per_particle <= 0.0 {
            return 0;
        }
        let rate_gbq = self.release_manager.rate_at_gbq(self.sim_day);
        let delta_n = rate_gbq * 1e9 * delta_days / mass_per_particle;
        let whole = self.release_manager.accumulate_particles(delta_n);
        if whole > 0 {
            self.release(whole)
        } else {
            0
        }
    }

    fn tracer_for(&self, tracer_id: &str) -> crate::tracer::Tracer {
        self.tracer_library.lookup(tracer_id)
    }

    fn integrator(&self) -> Box<dyn Integrator> {
        if self.config.rk4_enabled {
            Box::new(Rk4 {
                config: self.config.rk4,
            })
        } else {
            Box::new(Euler)
        }
    }

    /// Runs the full per-step pipeline for every active particle, then
    /// advances `sim_day`. A no-op unless the engine is `Running` (§4.6).
    ///
    /// Active particles are partitioned into buckets by nearest discrete
    /// depth level before advection, and each bucket is driven through one
    /// batched velocity query (§4.5.8), rather than querying per particle.
    pub async fn advance(&mut self, delta_days: f64) {
        if self.state != EngineState::Running {
            return;
        }

        self.continuous_release(delta_days);

        let integrator = self.integrator();
        let available_depths = self.current_field.available_depths();

        let mut buckets: std::collections::HashMap<usize, Vec<usize>> = std::collections::HashMap::new();
        for (i, p) in self.pool.iter().enumerate() {
            if !p.active {
                continue;
            }
            let bucket = nearest_depth_index(&available_depths, p.depth * 1000.0);
            buckets.entry(bucket).or_default().push(i);
        }

        for (bucket, indices) in buckets {
            let depth_m = available_depths.get(bucket).copied().unwrap_or(0.0);
            let positions: Vec<(f64, f64)> = indices
                .iter()
                .map(|&i| {
                    let p = &self.pool[i];
                    from_local_plane_km(p.x, p.y, self.ref_lon, self.ref_lat)
                })
                .collect();
            let steps = integrator
                .advect_batch(&self.current_field, &positions, depth_m, self.sim_day, delta_days)
                .await;
            for (index, step) in indices.into_iter().zip(steps) {
                self.step_particle(index, delta_days, step).await;
            }
        }

        self.sim_day += delta_days;
        self.stats.simulation_days = self.sim_day;
        self.stats.active_particles = self.pool.iter().filter(|p| p.active).count() as u64;
    }

    async fn step_particle(&mut self, index: usize, delta_days: f64, step: StepResult) {
        let sim_day = self.sim_day;
        let (prev_x, prev_y, depth, tracer_id) = {
            let p = &self.pool[index];
            (p.x, p.y, p.depth, p.tracer_id.clone())
        };
        let tracer = self.tracer_for(&tracer_id);
        let depth_m = depth * 1000.0;

        let (lon, lat) = from_local_plane_km(prev_x, prev_y, self.ref_lon, self.ref_lat);

        let proposed_x = prev_x + step.dx_km;
        let proposed_y = prev_y + step.dy_km;
        let (advected_x, advected_y, advection_safe) = self
            .path_safe_move((prev_x, prev_y), (proposed_x, proposed_y), depth_m, sim_day)
            .await;

        let mut final_x = advected_x;
        let mut final_y = advected_y;
        let mut velocity = if advection_safe {
            Velocity {
                u: step.mean_u,
                v: step.mean_v,
            }
        } else {
            Velocity::default()
        };

        if advection_safe {
            let (cur_lon, cur_lat) = from_local_plane_km(final_x, final_y, self.ref_lon, self.ref_lat);
            let sample = self.diffusivity_field.get_diffusivity(cur_lon, cur_lat, sim_day).await;
            let k_eff = if sample.found {
                sample.k * self.config.diffusivity_scale * tracer.diffusivity_scale
            } else {
                20.0 * self.config.diffusivity_scale
            };
            let sigma_km = (2.0 * k_eff * delta_days * 86_400.0).sqrt() / 1000.0;
            let normal = Normal::new(0.0, sigma_km.max(1e-12)).expect("sigma > 0");
            let dx = normal.sample(&mut self.rng);
            let dy = normal.sample(&mut self.rng);
            let (diffused_x, diffused_y, diffusion_safe) = self
                .path_safe_move((final_x, final_y), (final_x + dx, final_y + dy), depth_m, sim_day)
                .await;
            final_x = diffused_x;
            final_y = diffused_y;
            if !diffusion_safe {
                velocity = Velocity::default();
            }
        }

        let (final_lon, final_lat) = from_local_plane_km(final_x, final_y, self.ref_lon, self.ref_lat);
        let is_ocean_now = self
            .current_field
            .is_ocean(final_lon, final_lat, depth_m, sim_day)
            .await;

        let mut on_land = false;
        if !is_ocean_now {
            on_land = true;
            final_x = prev_x;
            final_y = prev_y;
            if self.config.land.enabled {
                if let Some((cell_lon, cell_lat, ..)) = self
                    .current_field
                    .find_nearest_ocean_cell(lon, lat, depth_m, sim_day, self.config.land.max_search_radius)
                    .await
                {
                    let (cell_x, cell_y) =
                        crate::math::to_local_plane_km(cell_lon, cell_lat, self.ref_lon, self.ref_lat);
                    final_x = prev_x + (cell_x - prev_x) / 2.0;
                    final_y = prev_y + (cell_y - prev_y) / 2.0;
                }
            }
            velocity = Velocity::default();
        }

        let p = &mut self.pool[index];
        p.x = final_x;
        p.y = final_y;
        p.velocity = velocity;

        if on_land {
            self.stats.particles_on_land += 1;
            p.history.push(HistorySample {
                day: sim_day + delta_days,
                x: final_x,
                y: final_y,
                depth: p.depth,
            });
            return;
        }

        if self.config.vertical_mixing {
            let dt_s = delta_days * 86_400.0;
            let kz = self.config.kz_profile.kz_at(depth_m);
            let noise: f64 = Normal::new(0.0, 1.0).unwrap().sample(&mut self.rng);
            let mut dz = noise * (2.0 * kz * dt_s).sqrt();
            dz += tracer.settling_velocity_m_s * dt_s;
            dz += self.config.ekman_pumping * dt_s;
            let date = chrono::NaiveDate::from_ymd_opt(self.base_year, 1, 1)
                .unwrap()
                .checked_add_signed(chrono::Duration::days(sim_day.floor() as i64))
                .unwrap_or_else(|| chrono::NaiveDate::from_ymd_opt(self.base_year, 1, 1).unwrap());
            let doy = {
                use chrono::Datelike;
                date.ordinal()
            };
            if is_winter(doy) && depth_m < 100.0 {
                dz += self.config.convective_mixing * dt_s;
            }
            let new_depth_m = depth_m + dz;
            p.depth = (new_depth_m / 1000.0).clamp(0.0, 1.0);
        }

        p.age_days += delta_days;
        if let Some(half_life) = tracer.half_life_days {
            p.mass_bq *= 0.5_f64.powf(delta_days / half_life);
            if p.below_mass_threshold() {
                p.active = false;
                self.stats.total_decayed += 1;
            }
        }

        let mass_for_concentration = match tracer.half_life_days {
            Some(half_life) => p.initial_mass_bq * 0.5_f64.powf(p.age_days / half_life),
            None => p.initial_mass_bq,
        };
        let volume_m3 = (2.0 * std::f64::consts::PI).powf(1.5) * tracer.sigma_h_m.powi(2) * tracer.sigma_v_m;
        p.concentration_bq_m3 = mass_for_concentration / volume_m3.max(1e9);

        self.stats.observe_concentration(p.concentration_bq_m3);
        self.stats.observe_depth(p.depth);

        p.history.push(HistorySample {
            day: sim_day + delta_days,
            x: p.x,
            y: p.y,
            depth: p.depth,
        });
    }

    /// Samples `PATH_CHECK_SAMPLES` evenly spaced interior points between
    /// `prev` and `new`; returns the farthest verified-safe point and
    /// whether the whole segment was safe (§4.5.5 item 1).
    async fn path_safe_move(
        &self,
        prev: (f64, f64),
        new: (f64, f64),
        depth_m: f64,
        sim_day: f64,
    ) -> (f64, f64, bool) {
        let mut last_safe = prev;
        for i in 1..=PATH_CHECK_SAMPLES {
            let t = i as f64 / (PATH_CHECK_SAMPLES + 1) as f64;
            let x = prev.0 + (new.0 - prev.0) * t;
            let y = prev.1 + (new.1 - prev.1) * t;
            let (lon, lat) = from_local_plane_km(x, y, self.ref_lon, self.ref_lat);
            if self.current_field.is_ocean(lon, lat, depth_m, sim_day).await {
                last_safe = (x, y);
            } else {
                return (last_safe.0, last_safe.1, false);
            }
        }
        (new.0, new.1, true)
    }
}
