//! Advection integrators: Euler and adaptive RK4 (`SPEC_FULL.md` §4.5.2).
//!
//! Modeled as a strategy trait with two implementations selected at runtime,
//! replacing the source's two parallel switch-by-flag code paths (§9).

use tracing::warn;

use crate::config::Rk4Config;
use crate::field::{CurrentFieldService, VelocitySample};
use crate::math::K_UPS;

/// A proposed displacement in the local plane, plus the mean velocity over
/// the step (stored on the particle afterwards) and whether any sample fell
/// on land (triggering the caller's path-safety rule).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    pub dx_km: f64,
    pub dy_km: f64,
    pub mean_u: f64,
    pub mean_v: f64,
    pub touched_land: bool,
}

#[async_trait::async_trait]
pub trait Integrator: Send + Sync {
    async fn advect(
        &self,
        field: &CurrentFieldService,
        lon: f64,
        lat: f64,
        depth_m: f64,
        sim_day: f64,
        delta_days: f64,
    ) -> StepResult;

    /// Advects a whole depth-bucketed group of positions at once (§4.5.8).
    /// The default loops `advect` per position; `Euler` overrides it to go
    /// through `CurrentFieldService::get_velocities_batch` directly.
    async fn advect_batch(
        &self,
        field: &CurrentFieldService,
        positions: &[(f64, f64)],
        depth_m: f64,
        sim_day: f64,
        delta_days: f64,
    ) -> Vec<StepResult> {
        let mut out = Vec::with_capacity(positions.len());
        for &(lon, lat) in positions {
            out.push(self.advect(field, lon, lat, depth_m, sim_day, delta_days).await);
        }
        out
    }
}

/// Single straight-line step using the velocity sampled at the particle's
/// current position.
pub struct Euler;

#[async_trait::async_trait]
impl Integrator for Euler {
    async fn advect(
        &self,
        field: &CurrentFieldService,
        lon: f64,
        lat: f64,
        depth_m: f64,
        sim_day: f64,
        delta_days: f64,
    ) -> StepResult {
        let sample = field.get_velocity(lon, lat, depth_m, sim_day).await;
        euler_step(sample, delta_days)
    }

    async fn advect_batch(
        &self,
        field: &CurrentFieldService,
        positions: &[(f64, f64)],
        depth_m: f64,
        sim_day: f64,
        delta_days: f64,
    ) -> Vec<StepResult> {
        field
            .get_velocities_batch(positions, depth_m, sim_day)
            .await
            .into_iter()
            .map(|sample| euler_step(sample, delta_days))
            .collect()
    }
}

fn euler_step(sample: VelocitySample, delta_days: f64) -> StepResult {
    if !sample.found {
        return StepResult {
            dx_km: 0.0,
            dy_km: 0.0,
            mean_u: 0.0,
            mean_v: 0.0,
            touched_land: true,
        };
    }
    StepResult {
        dx_km: sample.u * K_UPS * delta_days,
        dy_km: sample.v * K_UPS * delta_days,
        mean_u: sample.u,
        mean_v: sample.v,
        touched_land: false,
    }
}

/// Adaptive sub-stepping RK4 integrator (§4.5.2). Falls back to Euler for a
/// sub-step whenever the k1 sample itself lands on a masked cell.
pub struct Rk4 {
    pub config: Rk4Config,
}

#[async_trait::async_trait]
impl Integrator for Rk4 {
    async fn advect(
        &self,
        field: &CurrentFieldService,
        lon: f64,
        lat: f64,
        depth_m: f64,
        sim_day: f64,
        delta_days: f64,
    ) -> StepResult {
        let k1_probe = field.get_velocity(lon, lat, depth_m, sim_day).await;
        if !k1_probe.found {
            // k1 failure: declare the whole RK4 step a failure and fall back to Euler.
            return euler_step(k1_probe, delta_days);
        }

        let speed = (k1_probe.u * k1_probe.u + k1_probe.v * k1_probe.v).sqrt();
        let h = if self.config.adaptive {
            (1.0 / (speed + 1e-3) * self.config.time_step_safety)
                .clamp(self.config.min_step, self.config.max_step)
        } else {
            delta_days.min(self.config.max_step)
        };

        let steps = (delta_days / h).ceil().max(1.0) as u64;
        let h_actual = delta_days / steps as f64;

        let mut cur_lon = lon;
        let mut cur_lat = lat;
        let mut cur_day = sim_day;
        let mut sum_u = 0.0;
        let mut sum_v = 0.0;
        let mut total_dx_km = 0.0;
        let mut total_dy_km = 0.0;
        let mut any_land = false;

        for _ in 0..steps {
            let k1 = field.get_velocity(cur_lon, cur_lat, depth_m, cur_day).await;
            if !k1.found {
                // Already checked before the loop for the first sub-step; a later
                // sub-step hitting land substitutes k1 with the zero default below
                // and is reported through the path-safety check by the caller.
                any_land = true;
            }
            let k1_uv = substitute_if_missing(k1, None);

            let half_step_lon = cur_lon + k1_uv.0 * K_UPS * (h_actual / 2.0) / crate::math::LON_SCALE_KM_PER_DEG;
            let half_step_lat = cur_lat + k1_uv.1 * K_UPS * (h_actual / 2.0) / crate::math::LAT_SCALE_KM_PER_DEG;
            let k2_sample = field
                .get_velocity(half_step_lon, half_step_lat, depth_m, cur_day + h_actual / 2.0)
                .await;
            any_land |= !k2_sample.found;
            let k2_uv = substitute_if_missing(k2_sample, Some(k1_uv));

            let half_step_lon2 = cur_lon + k2_uv.0 * K_UPS * (h_actual / 2.0) / crate::math::LON_SCALE_KM_PER_DEG;
            let half_step_lat2 = cur_lat + k2_uv.1 * K_UPS * (h_actual / 2.0) / crate::math::LAT_SCALE_KM_PER_DEG;
            let k3_sample = field
                .get_velocity(half_step_lon2, half_step_lat2, depth_m, cur_day + h_actual / 2.0)
                .await;
            any_land |= !k3_sample.found;
            let k3_uv = substitute_if_missing(k3_sample, Some(k1_uv));

            let full_step_lon = cur_lon + k3_uv.0 * K_UPS * h_actual / crate::math::LON_SCALE_KM_PER_DEG;
            let full_step_lat = cur_lat + k3_uv.1 * K_UPS * h_actual / crate::math::LAT_SCALE_KM_PER_DEG;
            let k4_sample = field
                .get_velocity(full_step_lon, full_step_lat, depth_m, cur_day + h_actual)
                .await;
            any_land |= !k4_sample.found;
            let k4_uv = substitute_if_missing(k4_sample, Some(k1_uv));

            let u_avg = (k1_uv.0 + 2.0 * k2_uv.0 + 2.0 * k3_uv.0 + k4_uv.0) / 6.0;
            let v_avg = (k1_uv.1 + 2.0 * k2_uv.1 + 2.0 * k3_uv.1 + k4_uv.1) / 6.0;

            let dx_km = u_avg * K_UPS * h_actual;
            let dy_km = v_avg * K_UPS * h_actual;
            total_dx_km += dx_km;
            total_dy_km += dy_km;
            cur_lon += dx_km / crate::math::LON_SCALE_KM_PER_DEG;
            cur_lat += dy_km / crate::math::LAT_SCALE_KM_PER_DEG;
            cur_day += h_actual;
            sum_u += u_avg;
            sum_v += v_avg;
        }

        if any_land {
            warn!(lon, lat, "rk4 sub-step fell back on a masked sample");
        }

        StepResult {
            dx_km: total_dx_km,
            dy_km: total_dy_km,
            mean_u: sum_u / steps as f64,
            mean_v: sum_v / steps as f64,
            touched_land: false,
        }
    }
}

/// Any offset sample that lands on a masked cell substitutes the k1 value
/// for that component only (§4.5.2). For the very first sample (k1 itself)
/// there is no fallback, since that case is handled by the caller before the
/// loop begins.
fn substitute_if_missing(sample: VelocitySample, fallback: Option<(f64, f64)>) -> (f64, f64) {
    if sample.found {
        (sample.u, sample.v)
    } else {
        fallback.unwrap_or((0.0, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euler_step_on_uniform_field() {
        let sample = VelocitySample {
            u: 0.1,
            v: 0.0,
            found: true,
            actual_depth: 0.0,
        };
        let step = euler_step(sample, 10.0);
        assert!((step.dx_km - 86.4).abs() < 1e-9);
        assert_eq!(step.dy_km, 0.0);
    }

    #[test]
    fn euler_step_on_land_zeroes_and_flags() {
        let sample = VelocitySample {
            u: 0.0,
            v: 0.0,
            found: false,
            actual_depth: 0.0,
        };
        let step = euler_step(sample, 10.0);
        assert!(step.touched_land);
        assert_eq!(step.dx_km, 0.0);
    }
}
