//! Current field service: streaming 4-D (day × depth × lat × lon) velocity
//! grid with KD-tree nearest-cell lookup and a bounded day-cache
//! (`SPEC_FULL.md` §4.3).

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::error::FieldError;
use crate::field::cache::{DayCache, DayKey};
use crate::field::format::{read_file, DayEntry, VelocityDay, VelocityMetadata};
use crate::field::kdtree::KdTree;
use crate::math::haversine_m;

const DEFAULT_DEPTHS: [f64; 6] = [0.0, 50.0, 100.0, 200.0, 500.0, 1000.0];

/// Result of a single velocity query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocitySample {
    pub u: f64,
    pub v: f64,
    pub found: bool,
    pub actual_depth: f64,
}

impl VelocitySample {
    fn miss() -> Self {
        VelocitySample {
            u: 0.0,
            v: 0.0,
            found: false,
            actual_depth: 0.0,
        }
    }
}

/// A fully resident day: the parsed arrays plus the KD-tree over its cells.
struct ResidentDay {
    parsed: VelocityDay,
    tree: KdTree,
}

/// Streaming velocity grid service. Loads one day at a time from a
/// directory of binary day-files, indexed by a metadata document listing
/// available days and depth levels.
pub struct CurrentFieldService {
    root: PathBuf,
    metadata: VelocityMetadata,
    cache: DayCache<ResidentDay>,
}

impl CurrentFieldService {
    /// Loads metadata only; does not preload any day (§4.3).
    pub fn init(root: PathBuf, metadata_json: &str, max_days_in_memory: usize) -> Result<Self, FieldError> {
        let metadata = VelocityMetadata::from_json(metadata_json)?;
        info!(days = metadata.days.len(), "current field service initialized");
        Ok(CurrentFieldService {
            root,
            metadata,
            cache: DayCache::new(max_days_in_memory),
        })
    }

    pub fn available_depths(&self) -> Vec<f64> {
        if self.metadata.depths.is_empty() {
            DEFAULT_DEPTHS.to_vec()
        } else {
            self.metadata.depths.clone()
        }
    }

    fn resolve_day(&self, sim_day: f64) -> Option<&DayEntry> {
        let offset = sim_day.floor() as i64;
        self.metadata
            .days
            .iter()
            .find(|d| d.day_offset == offset)
            .or_else(|| self.metadata.days.last())
    }

    fn day_path(&self, entry: &DayEntry) -> PathBuf {
        self.root
            .join(format!("{:04}{:02}{:02}.bin", entry.year, entry.month, entry.day))
    }

    /// Idempotent; concurrent duplicate calls share a single in-flight load.
    pub async fn load_day(&self, sim_day: f64) -> Result<(), FieldError> {
        let entry = self
            .resolve_day(sim_day)
            .ok_or_else(|| FieldError::format("no day entries in metadata"))?
            .clone();
        let key: DayKey = (entry.year, entry.month, entry.day);
        let path = self.day_path(&entry);

        self.cache
            .load_day(key, move || async move {
                let bytes = read_file(&path)?;
                let parsed = VelocityDay::parse(&bytes)?;
                let tree = KdTree::build(parsed.n_lat, parsed.n_lon, &parsed.lon, &parsed.lat);
                info!(year = key.0, month = key.1, day = key.2, "loaded velocity day");
                Ok::<_, FieldError>(ResidentDay { parsed, tree })
            })
            .await?;
        Ok(())
    }

    fn nearest_depth_index(&self, depth_m: f64) -> (usize, f64) {
        let depths = self.available_depths();
        let mut best_index = 0;
        let mut best_diff = f64::MAX;
        for (i, &d) in depths.iter().enumerate() {
            let diff = (d - depth_m).abs();
            if diff < best_diff {
                best_diff = diff;
                best_index = i;
            }
        }
        (best_index, depths[best_index])
    }

    async fn ensure_day(&self, sim_day: f64) -> Result<(), FieldError> {
        self.load_day(sim_day).await
    }

    /// Returns `{u, v, found, actual_depth}` at the nearest cell and nearest
    /// discrete depth level (§4.3).
    pub async fn get_velocity(&self, lon: f64, lat: f64, depth_m: f64, sim_day: f64) -> VelocitySample {
        if self.ensure_day(sim_day).await.is_err() {
            return VelocitySample::miss();
        }
        let entry = match self.resolve_day(sim_day) {
            Some(e) => e.clone(),
            None => return VelocitySample::miss(),
        };
        let key: DayKey = (entry.year, entry.month, entry.day);

        let inner = self.cache.load_day(key, || async {
            Err::<ResidentDay, FieldError>(FieldError::format("unreachable: day already resident"))
        });
        // If the day is already resident this resolves instantly via the Ready branch;
        // if it somehow isn't (evicted between ensure_day and here), treat as a miss.
        let resident = match inner.await {
            Ok(day) => day,
            Err(_) => return VelocitySample::miss(),
        };

        let (depth_index, actual_depth) = self.nearest_depth_index(depth_m);
        let cell = match resident.tree.nearest(lon, lat) {
            Some(c) => c,
            None => {
                let err = FieldError::GridMiss;
                error!(%err, lon, lat, "query fell outside the indexed envelope");
                return VelocitySample::miss();
            }
        };

        let cells = resident.parsed.n_lat * resident.parsed.n_lon;
        let offset = depth_index * cells + cell.flat_index;
        let (u, v) = match (resident.parsed.u.get(offset), resident.parsed.v.get(offset)) {
            (Some(&u), Some(&v)) => (u, v),
            _ => return VelocitySample::miss(),
        };

        if VelocityDay::is_land_value(u) || VelocityDay::is_land_value(v) {
            return VelocitySample::miss();
        }

        VelocitySample {
            u: u as f64,
            v: v as f64,
            found: true,
            actual_depth,
        }
    }

    /// Same semantics as `get_velocity`, batched to share the day load and
    /// depth index across positions.
    pub async fn get_velocities_batch(
        &self,
        positions: &[(f64, f64)],
        depth_m: f64,
        sim_day: f64,
    ) -> Vec<VelocitySample> {
        let mut out = Vec::with_capacity(positions.len());
        for &(lon, lat) in positions {
            out.push(self.get_velocity(lon, lat, depth_m, sim_day).await);
        }
        out
    }

    pub async fn is_ocean(&self, lon: f64, lat: f64, depth_m: f64, sim_day: f64) -> bool {
        self.get_velocity(lon, lat, depth_m, sim_day).await.found
    }

    /// Spiral search outward from the KD-tree nearest cell, checking
    /// sentinels, stopping at `max_radius_cells`.
    pub async fn find_nearest_ocean_cell(
        &self,
        lon: f64,
        lat: f64,
        depth_m: f64,
        sim_day: f64,
        max_radius_cells: u32,
    ) -> Option<(f64, f64, usize, usize, f64)> {
        if self.ensure_day(sim_day).await.is_err() {
            return None;
        }
        let entry = self.resolve_day(sim_day)?.clone();
        let key: DayKey = (entry.year, entry.month, entry.day);
        let resident = self
            .cache
            .load_day(key, || async {
                Err::<ResidentDay, FieldError>(FieldError::format("unreachable"))
            })
            .await
            .ok()?;

        let (depth_index, actual_depth) = self.nearest_depth_index(depth_m);
        let start = resident.tree.nearest(lon, lat)?;
        let n_lon = resident.parsed.n_lon as i64;
        let n_lat = resident.parsed.n_lat as i64;
        let cells = resident.parsed.n_lat * resident.parsed.n_lon;

        for radius in 0..=(max_radius_cells as i64) {
            for di in -radius..=radius {
                for dj in -radius..=radius {
                    if di.abs() != radius && dj.abs() != radius {
                        continue;
                    }
                    let i = start.i as i64 + di;
                    let j = start.j as i64 + dj;
                    if i < 0 || j < 0 || i >= n_lat || j >= n_lon {
                        continue;
                    }
                    let flat = i as usize * resident.parsed.n_lon + j as usize;
                    let offset = depth_index * cells + flat;
                    let (Some(&u), Some(&v)) =
                        (resident.parsed.u.get(offset), resident.parsed.v.get(offset))
                    else {
                        continue;
                    };
                    if VelocityDay::is_land_value(u) || VelocityDay::is_land_value(v) {
                        continue;
                    }
                    let cell_lon = resident.parsed.lon[flat] as f64;
                    let cell_lat = resident.parsed.lat[flat] as f64;
                    return Some((cell_lon, cell_lat, i as usize, j as usize, actual_depth));
                }
            }
        }
        warn!(lon, lat, max_radius_cells, "no ocean cell found within search radius");
        None
    }
}

/// Haversine convenience re-export for callers that need raw distance
/// without going through the field service (used by the engine's land
/// reversion step).
pub fn distance_m(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    haversine_m(lon1, lat1, lon2, lat2)
}
