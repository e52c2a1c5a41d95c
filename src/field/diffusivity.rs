//! Diffusivity field service: streaming 3-D (day × lat × lon) eddy
//! diffusivity grid with a coarse bucket-grid spatial index
//! (`SPEC_FULL.md` §4.4).

use std::path::PathBuf;

use tracing::info;

use crate::error::FieldError;
use crate::field::bucket_grid::BucketGrid;
use crate::field::cache::{DayCache, DayKey};
use crate::field::format::{read_file, DiffusivityCoordinates, DiffusivityDay, DiffusivityMetadata};

const K_MIN: f64 = 20.0;
const K_MAX: f64 = 3000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffusivitySample {
    pub k: f64,
    pub found: bool,
}

impl DiffusivitySample {
    fn miss() -> Self {
        DiffusivitySample { k: K_MIN, found: false }
    }
}

struct ResidentDay {
    parsed: DiffusivityDay,
}

/// Streaming diffusivity grid service. Coordinates load once from a
/// dedicated coordinate file; each day file holds only the scalar K field.
pub struct DiffusivityFieldService {
    root: PathBuf,
    metadata: DiffusivityMetadata,
    coords: DiffusivityCoordinates,
    index: BucketGrid,
    cache: DayCache<ResidentDay>,
}

impl DiffusivityFieldService {
    pub fn init(
        root: PathBuf,
        metadata_json: &str,
        coordinate_file: &std::path::Path,
        max_days_in_memory: usize,
    ) -> Result<Self, FieldError> {
        let metadata = DiffusivityMetadata::from_json(metadata_json)?;
        let coord_bytes = read_file(coordinate_file)?;
        let coords = DiffusivityCoordinates::parse(&coord_bytes)?;
        let index = BucketGrid::build(&coords.lon, &coords.lat);
        info!(total_days = metadata.total_days, "diffusivity field service initialized");
        Ok(DiffusivityFieldService {
            root,
            metadata,
            coords,
            index,
            cache: DayCache::new(max_days_in_memory),
        })
    }

    fn resolve_day(&self, sim_day: f64) -> Option<u32> {
        let offset = sim_day.floor() as i64;
        if offset < 0 {
            return self.metadata.dates.first().copied();
        }
        self.metadata
            .dates
            .get(offset as usize)
            .copied()
            .or_else(|| self.metadata.dates.last().copied())
    }

    fn day_key(date: u32) -> DayKey {
        let year = (date / 10_000) as i32;
        let month = (date / 100) % 100;
        let day = date % 100;
        (year, month, day)
    }

    fn day_path(&self, date: u32) -> PathBuf {
        self.root.join(format!("{date}.bin"))
    }

    pub async fn load_day(&self, sim_day: f64) -> Result<(), FieldError> {
        let date = self
            .resolve_day(sim_day)
            .ok_or_else(|| FieldError::format("no dates in diffusivity metadata"))?;
        let key = Self::day_key(date);
        let path = self.day_path(date);
        let cells = self.coords.n_lat * self.coords.n_lon;

        self.cache
            .load_day(key, move || async move {
                let bytes = read_file(&path)?;
                let parsed = DiffusivityDay::parse(&bytes, cells)?;
                info!(date, "loaded diffusivity day");
                Ok::<_, FieldError>(ResidentDay { parsed })
            })
            .await?;
        Ok(())
    }

    /// Returns `{K, found}`, clamped to `[20, 3000]` m²/s on success; on
    /// miss returns `K=20, found=false` (§4.4).
    pub async fn get_diffusivity(&self, lon: f64, lat: f64, sim_day: f64) -> DiffusivitySample {
        if self.load_day(sim_day).await.is_err() {
            return DiffusivitySample::miss();
        }
        let date = match self.resolve_day(sim_day) {
            Some(d) => d,
            None => return DiffusivitySample::miss(),
        };
        let key = Self::day_key(date);

        let resident = match self
            .cache
            .load_day(key, || async {
                Err::<ResidentDay, FieldError>(FieldError::format("unreachable"))
            })
            .await
        {
            Ok(day) => day,
            Err(_) => return DiffusivitySample::miss(),
        };

        let cell = match self.index.nearest(lon, lat) {
            Some(c) => c,
            None => return DiffusivitySample::miss(),
        };

        let raw = match resident.parsed.k.get(cell.flat_index) {
            Some(&k) => k as f64,
            None => return DiffusivitySample::miss(),
        };

        DiffusivitySample {
            k: raw.clamp(K_MIN, K_MAX),
            found: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_key_parses_yyyymmdd() {
        assert_eq!(DiffusivityFieldService::day_key(20110305), (2011, 3, 5));
    }
}
