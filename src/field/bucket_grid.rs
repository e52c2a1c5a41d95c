//! Coarse bucket-grid spatial index used by the diffusivity field service
//! (`SPEC_FULL.md` §4.4), cheaper to build than the current service's KD-tree
//! since diffusivity lookups tolerate a coarser index.

use crate::math::haversine_m;

const BUCKETS_PER_AXIS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub flat_index: usize,
    pub lon: f64,
    pub lat: f64,
}

/// A fixed ≈50×50 bucket grid over a lon/lat bounding box.
#[derive(Debug)]
pub struct BucketGrid {
    min_lon: f64,
    max_lon: f64,
    min_lat: f64,
    max_lat: f64,
    buckets: Vec<Vec<Cell>>,
}

impl BucketGrid {
    pub fn build(lon: &[f32], lat: &[f32]) -> Self {
        let (mut min_lon, mut max_lon) = (f64::MAX, f64::MIN);
        let (mut min_lat, mut max_lat) = (f64::MAX, f64::MIN);
        for (&lo, &la) in lon.iter().zip(lat.iter()) {
            let (lo, la) = (lo as f64, la as f64);
            min_lon = min_lon.min(lo);
            max_lon = max_lon.max(lo);
            min_lat = min_lat.min(la);
            max_lat = max_lat.max(la);
        }
        if lon.is_empty() {
            min_lon = 0.0;
            max_lon = 1.0;
            min_lat = 0.0;
            max_lat = 1.0;
        }

        let mut buckets = vec![Vec::new(); BUCKETS_PER_AXIS * BUCKETS_PER_AXIS];
        let mut grid = BucketGrid {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
            buckets: Vec::new(),
        };
        for (flat_index, (&lo, &la)) in lon.iter().zip(lat.iter()).enumerate() {
            let cell = Cell {
                flat_index,
                lon: lo as f64,
                lat: la as f64,
            };
            let (bi, bj) = grid.bucket_of(cell.lon, cell.lat);
            buckets[bi * BUCKETS_PER_AXIS + bj].push(cell);
        }
        grid.buckets = buckets;
        grid
    }

    fn bucket_of(&self, lon: f64, lat: f64) -> (usize, usize) {
        let span_lon = (self.max_lon - self.min_lon).max(1e-9);
        let span_lat = (self.max_lat - self.min_lat).max(1e-9);
        let fi = ((lat - self.min_lat) / span_lat * BUCKETS_PER_AXIS as f64)
            .clamp(0.0, (BUCKETS_PER_AXIS - 1) as f64) as usize;
        let fj = ((lon - self.min_lon) / span_lon * BUCKETS_PER_AXIS as f64)
            .clamp(0.0, (BUCKETS_PER_AXIS - 1) as f64) as usize;
        (fi, fj)
    }

    /// Nearest cell to `(lon, lat)`, searching the target bucket and its 8
    /// neighbours.
    pub fn nearest(&self, lon: f64, lat: f64) -> Option<Cell> {
        let (bi, bj) = self.bucket_of(lon, lat);
        let mut best: Option<(Cell, f64)> = None;
        for di in -1i32..=1 {
            for dj in -1i32..=1 {
                let ni = bi as i32 + di;
                let nj = bj as i32 + dj;
                if ni < 0 || nj < 0 || ni >= BUCKETS_PER_AXIS as i32 || nj >= BUCKETS_PER_AXIS as i32
                {
                    continue;
                }
                let bucket = &self.buckets[ni as usize * BUCKETS_PER_AXIS + nj as usize];
                for cell in bucket {
                    let dist = haversine_m(lon, lat, cell.lon, cell.lat);
                    if best.as_ref().map(|(_, d)| dist < *d).unwrap_or(true) {
                        best = Some((*cell, dist));
                    }
                }
            }
        }
        best.map(|(cell, _)| cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_nearest_within_bbox() {
        let lon: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let lat: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let grid = BucketGrid::build(&lon, &lat);
        let found = grid.nearest(4.4, 4.4).unwrap();
        assert_eq!(found.lon, 4.0);
        assert_eq!(found.lat, 4.0);
    }

    #[test]
    fn empty_grid_returns_none() {
        let grid = BucketGrid::build(&[], &[]);
        assert!(grid.nearest(0.0, 0.0).is_none());
    }
}
