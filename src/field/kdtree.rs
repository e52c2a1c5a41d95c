//! 2-D KD-tree over grid-cell coordinates, used for nearest-cell lookup in
//! the current field service (`SPEC_FULL.md` §4.3).
//!
//! Built once per coordinate array (coordinates are invariant across day
//! evictions) from a subsampled set of cells: every second row/column. Split
//! axis alternates lon/lat by tree depth; nearest-neighbour search uses
//! Haversine distance with the standard plane-cut pruning.

use crate::math::haversine_m;

/// One indexed grid cell: its flat index into the day's coordinate arrays,
/// its (row, col) grid position, and its lon/lat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub flat_index: usize,
    pub i: usize,
    pub j: usize,
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug)]
enum Node {
    Leaf,
    Split {
        cell: Cell,
        axis: Axis,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Lon,
    Lat,
}

impl Axis {
    fn next(self) -> Axis {
        match self {
            Axis::Lon => Axis::Lat,
            Axis::Lat => Axis::Lon,
        }
    }

    fn value(self, cell: &Cell) -> f64 {
        match self {
            Axis::Lon => cell.lon,
            Axis::Lat => cell.lat,
        }
    }
}

/// A static spatial index over a subsampled set of grid cells.
#[derive(Debug)]
pub struct KdTree {
    root: Node,
    len: usize,
}

impl KdTree {
    /// Builds a tree from `nlat` × `nlon` cells, keeping every second row and
    /// column (§4.3's subsampling rule).
    pub fn build(nlat: usize, nlon: usize, lon: &[f32], lat: &[f32]) -> Self {
        let mut cells = Vec::new();
        for i in (0..nlat).step_by(2) {
            for j in (0..nlon).step_by(2) {
                let flat_index = i * nlon + j;
                if flat_index >= lon.len() {
                    continue;
                }
                cells.push(Cell {
                    flat_index,
                    i,
                    j,
                    lon: lon[flat_index] as f64,
                    lat: lat[flat_index] as f64,
                });
            }
        }
        let len = cells.len();
        let root = build_node(&mut cells, Axis::Lon);
        KdTree { root, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Nearest indexed cell to `(lon, lat)` by Haversine distance, if the
    /// tree is non-empty.
    pub fn nearest(&self, lon: f64, lat: f64) -> Option<Cell> {
        let mut best: Option<(Cell, f64)> = None;
        search(&self.root, lon, lat, &mut best);
        best.map(|(cell, _)| cell)
    }
}

fn build_node(cells: &mut [Cell], axis: Axis) -> Node {
    if cells.is_empty() {
        return Node::Leaf;
    }
    cells.sort_by(|a, b| axis.value(a).partial_cmp(&axis.value(b)).unwrap());
    let mid = cells.len() / 2;
    let cell = cells[mid];
    let (left_slice, right_slice_with_mid) = cells.split_at_mut(mid);
    let right_slice = &mut right_slice_with_mid[1..];
    let left = build_node(left_slice, axis.next());
    let right = build_node(right_slice, axis.next());
    Node::Split {
        cell,
        axis,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn search(node: &Node, lon: f64, lat: f64, best: &mut Option<(Cell, f64)>) {
    let Node::Split {
        cell,
        axis,
        left,
        right,
    } = node
    else {
        return;
    };

    let dist = haversine_m(lon, lat, cell.lon, cell.lat);
    if best.as_ref().map(|(_, d)| dist < *d).unwrap_or(true) {
        *best = Some((*cell, dist));
    }

    let query_value = match axis {
        Axis::Lon => lon,
        Axis::Lat => lat,
    };
    let node_value = axis.value(cell);
    let (near, far) = if query_value < node_value {
        (left, right)
    } else {
        (right, left)
    };

    search(near, lon, lat, best);

    // Plane-cut pruning: only descend into the far side if the splitting
    // plane is closer than the best distance found so far. Convert the
    // per-degree plane gap into metres via the latitude scale, a safe
    // (slightly loose) upper bound for longitude gaps too.
    let plane_gap_deg = (query_value - node_value).abs();
    let plane_gap_m = plane_gap_deg * 111_000.0;
    let should_descend = best
        .as_ref()
        .map(|(_, d)| plane_gap_m < *d)
        .unwrap_or(true);
    if should_descend {
        search(far, lon, lat, best);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> (usize, usize, Vec<f32>, Vec<f32>) {
        let nlat = 8;
        let nlon = 8;
        let mut lon = vec![0.0f32; nlat * nlon];
        let mut lat = vec![0.0f32; nlat * nlon];
        for i in 0..nlat {
            for j in 0..nlon {
                let idx = i * nlon + j;
                lon[idx] = j as f32 * 1.0;
                lat[idx] = i as f32 * 1.0;
            }
        }
        (nlat, nlon, lon, lat)
    }

    #[test]
    fn finds_exact_match() {
        let (nlat, nlon, lon, lat) = grid();
        let tree = KdTree::build(nlat, nlon, &lon, &lat);
        let found = tree.nearest(4.0, 4.0).unwrap();
        assert_eq!(found.lon, 4.0);
        assert_eq!(found.lat, 4.0);
    }

    #[test]
    fn finds_nearest_to_offset_point() {
        let (nlat, nlon, lon, lat) = grid();
        let tree = KdTree::build(nlat, nlon, &lon, &lat);
        // subsampled grid only keeps even rows/cols, so nearest to (3.1, 3.1)
        // should be (2,2) or (4,4) depending on rounding; both are valid cells.
        let found = tree.nearest(3.1, 3.1).unwrap();
        assert!(found.lon % 2.0 == 0.0);
        assert!(found.lat % 2.0 == 0.0);
    }

    #[test]
    fn empty_grid_returns_none() {
        let tree = KdTree::build(0, 0, &[], &[]);
        assert!(tree.is_empty());
        assert!(tree.nearest(0.0, 0.0).is_none());
    }
}
