//! Uniform-grid index over detection centers for radius lookups.
//!
//! Points are binned into square cells of side `cell_size`. A radius query
//! only visits the cells overlapping the query circle's bounding square, so
//! grouping avoids comparing every detection against every other one.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f64,
    points: Vec<(f64, f64)>,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl SpatialGrid {
    /// Build the index once over `points`. Non-positive cell sizes fall back to 1.
    pub fn new(points: Vec<(f64, f64)>, cell_size: f64) -> Self {
        let cell_size = if cell_size > 0.0 { cell_size } else { 1.0 };
        let mut cells: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (i, &(x, y)) in points.iter().enumerate() {
            cells
                .entry(Self::cell_of(x, y, cell_size))
                .or_default()
                .push(i);
        }
        Self {
            cell_size,
            points,
            cells,
        }
    }

    fn cell_of(x: f64, y: f64, cell_size: f64) -> (i64, i64) {
        ((x / cell_size).floor() as i64, (y / cell_size).floor() as i64)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Indices of all points within `radius` of `center`, ascending.
    pub fn within_radius(&self, center: (f64, f64), radius: f64) -> Vec<usize> {
        if radius < 0.0 {
            return vec![];
        }
        let (min_cx, min_cy) = Self::cell_of(center.0 - radius, center.1 - radius, self.cell_size);
        let (max_cx, max_cy) = Self::cell_of(center.0 + radius, center.1 + radius, self.cell_size);
        let radius_sq = radius * radius;

        let mut found = vec![];
        for cx in min_cx..=max_cx {
            for cy in min_cy..=max_cy {
                let Some(bucket) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                for &i in bucket {
                    let (px, py) = self.points[i];
                    let dist_sq = (px - center.0).powi(2) + (py - center.1).powi(2);
                    if dist_sq <= radius_sq {
                        found.push(i);
                    }
                }
            }
        }
        found.sort_unstable();
        found
    }
}
