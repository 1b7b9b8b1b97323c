use std::collections::HashMap;

/// Geographic bounding box: (min_lon, min_lat, max_lon, max_lat)
pub type BBox = (f64, f64, f64, f64);

/// Grid index over feature bounding boxes.
/// Each feature is inserted into every cell its bbox overlaps, so queries
/// never miss a feature but may return extras; callers refine with exact tests.
pub struct FeatureGrid {
    cells: HashMap<(i32, i32), Vec<usize>>,
    cell_size: f64,
}

impl FeatureGrid {
    #[inline(always)]
    fn to_cell(&self, lon: f64, lat: f64) -> (i32, i32) {
        let x = (lon / self.cell_size).floor() as i32;
        let y = (lat / self.cell_size).floor() as i32;
        (x, y)
    }

    /// Build from feature bounding boxes, indexed by position in the iterator
    pub fn build(bboxes: impl Iterator<Item = BBox>, cell_size: f64) -> Self {
        let mut grid = Self {
            cells: HashMap::new(),
            cell_size,
        };
        for (idx, (min_lon, min_lat, max_lon, max_lat)) in bboxes.enumerate() {
            let min_cell = grid.to_cell(min_lon, min_lat);
            let max_cell = grid.to_cell(max_lon, max_lat);
            for y in min_cell.1..=max_cell.1 {
                for x in min_cell.0..=max_cell.0 {
                    grid.cells.entry((x, y)).or_default().push(idx);
                }
            }
        }
        grid
    }

    /// Sorted, deduplicated indices of features whose cells touch `bbox`
    pub fn query(&self, bbox: BBox) -> Vec<usize> {
        let (min_lon, min_lat, max_lon, max_lat) = bbox;
        let min_cell = self.to_cell(min_lon, min_lat);
        let max_cell = self.to_cell(max_lon, max_lat);

        let mut results = Vec::new();
        // Whole-world queries at low zoom would walk a lot of empty cells
        let span = (max_cell.0 - min_cell.0 + 1) as i64 * (max_cell.1 - min_cell.1 + 1) as i64;
        if span > self.cells.len() as i64 {
            for (&(x, y), indices) in &self.cells {
                if (min_cell.0..=max_cell.0).contains(&x) && (min_cell.1..=max_cell.1).contains(&y) {
                    results.extend_from_slice(indices);
                }
            }
        } else {
            for y in min_cell.1..=max_cell.1 {
                for x in min_cell.0..=max_cell.0 {
                    if let Some(indices) = self.cells.get(&(x, y)) {
                        results.extend_from_slice(indices);
                    }
                }
            }
        }
        results.sort_unstable();
        results.dedup();
        results
    }

    /// Candidates containing a point
    pub fn query_point(&self, lon: f64, lat: f64) -> Vec<usize> {
        self.query((lon, lat, lon, lat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_finds_overlapping_features() {
        let grid = FeatureGrid::build(
            vec![(-118.9, 33.7, -117.6, 34.8), (-86.9, 32.3, -86.4, 32.7), (-74.1, 40.6, -73.9, 40.9)]
                .into_iter(),
            1.0,
        );
        assert_eq!(grid.query((-120.0, 30.0, -80.0, 35.0)), vec![0, 1]);
        assert_eq!(grid.query_point(-74.0, 40.7), vec![2]);
        assert!(grid.query_point(10.0, 50.0).is_empty());
    }

    #[test]
    fn test_world_query_dedups() {
        let grid = FeatureGrid::build(vec![(-10.0, -10.0, 10.0, 10.0)].into_iter(), 1.0);
        assert_eq!(grid.query((-180.0, -85.0, 180.0, 85.0)), vec![0]);
    }
}
