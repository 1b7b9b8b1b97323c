use crate::braille::BrailleCanvas;
use crate::data::County;
use crate::map::geometry::{draw_line, fill_polygon, ring_bounds, stroke_ring};
use crate::map::projection::Viewport;
use crate::map::spatial::{BBox, FeatureGrid};
use crate::style::YearStyle;
use glam::DVec2;
use rayon::prelude::*;

/// Grid cell size in degrees for the county index
const INDEX_CELL_DEGREES: f64 = 2.0;

/// Display settings for map layers
#[derive(Clone)]
pub struct DisplaySettings {
    pub show_fill: bool,
    pub show_outlines: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_fill: true,
            show_outlines: false,
        }
    }
}

/// Rasterized layers for one frame, back to front
pub struct MapLayers {
    /// One canvas per paint color, in legend order
    pub fills: Vec<(String, BrailleCanvas)>,
    pub outlines: BrailleCanvas,
}

/// Draws counties colored by the active year's filter and paint expressions
pub struct ChoroplethRenderer {
    counties: Vec<County>,
    bboxes: Vec<BBox>,
    index: FeatureGrid,
    /// Paint color index per county; `None` when the filter excludes it
    fills: Vec<Option<usize>>,
    /// Distinct paint colors, in draw order
    palette: Vec<String>,
    pub settings: DisplaySettings,
}

fn county_bbox(county: &County) -> BBox {
    county
        .polygons
        .iter()
        .flatten()
        .flatten()
        .fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), &(lon, lat)| (x0.min(lon), y0.min(lat), x1.max(lon), y1.max(lat)),
        )
}

fn intersects(a: BBox, b: BBox) -> bool {
    a.0 <= b.2 && b.0 <= a.2 && a.1 <= b.3 && b.1 <= a.3
}

/// Even-odd point-in-polygon test in lon/lat space
fn polygon_contains(rings: &[Vec<(f64, f64)>], lon: f64, lat: f64) -> bool {
    let mut inside = false;
    for ring in rings {
        let n = ring.len();
        for i in 0..n {
            let (ax, ay) = ring[i];
            let (bx, by) = ring[(i + 1) % n];
            if (ay > lat) != (by > lat) && lon < ax + (lat - ay) / (by - ay) * (bx - ax) {
                inside = !inside;
            }
        }
    }
    inside
}

impl ChoroplethRenderer {
    pub fn new(counties: Vec<County>) -> Self {
        let bboxes: Vec<BBox> = counties.iter().map(county_bbox).collect();
        let index = FeatureGrid::build(bboxes.iter().copied(), INDEX_CELL_DEGREES);
        let fills = vec![None; counties.len()];
        Self {
            counties,
            bboxes,
            index,
            fills,
            palette: Vec::new(),
            settings: DisplaySettings::default(),
        }
    }

    pub fn has_data(&self) -> bool {
        !self.counties.is_empty()
    }

    /// Number of counties that pass the active filter
    pub fn colored_count(&self) -> usize {
        self.fills.iter().filter(|f| f.is_some()).count()
    }

    /// Evaluate the year's filter and paint expressions for every county
    pub fn apply_style(&mut self, style: &YearStyle) {
        let painted: Vec<Option<String>> = self
            .counties
            .par_iter()
            .map(|county| {
                if !style.filter.evaluate(&county.properties).is_true() {
                    return None;
                }
                style
                    .paint
                    .evaluate(&county.properties)
                    .as_str()
                    .map(str::to_string)
            })
            .collect();

        // Legend colors first so buckets stack in order
        self.palette = style.legend().into_iter().map(|entry| entry.color).collect();
        self.palette.dedup();

        self.fills = painted
            .into_iter()
            .map(|color| {
                let color = color?;
                let idx = match self.palette.iter().position(|c| *c == color) {
                    Some(idx) => idx,
                    None => {
                        self.palette.push(color);
                        self.palette.len() - 1
                    }
                };
                Some(idx)
            })
            .collect();

        tracing::debug!(
            year = style.year,
            colored = self.colored_count(),
            total = self.counties.len(),
            "applied year style"
        );
    }

    /// Index of the colored county under (lon, lat), if any
    pub fn county_at(&self, lon: f64, lat: f64) -> Option<&County> {
        self.index
            .query_point(lon, lat)
            .into_iter()
            .filter(|&i| self.fills[i].is_some())
            .find(|&i| {
                self.counties[i]
                    .polygons
                    .iter()
                    .any(|rings| polygon_contains(rings, lon, lat))
            })
            .map(|i| &self.counties[i])
    }

    fn project_rings(&self, county: &County, viewport: &Viewport) -> Vec<Vec<Vec<DVec2>>> {
        county
            .polygons
            .iter()
            .map(|rings| {
                rings
                    .iter()
                    .map(|ring| {
                        ring.iter()
                            .map(|&(lon, lat)| viewport.project_point(lon, lat))
                            .collect()
                    })
                    .collect()
            })
            .collect()
    }

    /// Rasterize visible counties. Each color layer is filled in parallel.
    pub fn render(&self, width: usize, height: usize, viewport: &Viewport) -> MapLayers {
        let visible: Vec<usize> = self
            .index
            .query(viewport.bounds())
            .into_iter()
            .filter(|&i| intersects(self.bboxes[i], viewport.bounds()))
            .collect();

        // Polygons wider than half the world straddle the antimeridian
        let max_span = viewport.world_width() / 2.0;

        let fills = if self.settings.show_fill {
            self.palette
                .par_iter()
                .enumerate()
                .map(|(color_idx, color)| {
                    let mut canvas = BrailleCanvas::new(width, height);
                    for &i in visible.iter().filter(|&&i| self.fills[i] == Some(color_idx)) {
                        for rings in self.project_rings(&self.counties[i], viewport) {
                            let Some((lo, hi)) = ring_bounds(&rings) else {
                                continue;
                            };
                            if hi.x - lo.x > max_span {
                                continue;
                            }
                            fill_polygon(&mut canvas, &rings);
                            if let Some(exterior) = rings.first() {
                                stroke_ring(&mut canvas, exterior);
                            }
                        }
                    }
                    (color.clone(), canvas)
                })
                .collect()
        } else {
            Vec::new()
        };

        let mut outlines = BrailleCanvas::new(width, height);
        if self.settings.show_outlines {
            for &i in &visible {
                for rings in &self.counties[i].polygons {
                    for ring in rings {
                        self.draw_linestring(&mut outlines, ring, viewport);
                    }
                }
            }
        }

        MapLayers { fills, outlines }
    }

    /// Draw a linestring with viewport culling
    fn draw_linestring(&self, canvas: &mut BrailleCanvas, line: &[(f64, f64)], viewport: &Viewport) {
        if line.len() < 2 {
            return;
        }

        let mut prev: Option<(i32, i32)> = None;
        for &(lon, lat) in line {
            let (px, py) = viewport.project(lon, lat);
            if let Some((prev_x, prev_y)) = prev {
                let dist = ((px - prev_x).abs() + (py - prev_y).abs()) as usize;
                if dist < viewport.width && viewport.line_might_be_visible((prev_x, prev_y), (px, py)) {
                    draw_line(canvas, prev_x, prev_y, px, py);
                }
            }
            prev = Some((px, py));
        }
    }

    pub fn toggle_outlines(&mut self) {
        self.settings.show_outlines = !self.settings.show_outlines;
    }

    pub fn toggle_fill(&mut self) {
        self.settings.show_fill = !self.settings.show_fill;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StyleConfig;
    use crate::data::ValueRecord;
    use geojson::{JsonObject, JsonValue};

    fn square_county(id: &str, lon: f64, lat: f64) -> County {
        let mut properties = JsonObject::new();
        properties.insert("county_fips".to_string(), JsonValue::from(id));
        let ring = vec![(lon, lat), (lon + 1.0, lat), (lon + 1.0, lat + 1.0), (lon, lat + 1.0), (lon, lat)];
        County {
            properties,
            polygons: vec![vec![ring]],
        }
    }

    fn renderer() -> ChoroplethRenderer {
        let mut renderer = ChoroplethRenderer::new(vec![
            square_county("06037", -118.0, 34.0),
            square_county("1001", -86.0, 32.0),
            square_county("36061", -74.0, 40.0),
        ]);
        let records = vec![ValueRecord::new("06037", 1000.0), ValueRecord::new("36061", 10.0)];
        let style = YearStyle::build(&StyleConfig::default(), 2024, &records).unwrap();
        renderer.apply_style(&style);
        renderer
    }

    #[test]
    fn test_filter_excludes_unlisted_counties() {
        let renderer = renderer();
        assert_eq!(renderer.colored_count(), 2);
        assert_eq!(renderer.fills[1], None);
        assert_eq!(renderer.palette.len(), 5);
        assert_eq!(renderer.fills[0], Some(4));
        assert_eq!(renderer.fills[2], Some(0));
    }

    #[test]
    fn test_county_at() {
        let renderer = renderer();
        let hit = renderer.county_at(-117.5, 34.5).unwrap();
        assert_eq!(hit.properties["county_fips"], "06037");
        // Filtered out counties are not hoverable
        assert!(renderer.county_at(-85.5, 32.5).is_none());
        assert!(renderer.county_at(0.0, 0.0).is_none());
    }

    #[test]
    fn test_render_fills_visible_layers() {
        let renderer = renderer();
        let viewport = Viewport::conus(160, 80);
        let layers = renderer.render(80, 20, &viewport);
        assert_eq!(layers.fills.len(), 5);
        assert!(!layers.fills[4].1.is_blank());
        assert!(!layers.fills[0].1.is_blank());
        assert!(layers.fills[2].1.is_blank());
        assert!(layers.outlines.is_blank());
    }

    #[test]
    fn test_empty_year_draws_nothing() {
        let mut renderer = renderer();
        let style = YearStyle::build(&StyleConfig::default(), 2019, &[]).unwrap();
        renderer.apply_style(&style);
        assert_eq!(renderer.colored_count(), 0);
        let layers = renderer.render(80, 20, &Viewport::conus(160, 80));
        assert!(layers.fills.iter().all(|(_, canvas)| canvas.is_blank()));
    }
}
