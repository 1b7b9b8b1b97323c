use crate::config::StyleConfig;
use crate::data::{County, LookupTable};
use crate::map::{ChoroplethRenderer, Viewport};
use crate::style::{feature_key, YearStyle};
use anyhow::Result;
use std::collections::HashMap;

/// Terminal columns taken by the legend panel on the right
pub const LEGEND_WIDTH: u16 = 26;
/// First terminal row of the map's inner area (year bar, then border)
pub const MAP_TOP: u16 = 2;

/// Braille pixel size of the map for a terminal of `width x height` cells.
/// Rows: year bar, map border (2) and status bar. Columns: border (2) and legend.
fn map_pixel_size(width: usize, height: usize) -> (usize, usize) {
    let inner_width = width.saturating_sub(2 + LEGEND_WIDTH as usize).max(1);
    let inner_height = height.saturating_sub(4).max(1);
    (inner_width * 2, inner_height * 4)
}

/// Terminal cell to map pixel coordinates
fn cell_to_pixel(col: u16, row: u16) -> (i32, i32) {
    let px = (col.saturating_sub(1) as i32) * 2;
    let py = (row.saturating_sub(MAP_TOP) as i32) * 4;
    (px, py)
}

/// Application state
pub struct App {
    pub viewport: Viewport,
    pub renderer: ChoroplethRenderer,
    lookup: LookupTable,
    style_config: StyleConfig,
    /// Years available in the lookup table, ascending
    pub years: Vec<i32>,
    /// Classification and expressions for the active year
    pub style: Option<YearStyle>,
    /// Active year's values keyed by normalized id, for hover details
    values: HashMap<String, f64>,
    pub should_quit: bool,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    /// Current mouse position for the hover readout
    pub mouse_pos: Option<(u16, u16)>,
}

impl App {
    pub fn new(
        width: usize,
        height: usize,
        lookup: LookupTable,
        counties: Vec<County>,
        style_config: StyleConfig,
    ) -> Self {
        let (pixel_width, pixel_height) = map_pixel_size(width, height);
        let years = lookup.years();

        Self {
            viewport: Viewport::conus(pixel_width, pixel_height),
            renderer: ChoroplethRenderer::new(counties),
            lookup,
            style_config,
            years,
            style: None,
            values: HashMap::new(),
            should_quit: false,
            last_mouse: None,
            mouse_pos: None,
        }
    }

    pub fn active_year(&self) -> Option<i32> {
        self.style.as_ref().map(|s| s.year)
    }

    /// Reclassify for `year` and recolor the map. Unknown years render empty.
    pub fn select_year(&mut self, year: i32) -> Result<()> {
        let records = self.lookup.records(year);
        tracing::info!(year, counties = records.len(), "switching year");

        let style = YearStyle::build(&self.style_config, year, records)?;
        self.values = records.iter().map(|r| (r.key.clone(), r.value)).collect();
        self.renderer.apply_style(&style);
        self.style = Some(style);
        Ok(())
    }

    /// Select the `index`-th available year, if there is one
    pub fn select_index(&mut self, index: usize) -> Result<()> {
        match self.years.get(index) {
            Some(&year) => self.select_year(year),
            None => Ok(()),
        }
    }

    fn active_index(&self) -> Option<usize> {
        let year = self.active_year()?;
        self.years.iter().position(|&y| y == year)
    }

    pub fn next_year(&mut self) -> Result<()> {
        let next = self.active_index().map_or(0, |i| (i + 1).min(self.years.len().saturating_sub(1)));
        self.select_index(next)
    }

    pub fn prev_year(&mut self) -> Result<()> {
        let prev = self.active_index().map_or(0, |i| i.saturating_sub(1));
        self.select_index(prev)
    }

    /// Update viewport size when terminal resizes
    pub fn resize(&mut self, width: usize, height: usize) {
        let (pixel_width, pixel_height) = map_pixel_size(width, height);
        self.viewport.width = pixel_width;
        self.viewport.height = pixel_height;
    }

    /// Recenter on the contiguous US at the default zoom
    pub fn reset_view(&mut self) {
        self.viewport = Viewport::conus(self.viewport.width, self.viewport.height);
    }

    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.viewport.pan(dx, dy);
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
    }

    /// Zoom in towards a screen position (terminal column/row)
    pub fn zoom_in_at(&mut self, col: u16, row: u16) {
        let (px, py) = cell_to_pixel(col, row);
        self.viewport.zoom_in_at(px, py);
    }

    pub fn zoom_out_at(&mut self, col: u16, row: u16) {
        let (px, py) = cell_to_pixel(col, row);
        self.viewport.zoom_out_at(px, py);
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn zoom_level(&self) -> String {
        format!("{:.1}x", self.viewport.zoom)
    }

    pub fn center_coords(&self) -> String {
        format!(
            "{:.1}°{}, {:.1}°{}",
            self.viewport.center_lat.abs(),
            if self.viewport.center_lat >= 0.0 { "N" } else { "S" },
            self.viewport.center_lon.abs(),
            if self.viewport.center_lon >= 0.0 { "E" } else { "W" }
        )
    }

    /// Pan by the mouse movement since the last drag event
    pub fn handle_drag(&mut self, x: u16, y: u16) {
        if let Some((last_x, last_y)) = self.last_mouse {
            let dx = last_x as i32 - x as i32;
            let dy = last_y as i32 - y as i32;
            self.pan(dx * 2, dy * 4);
        }
        self.last_mouse = Some((x, y));
    }

    pub fn end_drag(&mut self) {
        self.last_mouse = None;
    }

    pub fn set_mouse_pos(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
    }

    /// County id and value under the mouse, if a colored county is there
    pub fn hovered(&self) -> Option<(String, f64)> {
        let (col, row) = self.mouse_pos?;
        if row < MAP_TOP {
            return None;
        }
        let (px, py) = cell_to_pixel(col, row);
        if px as usize >= self.viewport.width || py as usize >= self.viewport.height {
            return None;
        }
        let (lon, lat) = self.viewport.unproject(px, py);
        let county = self.renderer.county_at(lon, lat)?;
        let key = feature_key(&self.style_config.id_property)
            .evaluate(&county.properties)
            .as_str()?
            .to_string();
        let value = *self.values.get(&key)?;
        Some((key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::{JsonObject, JsonValue};

    fn lookup() -> LookupTable {
        let mut json = br#"{"2020": {"6037": 300000, "1001": 40}, "2024": {"6037": 280000}, "2022": "bad"}"#.to_vec();
        LookupTable::from_slice(&mut json).unwrap()
    }

    fn la_county() -> County {
        let mut properties = JsonObject::new();
        properties.insert("county_fips".to_string(), JsonValue::from("06037"));
        let ring = vec![(-119.0, 33.5), (-117.0, 33.5), (-117.0, 35.0), (-119.0, 35.0), (-119.0, 33.5)];
        County {
            properties,
            polygons: vec![vec![ring]],
        }
    }

    fn app() -> App {
        App::new(120, 40, lookup(), vec![la_county()], StyleConfig::default())
    }

    #[test]
    fn test_year_cycling() {
        let mut app = app();
        assert_eq!(app.years, vec![2020, 2022, 2024]);
        assert_eq!(app.active_year(), None);

        app.next_year().unwrap();
        assert_eq!(app.active_year(), Some(2020));
        app.next_year().unwrap();
        assert_eq!(app.active_year(), Some(2022));
        app.next_year().unwrap();
        app.next_year().unwrap();
        assert_eq!(app.active_year(), Some(2024));
        app.prev_year().unwrap();
        assert_eq!(app.active_year(), Some(2022));
        app.select_index(9).unwrap();
        assert_eq!(app.active_year(), Some(2022));
    }

    #[test]
    fn test_malformed_year_renders_empty() {
        let mut app = app();
        app.select_year(2022).unwrap();
        let style = app.style.as_ref().unwrap();
        assert_eq!(style.county_count(), 0);
        assert!(style.legend().is_empty());
        assert_eq!(app.renderer.colored_count(), 0);

        app.select_year(2020).unwrap();
        assert_eq!(app.style.as_ref().unwrap().county_count(), 2);
        assert_eq!(app.renderer.colored_count(), 1);
    }

    #[test]
    fn test_hover_reports_value() {
        let mut app = app();
        app.select_year(2024).unwrap();
        let (px, py) = app.viewport.project(-118.0, 34.2);
        let col = (px / 2) as u16 + 1;
        let row = (py / 4) as u16 + MAP_TOP;
        app.set_mouse_pos(col, row);
        assert_eq!(app.hovered(), Some(("06037".to_string(), 280000.0)));

        app.set_mouse_pos(0, 0);
        assert_eq!(app.hovered(), None);
    }

    #[test]
    fn test_narrow_terminal_pans_safely() {
        let mut app = App::new(20, 3, lookup(), vec![la_county()], StyleConfig::default());
        assert_eq!((app.viewport.width, app.viewport.height), (2, 4));
        app.pan(10, 6);
        app.handle_drag(3, 3);
        app.handle_drag(1, 5);
        assert!(app.viewport.center_lon.is_finite());
        assert!(app.viewport.center_lat.is_finite());
    }

    #[test]
    fn test_resize_and_reset() {
        let mut app = app();
        app.resize(80, 24);
        assert_eq!(app.viewport.width, (80 - 2 - LEGEND_WIDTH as usize) * 2);
        assert_eq!(app.viewport.height, 20 * 4);
        app.zoom_in();
        app.pan(10, 10);
        app.reset_view();
        assert_eq!(app.viewport.zoom, 5.0);
        assert_eq!(app.viewport.width, (80 - 2 - LEGEND_WIDTH as usize) * 2);
    }
}
