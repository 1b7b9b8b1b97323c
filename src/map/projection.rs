use glam::DVec2;
use std::f64::consts::PI;

const MIN_ZOOM: f64 = 0.5;
const MAX_ZOOM: f64 = 100.0;
const ZOOM_FACTOR: f64 = 1.5;

/// Web Mercator viewport over the braille pixel grid
#[derive(Clone, Debug)]
pub struct Viewport {
    /// Center longitude (-180 to 180)
    pub center_lon: f64,
    /// Center latitude (-85 to 85)
    pub center_lat: f64,
    /// Zoom level (1.0 = whole world spans the canvas width)
    pub zoom: f64,
    /// Canvas pixel width
    pub width: usize,
    /// Canvas pixel height
    pub height: usize,
}

/// Normalized Mercator y for a latitude in degrees (0 at the top)
fn mercator_y(lat: f64) -> f64 {
    let lat_rad = lat.to_radians();
    (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0
}

impl Viewport {
    pub fn new(center_lon: f64, center_lat: f64, zoom: f64, width: usize, height: usize) -> Self {
        Self {
            center_lon,
            center_lat,
            zoom,
            width,
            height,
        }
    }

    /// Framed on the contiguous United States
    pub fn conus(width: usize, height: usize) -> Self {
        Self::new(-97.0, 38.5, 5.0, width, height)
    }

    /// Pixel width of the whole world at the current zoom
    pub fn world_width(&self) -> f64 {
        self.zoom * self.width as f64
    }

    /// Pan the viewport by pixel delta
    pub fn pan(&mut self, dx: i32, dy: i32) {
        // Nothing on screen to drag against
        if self.world_width() <= 0.0 {
            return;
        }
        let scale = 360.0 / self.world_width();
        self.center_lon += dx as f64 * scale;
        self.center_lat -= dy as f64 * scale * 0.5;

        if self.center_lon > 180.0 {
            self.center_lon -= 360.0;
        } else if self.center_lon < -180.0 {
            self.center_lon += 360.0;
        }
        self.center_lat = self.center_lat.clamp(-85.0, 85.0);
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * ZOOM_FACTOR).min(MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom / ZOOM_FACTOR).max(MIN_ZOOM);
    }

    /// Zoom in keeping the geographic point under (px, py) fixed
    pub fn zoom_in_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, ZOOM_FACTOR);
    }

    pub fn zoom_out_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, 1.0 / ZOOM_FACTOR);
    }

    fn zoom_at(&mut self, px: i32, py: i32, factor: f64) {
        let (lon, lat) = self.unproject(px, py);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        let (new_px, new_py) = self.project(lon, lat);
        self.pan(new_px - px, new_py - py);
    }

    fn center(&self) -> DVec2 {
        DVec2::new((self.center_lon + 180.0) / 360.0, mercator_y(self.center_lat))
    }

    /// Project (lon, lat) to fractional pixel coordinates
    pub fn project_point(&self, lon: f64, lat: f64) -> DVec2 {
        let world = DVec2::new((lon + 180.0) / 360.0, mercator_y(lat));
        let half = DVec2::new(self.width as f64, self.height as f64) / 2.0;
        (world - self.center()) * self.world_width() + half
    }

    /// Project (lon, lat) to whole pixel coordinates
    pub fn project(&self, lon: f64, lat: f64) -> (i32, i32) {
        let p = self.project_point(lon, lat);
        (p.x as i32, p.y as i32)
    }

    /// Pixel coordinates back to (lon, lat)
    pub fn unproject(&self, px: i32, py: i32) -> (f64, f64) {
        let half = DVec2::new(self.width as f64, self.height as f64) / 2.0;
        let world = (DVec2::new(px as f64, py as f64) - half) / self.world_width() + self.center();

        let lon = world.x * 360.0 - 180.0;
        let lat = (PI * (1.0 - 2.0 * world.y)).sinh().atan().to_degrees();
        (lon, lat)
    }

    /// Geographic bounds of the visible area: (min_lon, min_lat, max_lon, max_lat)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let (west, north) = self.unproject(0, 0);
        let (east, south) = self.unproject(self.width as i32, self.height as i32);
        (west, south, east, north)
    }

    /// Check if a line segment might be visible (rough bounding box check)
    pub fn line_might_be_visible(&self, p1: (i32, i32), p2: (i32, i32)) -> bool {
        let min_x = p1.0.min(p2.0);
        let max_x = p1.0.max(p2.0);
        let min_y = p1.1.min(p2.1);
        let max_y = p1.1.max(p2.1);

        max_x >= 0 && min_x < self.width as i32 && max_y >= 0 && min_y < self.height as i32
    }
}
