use crate::braille::BrailleCanvas;
use glam::DVec2;

/// Draw a line using Bresenham's algorithm
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        canvas.set_pixel_signed(x, y);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }

        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

/// Pixel bounding box of a set of rings, `None` when empty
pub fn ring_bounds(rings: &[Vec<DVec2>]) -> Option<(DVec2, DVec2)> {
    let mut points = rings.iter().flatten();
    let first = *points.next()?;
    Some(points.fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p))))
}

/// Even-odd scanline fill of a polygon given in pixel space. Holes are
/// simply further rings. Samples each pixel row at its vertical center.
pub fn fill_polygon(canvas: &mut BrailleCanvas, rings: &[Vec<DVec2>]) {
    let Some((lo, hi)) = ring_bounds(rings) else {
        return;
    };
    let max_y = canvas.pixel_height() as f64 - 1.0;
    if hi.y < 0.0 || lo.y > max_y || hi.x < 0.0 || lo.x > canvas.pixel_width() as f64 {
        return;
    }

    let y_start = lo.y.floor().max(0.0) as i32;
    let y_end = hi.y.ceil().min(max_y) as i32;
    let mut crossings: Vec<f64> = Vec::new();

    for y in y_start..=y_end {
        let scan = y as f64 + 0.5;
        crossings.clear();

        for ring in rings {
            let n = ring.len();
            for i in 0..n {
                let a = ring[i];
                let b = ring[(i + 1) % n];
                if (a.y <= scan) != (b.y <= scan) {
                    crossings.push(a.x + (scan - a.y) / (b.y - a.y) * (b.x - a.x));
                }
            }
        }

        crossings.sort_by(|a, b| a.total_cmp(b));
        for pair in crossings.chunks_exact(2) {
            let x0 = pair[0].round() as i32;
            let x1 = pair[1].round() as i32 - 1;
            if x1 >= x0 {
                canvas.fill_span(y, x0, x1);
            }
        }
    }
}

/// Trace a ring's edges; keeps counties smaller than a pixel visible
pub fn stroke_ring(canvas: &mut BrailleCanvas, ring: &[DVec2]) {
    for pair in ring.windows(2) {
        draw_line(
            canvas,
            pair[0].x as i32,
            pair[0].y as i32,
            pair[1].x as i32,
            pair[1].y as i32,
        );
    }
    if let [only] = ring {
        canvas.set_pixel_signed(only.x as i32, only.y as i32);
    }
}
