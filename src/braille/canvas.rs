/// Braille Unicode canvas. Each character cell holds a 2x4 dot grid, so a
/// canvas of `width x height` characters has `width*2 x height*4` pixels.
/// One canvas carries one color; the map stacks a canvas per fill color.
#[derive(Clone)]
pub struct BrailleCanvas {
    width: usize,  // Characters
    height: usize, // Characters
    pixels: Vec<u8>, // Dot bits, row-major per character cell
}

/// Dot bit for (x % 2, y % 4) inside a cell.
const DOT_BITS: [[u8; 4]; 2] = [[0x01, 0x02, 0x04, 0x40], [0x08, 0x10, 0x20, 0x80]];

impl BrailleCanvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; width * height],
        }
    }

    pub fn pixel_width(&self) -> usize {
        self.width * 2
    }

    pub fn pixel_height(&self) -> usize {
        self.height * 4
    }

    pub fn set_pixel(&mut self, x: usize, y: usize) {
        let cx = x / 2;
        let cy = y / 4;
        if cx >= self.width || cy >= self.height {
            return;
        }
        self.pixels[cy * self.width + cx] |= DOT_BITS[x % 2][y % 4];
    }

    /// Set a pixel using signed coordinates (ignores negative values)
    pub fn set_pixel_signed(&mut self, x: i32, y: i32) {
        if x >= 0 && y >= 0 {
            self.set_pixel(x as usize, y as usize);
        }
    }

    /// Set every pixel of row `y` from `x0` to `x1` inclusive, clipped.
    pub fn fill_span(&mut self, y: i32, x0: i32, x1: i32) {
        if y < 0 || y as usize >= self.pixel_height() {
            return;
        }
        let start = x0.max(0);
        let end = x1.min(self.pixel_width() as i32 - 1);
        for x in start..=end {
            self.set_pixel(x as usize, y as usize);
        }
    }

    #[cfg(test)]
    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|&b| b == 0)
    }

    /// Row `row` as Braille characters; blank cells are U+2800.
    pub fn row_to_string(&self, row: usize) -> String {
        if row >= self.height {
            return String::new();
        }
        self.pixels[row * self.width..(row + 1) * self.width]
            .iter()
            .map(|&b| char::from_u32(0x2800 + b as u32).unwrap_or(' '))
            .collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.height).map(|i| self.row_to_string(i))
    }

    #[cfg(test)]
    pub fn to_string(&self) -> String {
        self.rows().collect::<Vec<_>>().join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_pixel() {
        let mut canvas = BrailleCanvas::new(1, 1);
        canvas.set_pixel(0, 0);
        assert_eq!(canvas.to_string(), "⠁");
    }

    #[test]
    fn test_full_cell_from_spans() {
        let mut canvas = BrailleCanvas::new(1, 1);
        for y in 0..4 {
            canvas.fill_span(y, 0, 1);
        }
        assert_eq!(canvas.to_string(), "⣿");
    }

    #[test]
    fn test_span_is_clipped() {
        let mut canvas = BrailleCanvas::new(2, 1);
        canvas.fill_span(0, -10, 100);
        canvas.fill_span(-1, 0, 3);
        canvas.fill_span(4, 0, 3);
        assert_eq!(canvas.to_string(), "⠉⠉");
    }

    #[test]
    fn test_diagonal_and_rows() {
        let mut canvas = BrailleCanvas::new(2, 2);
        assert!(canvas.is_blank());
        canvas.set_pixel(0, 0);
        canvas.set_pixel(1, 1);
        canvas.set_pixel(2, 2);
        canvas.set_pixel(3, 3);
        canvas.set_pixel_signed(-1, 5);
        assert_eq!(canvas.row_to_string(0), "⠑⢄");
        assert_eq!(canvas.row_to_string(1), "⠀⠀");
        assert_eq!(canvas.rows().count(), 2);
        assert!(!canvas.is_blank());
    }
}
